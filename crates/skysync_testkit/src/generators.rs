//! Property-based test generators using proptest.

use crate::fixtures::at;
use crate::note::{Note, NoteModel};
use proptest::prelude::*;
use skysync_engine::Storable;

/// Strategy for generating note titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,12}").expect("Invalid regex")
}

/// Strategy for generating change-date offsets in seconds.
///
/// The range is small so equal dates on both sides come up often.
pub fn offset_strategy() -> impl Strategy<Value = i64> {
    0i64..8
}

/// One id's state on each side before a pass.
#[derive(Debug, Clone)]
pub struct ScenarioEntry {
    /// Record id name.
    pub id: String,
    /// Remote copy as (title, change offset), if present remotely.
    pub remote: Option<(String, i64)>,
    /// Cached copy as (title, change offset), if present locally.
    pub local: Option<(String, i64)>,
}

/// A remote snapshot and a cache population over overlapping ids.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Every generated id.
    pub entries: Vec<ScenarioEntry>,
}

impl Scenario {
    /// Notes in the remote snapshot.
    pub fn remote_notes(&self) -> Vec<Note> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.remote
                    .as_ref()
                    .map(|(title, offset)| Note::dated(&e.id, title.clone(), at(*offset)))
            })
            .collect()
    }

    /// Models in the cache.
    pub fn local_models(&self) -> Vec<NoteModel> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.local
                    .as_ref()
                    .map(|(title, offset)| Note::dated(&e.id, title.clone(), at(*offset)).to_model())
            })
            .collect()
    }

    /// Number of ids where the cached copy is strictly newer.
    pub fn local_wins(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!((&e.remote, &e.local), (Some((_, r)), Some((_, l))) if l > r))
            .count()
    }
}

fn side_strategy() -> impl Strategy<Value = Option<(String, i64)>> {
    prop::option::of((title_strategy(), offset_strategy()))
}

/// Strategy for generating reconciliation scenarios with up to `max` ids.
pub fn scenario_strategy(max: usize) -> impl Strategy<Value = Scenario> {
    prop::collection::vec((side_strategy(), side_strategy()), 0..=max).prop_map(|sides| Scenario {
        entries: sides
            .into_iter()
            .enumerate()
            .map(|(i, (remote, local))| ScenarioEntry {
                id: format!("n{i}"),
                remote,
                local,
            })
            .collect(),
    })
}
