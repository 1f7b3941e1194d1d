//! Entities that can be mirrored into a local cache.

use chrono::{DateTime, Utc};
use skysync_remote::Recordable;
use skysync_storage::StorageModel;
use std::fmt;
use std::sync::Arc;

/// A [`Recordable`] entity with a change date and a storage model.
///
/// The change date drives conflict resolution: the side with the later date
/// wins. It must be written to the remote record as one of the entity's
/// fields so pushes carry it.
///
/// `to_model(e).key()` must equal `e.record_id().name()`.
pub trait Storable: Recordable {
    /// The persisted representation.
    type Model: StorageModel;

    /// Returns the last change date.
    fn change_date(&self) -> DateTime<Utc>;

    /// Sets the last change date.
    fn set_change_date(&mut self, date: DateTime<Utc>);

    /// Creates a storage model for this entity.
    fn to_model(&self) -> Self::Model;

    /// Rebuilds an entity from its storage model.
    fn from_model(model: &Self::Model) -> Option<Self>;

    /// Replaces the field selected by `field` with `value` and returns the
    /// previous value. Bumps the change date to now if the value differs.
    ///
    /// ```rust,ignore
    /// fn set_title(&mut self, title: String) {
    ///     self.replace_tracked(|note| &mut note.title, title);
    /// }
    /// ```
    fn replace_tracked<T: PartialEq>(
        &mut self,
        field: impl FnOnce(&mut Self) -> &mut T,
        value: T,
    ) -> T {
        let slot = field(self);
        let changed = *slot != value;
        let previous = std::mem::replace(slot, value);
        if changed {
            self.set_change_date(Utc::now());
        }
        previous
    }
}

type UpdateModel<E, M> = Arc<dyn Fn(&mut M, &E) + Send + Sync>;
type UpdateEntity<E, M> = Arc<dyn Fn(&mut E, &M) + Send + Sync>;

/// Bidirectional projection between entity fields and storage model fields.
///
/// `update_model` runs when the remote side wins, `update_entity` when the
/// local side wins. Neither needs to copy the change date; the engine sets
/// it after the projection runs.
pub struct FieldMapping<E, M> {
    update_model: UpdateModel<E, M>,
    update_entity: UpdateEntity<E, M>,
}

impl<E, M> FieldMapping<E, M> {
    /// Creates a mapping from the two projections.
    pub fn new(
        update_model: impl Fn(&mut M, &E) + Send + Sync + 'static,
        update_entity: impl Fn(&mut E, &M) + Send + Sync + 'static,
    ) -> Self {
        Self {
            update_model: Arc::new(update_model),
            update_entity: Arc::new(update_entity),
        }
    }

    /// Copies entity fields onto a model.
    pub fn update_model(&self, model: &mut M, entity: &E) {
        (self.update_model)(model, entity);
    }

    /// Copies model fields onto an entity.
    pub fn update_entity(&self, entity: &mut E, model: &M) {
        (self.update_entity)(entity, model);
    }
}

impl<E: Storable> FieldMapping<E, E::Model> {
    /// A mapping that rebuilds whole values through
    /// [`Storable::to_model`] and [`Storable::from_model`].
    ///
    /// Suitable when neither side carries state the other does not know
    /// about. A model that fails to convert leaves the entity untouched.
    pub fn whole() -> Self {
        Self::new(
            |model, entity: &E| *model = entity.to_model(),
            |entity, model| {
                if let Some(rebuilt) = E::from_model(model) {
                    *entity = rebuilt;
                }
            },
        )
    }
}

impl<E, M> Clone for FieldMapping<E, M> {
    fn clone(&self) -> Self {
        Self {
            update_model: Arc::clone(&self.update_model),
            update_entity: Arc::clone(&self.update_entity),
        }
    }
}

impl<E, M> fmt::Debug for FieldMapping<E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping").finish_non_exhaustive()
    }
}
