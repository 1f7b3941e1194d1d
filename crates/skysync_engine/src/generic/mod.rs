//! Schemaless entities for collections without a dedicated type.
//!
//! A [`GenericEntity`] carries a free-form [`DataMap`] and a list of child
//! record ids. Both travel to the remote store and the cache as JSON blobs,
//! so one entity type and one storage model serve any collection.

mod entity;
mod model;
mod value;

pub use entity::GenericEntity;
pub use model::{DataMap, GenericStorageModel};
pub use value::DataValue;

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::lifecycle::LifecycleSource;
use crate::reconciler::ReconciliationEngine;
use crate::storable::FieldMapping;
use skysync_remote::RemoteGateway;
use skysync_storage::Cache;
use std::sync::Arc;
use tracing::warn;

/// The field mapping between [`GenericEntity`] and [`GenericStorageModel`].
///
/// Copies the data map and child ids in both directions. A model whose blobs
/// no longer decode leaves the entity's contents untouched.
pub fn generic_mapping() -> FieldMapping<GenericEntity, GenericStorageModel> {
    FieldMapping::new(
        |model: &mut GenericStorageModel, entity: &GenericEntity| {
            model.set_data(entity.data());
            model.set_children(entity.children());
        },
        |entity: &mut GenericEntity, model: &GenericStorageModel| {
            match (model.data(), model.children()) {
                (Ok(data), Ok(children)) => entity.replace_contents(data, children),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(id = %entity.id(), error = %e, "cached generic model does not decode");
                }
            }
        },
    )
}

impl ReconciliationEngine<GenericEntity> {
    /// Creates a stopped engine for generic entities over `cache`.
    ///
    /// # Errors
    ///
    /// See [`ReconciliationEngine::new`].
    pub fn generic(
        config: SyncConfig,
        gateway: Arc<RemoteGateway>,
        cache: impl Cache<GenericStorageModel> + 'static,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> SyncResult<Self> {
        Self::new(config, gateway, cache, generic_mapping(), lifecycle)
    }

    /// Creates a stopped engine for generic entities over a file cache at
    /// `config.cache_path`.
    ///
    /// # Errors
    ///
    /// See [`ReconciliationEngine::open`].
    pub fn open_generic(
        config: SyncConfig,
        gateway: Arc<RemoteGateway>,
        lifecycle: Arc<dyn LifecycleSource>,
    ) -> SyncResult<Self> {
        Self::open(config, gateway, generic_mapping(), lifecycle)
    }
}
