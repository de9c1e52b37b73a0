use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::keys::{CacheKeys, EntityType};
use super::store::CacheStore;

const SOURCE: &str = "cache::invalidator";
const METRIC_INVALIDATIONS: &str = "folio_cache_invalidation_total";
const METRIC_INVALIDATION_FAILURES: &str = "folio_cache_invalidation_failed_total";

/// Drops the cached listing of an entity type after a write.
///
/// The entity generation is bumped before the key is deleted, so a listing
/// loaded before the write cannot be served once it is written back.
/// Failures are logged and counted, never returned: the write that triggered
/// the invalidation has already been committed.
#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
    keys: CacheKeys,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn CacheStore>, keys: CacheKeys) -> Self {
        Self { store, keys }
    }

    pub async fn entity_written(&self, entity: EntityType) {
        let key = self.keys.key(entity);
        let generation = self
            .store
            .increment(&self.keys.generation_key(entity))
            .await;
        let removed = self.store.delete(&key).await;

        match (generation, removed) {
            (Ok(generation), Ok(removed)) => {
                counter!(METRIC_INVALIDATIONS, "entity" => entity.as_str()).increment(1);
                debug!(
                    target_module = SOURCE,
                    entity = entity.as_str(),
                    key = %key,
                    generation,
                    removed,
                    "Cache entry invalidated"
                );
            }
            (Err(err), _) | (_, Err(err)) => {
                counter!(METRIC_INVALIDATION_FAILURES, "entity" => entity.as_str()).increment(1);
                warn!(
                    target_module = SOURCE,
                    entity = entity.as_str(),
                    key = %key,
                    error = %err,
                    "Cache invalidation failed"
                );
            }
        }
    }
}
