use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

use super::keys::{CacheKeys, EntityType};
use super::store::{CacheError, CacheStore};

const SOURCE: &str = "cache::listing";
const METRIC_HIT: &str = "folio_cache_hit_total";
const METRIC_MISS: &str = "folio_cache_miss_total";
const METRIC_ERROR: &str = "folio_cache_error_total";

/// Read-through cache for whole-entity-type listings.
///
/// Cache trouble never fails a read: undecodable entries and backend errors
/// fall through to the loader.
///
/// Entries are tagged with the entity generation read before loading. A load
/// that overlaps an invalidation is written under the old generation and is
/// treated as a miss afterwards.
#[derive(Clone)]
pub struct CachedListings {
    store: Arc<dyn CacheStore>,
    keys: CacheKeys,
    ttl: Duration,
}

#[derive(Serialize)]
struct EntryRef<'a, T> {
    generation: u64,
    value: &'a T,
}

#[derive(Deserialize)]
struct Entry<T> {
    generation: u64,
    value: T,
}

impl CachedListings {
    pub fn new(store: Arc<dyn CacheStore>, keys: CacheKeys, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    pub async fn get_or_load<T, E, F, Fut>(&self, entity: EntityType, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = self.keys.key(entity);

        let generation = match self.generation(entity).await {
            Ok(generation) => Some(generation),
            Err(err) => {
                self.report(entity, &key, "generation", &err);
                None
            }
        };

        if let Some(generation) = generation {
            match self.lookup::<T>(&key, generation).await {
                Ok(Some(value)) => {
                    counter!(METRIC_HIT, "entity" => entity.as_str()).increment(1);
                    return Ok(value);
                }
                Ok(None) => {
                    counter!(METRIC_MISS, "entity" => entity.as_str()).increment(1);
                }
                Err(err) => self.report(entity, &key, "get", &err),
            }
        }

        let value = load().await?;

        // An untagged entry could never be checked for staleness.
        if let Some(generation) = generation {
            if let Err(err) = self.store_value(&key, generation, &value).await {
                self.report(entity, &key, "set", &err);
            }
        }

        Ok(value)
    }

    async fn generation(&self, entity: EntityType) -> Result<u64, CacheError> {
        let key = self.keys.generation_key(entity);
        match self.store.get(&key).await? {
            Some(raw) => raw
                .parse()
                .map_err(|_| CacheError::backend(format!("value at `{key}` is not a counter"))),
            None => Ok(0),
        }
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        generation: u64,
    ) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        let entry: Entry<T> = serde_json::from_str(&raw)?;
        Ok((entry.generation == generation).then_some(entry.value))
    }

    async fn store_value<T: Serialize>(
        &self,
        key: &str,
        generation: u64,
        value: &T,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&EntryRef { generation, value })?;
        self.store.set(key, raw, self.ttl).await
    }

    fn report(&self, entity: EntityType, key: &str, op: &'static str, err: &CacheError) {
        counter!(METRIC_ERROR, "entity" => entity.as_str(), "op" => op).increment(1);
        warn!(
            target_module = SOURCE,
            entity = entity.as_str(),
            key = %key,
            op,
            error = %err,
            "Cached listing unavailable; using storage"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::invalidator::CacheInvalidator;
    use crate::cache::store::MemoryCacheStore;

    fn listings(store: Arc<MemoryCacheStore>) -> CachedListings {
        CachedListings::new(store, CacheKeys::new("folio"), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = Arc::new(MemoryCacheStore::new());
        let cached = listings(store.clone());
        let loads = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Vec<i64> = cached
                .get_or_load(EntityType::Category, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CacheError>(vec![1, 2, 3])
                })
                .await
                .expect("listing");
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get("folio:category").await.expect("get").as_deref(),
            Some(r#"{"generation":0,"value":[1,2,3]}"#)
        );
    }

    #[tokio::test]
    async fn load_overlapping_an_invalidation_is_not_served_again() {
        let store = Arc::new(MemoryCacheStore::new());
        let cached = listings(store.clone());
        let invalidator = CacheInvalidator::new(store.clone(), CacheKeys::new("folio"));

        let stale: Vec<i64> = cached
            .get_or_load(EntityType::Category, || async {
                invalidator.entity_written(EntityType::Category).await;
                Ok::<_, CacheError>(vec![1])
            })
            .await
            .expect("listing");
        assert_eq!(stale, vec![1]);
        assert!(store.get("folio:category").await.expect("get").is_some());

        let fresh: Vec<i64> = cached
            .get_or_load(EntityType::Category, || async {
                Ok::<_, CacheError>(vec![1, 2])
            })
            .await
            .expect("listing");
        assert_eq!(fresh, vec![1, 2]);

        let cached_again: Vec<i64> = cached
            .get_or_load(EntityType::Category, || async {
                Ok::<_, CacheError>(vec![9])
            })
            .await
            .expect("listing");
        assert_eq!(cached_again, vec![1, 2]);
    }

    #[tokio::test]
    async fn corrupt_entry_falls_through_to_loader() {
        let store = Arc::new(MemoryCacheStore::new());
        store
            .set("folio:category", "not json".into(), Duration::from_secs(60))
            .await
            .expect("seed");

        let value: Vec<i64> = listings(store)
            .get_or_load(EntityType::Category, || async { Ok::<_, CacheError>(vec![4]) })
            .await
            .expect("listing");
        assert_eq!(value, vec![4]);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let store = Arc::new(MemoryCacheStore::new());
        let result: Result<Vec<i64>, &str> = listings(store.clone())
            .get_or_load(EntityType::Category, || async { Err("boom") })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(store.is_empty());
    }
}
