//! Redis-backed cache store.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::info;

use crate::cache::{CacheError, CacheStore};

use super::error::InfraError;

const CONNECTION_TIMEOUT: Duration = Duration::from_millis(500);
const CONNECTION_RETRIES: usize = 1;

#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    /// Connect eagerly so a misconfigured endpoint fails at startup.
    pub async fn connect(redis_url: &str) -> Result<Self, InfraError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(CONNECTION_RETRIES)
            .set_connection_timeout(CONNECTION_TIMEOUT);

        let client = Client::open(redis_url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let connection = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;

        info!(target_module = "infra::cache", "Connected to redis cache");
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        connection.get(key).await.map_err(CacheError::backend)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        connection
            .set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(CacheError::backend)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.del(key).await.map_err(CacheError::backend)?;
        Ok(removed > 0)
    }

    async fn increment(&self, key: &str) -> Result<u64, CacheError> {
        let mut connection = self.connection.clone();
        connection.incr(key, 1u64).await.map_err(CacheError::backend)
    }
}
