use async_trait::async_trait;
use dashmap::DashMap;
use redis::{AsyncCommands, Client as RedisClient, aio::MultiplexedConnection as RedisConnection};

use crate::error::CacheError;

/// Fast alias -> original URL lookups. A performance layer only: callers
/// treat every error as a miss.
#[async_trait]
pub trait AliasCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

#[derive(Clone)]
pub struct RedisCache {
    connection: RedisConnection,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = RedisClient::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl AliasCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut redis = self.connection.clone();
        Ok(redis.get::<'_, _, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut redis = self.connection.clone();
        redis.set::<'_, _, _, ()>(key, value).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AliasCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A cache whose backend is always down.
    pub(crate) struct DownCache;

    fn refused() -> CacheError {
        redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into()
    }

    #[async_trait]
    impl AliasCache for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(refused())
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            Err(refused())
        }
    }

    #[tokio::test]
    async fn memory_cache_overwrites() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "https://a.example").await.unwrap();
        cache.set("k", "https://b.example").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("https://b.example"));
    }
}
