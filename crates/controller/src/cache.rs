//! Shared key-value cache.
//!
//! Keys are transient: missing keys are reported as `None`, never as errors.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use derive_more::{Display, Error, From};
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};
use tokio::sync::Mutex;

#[derive(Debug, Display, Error, From)]
pub enum CacheError {
    Redis(RedisError),

    #[display(fmt = "value stored at {} is not an integer", _0)]
    #[from(ignore)]
    NotAnInteger(#[error(not(source))] String),
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Store an integer value that expires after the provided duration.
    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, CacheError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// Redis-backed cache shared between registry instances.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1) as usize)
            .await?;

        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let mut connection = self.connection.clone();

        Ok(connection.get(key).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection.hset::<_, _, _, ()>(key, field, value).await?;

        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();

        Ok(connection.hget(key, field).await?)
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        connection.del::<_, ()>(key).await?;

        Ok(())
    }
}

enum Value {
    Scalar(String),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-process cache, used when no Redis instance is configured.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set_ex(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        // Keys that are never read again would stay forever otherwise
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );

        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if entries.get(key).map_or(false, |entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        match entries.get(key).map(|entry| &entry.value) {
            Some(Value::Scalar(value)) => value
                .parse()
                .map(Some)
                .map_err(|_| CacheError::NotAnInteger(key.to_string())),
            Some(Value::Hash(_)) => Err(CacheError::NotAnInteger(key.to_string())),
            None => Ok(None),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });

        if let Value::Scalar(_) = entry.value {
            entry.value = Value::Hash(HashMap::new());
            entry.expires_at = None;
        }

        if let Value::Hash(hash) = &mut entry.value {
            hash.insert(field.to_string(), value.to_string());
        }

        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.lock().await;

        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.value {
                Value::Hash(hash) => hash.get(field).cloned(),
                Value::Scalar(_) => None,
            },
            _ => None,
        })
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Cache, MemoryCache};

    #[tokio::test]
    async fn scalar_values() {
        let cache = MemoryCache::new();

        assert_eq!(cache.get_i64("upload:1:size").await.unwrap(), None);

        cache
            .set_ex("upload:1:size", 512, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get_i64("upload:1:size").await.unwrap(), Some(512));

        cache.del("upload:1:size").await.unwrap();
        assert_eq!(cache.get_i64("upload:1:size").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expiration() {
        let cache = MemoryCache::new();

        cache
            .set_ex("upload:2:size", 1, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get_i64("upload:2:size").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_swept() {
        let cache = MemoryCache::new();

        cache
            .set_ex("upload:3:size", 1, Duration::from_millis(10))
            .await
            .unwrap();
        cache.hset("blobs::sha256:aa", "size", "0").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        cache
            .set_ex("upload:4:size", 2, Duration::from_secs(60))
            .await
            .unwrap();

        let entries = cache.entries.lock().await;
        assert_eq!(entries.len(), 2);
        assert!(!entries.contains_key("upload:3:size"));
        assert!(entries.contains_key("blobs::sha256:aa"));
    }

    #[tokio::test]
    async fn hashes() {
        let cache = MemoryCache::new();

        assert_eq!(cache.hget("blobs::sha256:aa", "size").await.unwrap(), None);

        cache.hset("blobs::sha256:aa", "size", "0").await.unwrap();
        assert_eq!(
            cache.hget("blobs::sha256:aa", "size").await.unwrap(),
            Some(String::from("0"))
        );
    }
}
