// src/cache/mod.rs

// Key-value cache in front of the examination store.
//
// The cache is shared, mutable and never authoritative: every entry is
// derived from a successful durable read or write, and every read may be
// stale. Values are JSON strings so any backend holding strings will do.

pub mod keys;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{error::AppError, utils::deadline::bounded};

pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Minimal string cache. Implementations must be safe for concurrent use.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value`; `ttl = None` keeps it until deleted.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Typed, time-bounded access to a [`Cache`] with the cache-aside read policy.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn Cache>,
    timeout: Duration,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn Cache>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    /// Returns the cached value, or `None` on a miss.
    /// An entry that no longer decodes is treated as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let raw = bounded(self.timeout, "cache get", self.cache.get(key)).await?;

        Ok(raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }))
    }

    pub async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)?;
        bounded(self.timeout, "cache set", self.cache.set(key, raw, ttl)).await
    }

    pub async fn evict(&self, key: &str) -> Result<(), AppError> {
        bounded(self.timeout, "cache delete", self.cache.delete(key)).await
    }

    /// Cache-aside read: a hit returns without calling `load`; a miss calls
    /// `load` and, when it finds a value, caches it before returning.
    pub async fn read_through<T, F, Fut>(&self, key: &str, load: F) -> Result<Option<T>, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, AppError>>,
    {
        if let Some(hit) = self.get(key).await? {
            return Ok(Some(hit));
        }

        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.put(key, value, None).await?;
        }
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: i64,
        name: String,
    }

    fn aside() -> (Arc<MemoryCache>, CacheAside) {
        let cache = Arc::new(MemoryCache::new());
        let aside = CacheAside::new(cache.clone(), Duration::from_secs(1));
        (cache, aside)
    }

    #[tokio::test]
    async fn miss_then_hit_returns_identical_value() {
        let (_cache, aside) = aside();
        let loads = AtomicUsize::new(0);
        let load = || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Row { id: 1, name: "algebra".into() }))
        };

        let first = aside.read_through("row:1", load).await.unwrap();
        let second = aside
            .read_through("row:1", || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(None::<Row>)
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_rows_are_not_cached() {
        let (cache, aside) = aside();
        let found: Option<Row> = aside.read_through("row:2", || async { Ok(None) }).await.unwrap();

        assert!(found.is_none());
        assert!(cache.get("row:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_entry_counts_as_miss() {
        let (cache, aside) = aside();
        cache.set("row:3", "{not json".into(), None).await.unwrap();

        let row = aside
            .read_through("row:3", || async { Ok(Some(Row { id: 3, name: "geometry".into() })) })
            .await
            .unwrap();

        assert_eq!(row.unwrap().id, 3);
        let repaired: Option<Row> = aside.get("row:3").await.unwrap();
        assert_eq!(repaired.unwrap().name, "geometry");
    }

    #[tokio::test]
    async fn evict_forces_reload() {
        let (_cache, aside) = aside();
        aside.put("row:4", &Row { id: 4, name: "old".into() }, None).await.unwrap();
        aside.evict("row:4").await.unwrap();

        let row = aside
            .read_through("row:4", || async { Ok(Some(Row { id: 4, name: "new".into() })) })
            .await
            .unwrap();
        assert_eq!(row.unwrap().name, "new");
    }
}
