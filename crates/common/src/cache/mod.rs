//! In-process lookup caches
//!
//! Provides:
//! - A single-value cache with an explicit TTL
//! - Load-through access with a fallible async loader
//! - Explicit invalidation
//!
//! Used for small reference maps (jurisdiction codes, use-case slugs) that are read
//! for every entity of a run but change only when curators edit reference data.

use crate::errors::Result;
use crate::metrics::record_cache;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Slot<V> {
    value: Arc<V>,
    loaded_at: Instant,
}

/// TTL-bounded cache holding one loaded value
pub struct LookupCache<V> {
    name: &'static str,
    ttl: Duration,
    slot: Mutex<Option<Slot<V>>>,
}

impl<V> LookupCache<V> {
    /// Create an empty cache; `ttl` of zero means every read reloads
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, loading it when absent or expired.
    ///
    /// The lock is held across the loader so concurrent callers share one load.
    /// A failed load leaves the cache empty and returns the error.
    pub async fn get_or_load<F, Fut>(&self, loader: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                record_cache(true, self.name);
                return Ok(Arc::clone(&cached.value));
            }
            debug!(cache = self.name, "Lookup cache expired");
        }

        record_cache(false, self.name);
        let value = Arc::new(loader().await?);
        *slot = Some(Slot {
            value: Arc::clone(&value),
            loaded_at: Instant::now(),
        });
        debug!(cache = self.name, ttl_secs = self.ttl.as_secs(), "Lookup cache loaded");

        Ok(value)
    }

    /// Drop the cached value; the next read reloads
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            debug!(cache = self.name, "Lookup cache invalidated");
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_loads_once_within_ttl() {
        let cache: LookupCache<HashMap<String, i64>> =
            LookupCache::new("jurisdictions", Duration::from_secs(60));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let map = cache
                .get_or_load(|| async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(HashMap::from([("US".to_string(), 1)]))
                })
                .await
                .unwrap();
            assert_eq!(map.get("US"), Some(&1));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache: LookupCache<u32> = LookupCache::new("use_cases", Duration::from_secs(60));
        cache.get_or_load(|| async { Ok(1) }).await.unwrap();
        cache.invalidate().await;
        assert!(!cache.is_loaded().await);

        let value = assert_ok!(cache.get_or_load(|| async { Ok(2) }).await);
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let cache: LookupCache<u32> = LookupCache::new("short", Duration::ZERO);
        cache.get_or_load(|| async { Ok(1) }).await.unwrap();
        let value = assert_ok!(cache.get_or_load(|| async { Ok(2) }).await);
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache: LookupCache<u32> = LookupCache::new("flaky", Duration::from_secs(60));
        let err = cache
            .get_or_load(|| async {
                Err(AppError::DatabaseConnection {
                    message: "down".to_string(),
                })
            })
            .await;
        assert!(err.is_err());
        assert!(!cache.is_loaded().await);
    }
}
