//! Typed entity cache - the get/put/invalidate surface the services use.

use crate::backend::CacheBackend;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::CacheKey;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::serialization::{deserialize_from_cache, serialize_for_cache};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Typed facade over a shared [`CacheBackend`].
///
/// Every value is stored in a kind-tagged envelope (see
/// [`crate::serialization`]), so a reader asking for a `LocationDto` list
/// never receives bytes written as a single `SunriseSunsetDto`.
///
/// Cloning is cheap and all clones share the same backend and metrics sink,
/// which is how one cache is handed to every service.
///
/// An entry that fails to decode (bad magic, old schema, wrong kind) is
/// evicted and reported as a miss so the caller recomputes it from the
/// repository. Backend failures propagate.
///
/// # Example
///
/// ```ignore
/// use sun_cache::{EntityCache, backend::InMemoryBackend};
///
/// let cache = EntityCache::new(InMemoryBackend::new());
/// cache.put("Location_1", &dto).await?;
/// let hit: Option<LocationDto> = cache.get("Location_1").await?;
/// ```
#[derive(Clone)]
pub struct EntityCache<B: CacheBackend> {
    backend: B,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> EntityCache<B> {
    /// Create a new cache over the given backend.
    pub fn new(backend: B) -> Self {
        EntityCache {
            backend,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Read a single entity stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if the backend fails.
    pub async fn get<T: CacheEntity>(&self, key: &str) -> Result<Option<T>> {
        self.fetch(key, &T::kind()).await
    }

    /// Read a list of entities stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if the backend fails.
    pub async fn get_list<T: CacheEntity>(&self, key: &str) -> Result<Option<Vec<T>>> {
        self.fetch(key, &T::list_kind()).await
    }

    /// Store a single entity under `key`, overwriting silently.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization or the backend fails.
    pub async fn put<T: CacheEntity>(&self, key: &str, value: &T) -> Result<()> {
        self.store(key, &T::kind(), value).await
    }

    /// Store a list of entities under `key`, overwriting silently.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization or the backend fails.
    pub async fn put_list<T: CacheEntity>(&self, key: &str, values: &[T]) -> Result<()> {
        self.store(key, &T::list_kind(), &values).await
    }

    /// Store an entity under its own single-entity key.
    ///
    /// Values without an id are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization or the backend fails.
    pub async fn put_entity<T: CacheEntity>(&self, value: &T) -> Result<()> {
        match value.cache_key() {
            Some(id) => self.put(&CacheKey::entity::<T>(&id), value).await,
            None => {
                debug!("Skipping cache of unsaved {}", T::cache_prefix());
                Ok(())
            }
        }
    }

    /// Store each entity under its own single-entity key.
    ///
    /// # Errors
    ///
    /// Returns `Err` if serialization or the backend fails.
    pub async fn put_entities<T: CacheEntity>(&self, values: &[T]) -> Result<()> {
        for value in values {
            self.put_entity(value).await?;
        }
        Ok(())
    }

    /// Remove `key`. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend fails.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let timer = Instant::now();
        self.backend.delete(key).await?;
        self.metrics.record_delete(key, timer.elapsed());
        Ok(())
    }

    /// Remove every key in `keys`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend fails.
    pub async fn remove_many(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let timer = Instant::now();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.backend.mdelete(&refs).await?;
        for key in keys {
            self.metrics.record_delete(key, timer.elapsed());
        }
        Ok(())
    }

    /// Remove every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend fails or does not support prefix deletes.
    pub async fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let timer = Instant::now();
        let removed = self.backend.delete_prefix(prefix).await?;
        if removed > 0 {
            self.metrics.record_delete(prefix, timer.elapsed());
        }
        Ok(removed)
    }

    /// Whether `key` currently holds a value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the backend fails.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn fetch<V: DeserializeOwned>(&self, key: &str, kind: &str) -> Result<Option<V>> {
        let timer = Instant::now();

        let Some(bytes) = self.backend.get(key).await? else {
            self.metrics.record_miss(key, timer.elapsed());
            return Ok(None);
        };

        match deserialize_from_cache::<V>(kind, &bytes) {
            Ok(value) => {
                self.metrics.record_hit(key, timer.elapsed());
                Ok(Some(value))
            }
            Err(e) if e.is_cache_corruption() => {
                warn!("Evicting unreadable cache entry {}: {}", key, e);
                self.metrics.record_error(key, &e.to_string());
                self.backend.delete(key).await?;
                self.metrics.record_miss(key, timer.elapsed());
                Ok(None)
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                Err(e)
            }
        }
    }

    async fn store<V: Serialize>(&self, key: &str, kind: &str, value: &V) -> Result<()> {
        let timer = Instant::now();
        let bytes = serialize_for_cache(kind, value)?;
        self.backend.set(key, bytes).await?;
        self.metrics.record_set(key, timer.elapsed());
        Ok(())
    }
}
