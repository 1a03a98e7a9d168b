//! Cache backend implementations.

use crate::error::Result;

pub mod inmemory;

pub use inmemory::InMemoryBackend;

/// Trait for cache backend implementations.
///
/// A backend is a plain key→bytes store: no capacity bound, no TTL, no
/// eviction policy. Individual operations are atomic per key; nothing is
/// atomic across keys, and under concurrent writers the last `set` wins.
///
/// **IMPORTANT:** All methods use `&self` instead of `&mut self` to allow concurrent access.
/// Backend implementations should use interior mutability or external storage.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found in cache
    /// - `Ok(None)` - Cache miss (key not found)
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value in cache, silently overwriting any previous value.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove value from cache. No-op when the key is absent.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if key exists in cache.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Bulk delete operation.
    ///
    /// Default implementation calls `delete()` for each key.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn mdelete(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    ///
    /// Used to drop derived-query entries whose exact keys are not known to
    /// the writer.
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        Err(crate::error::Error::BackendError(format!(
            "delete_prefix({}) not implemented for this backend",
            prefix
        )))
    }

    /// Optional: Clear all cache (use with caution).
    ///
    /// # Errors
    /// Returns `Err` if operation is not implemented or fails
    async fn clear_all(&self) -> Result<()> {
        Err(crate::error::Error::BackendError(
            "clear_all not implemented for this backend".to_string(),
        ))
    }
}
