//! Error types for the cache layer and the services built on it.

use thiserror::Error;

/// Result type for cache and service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sun-cache.
///
/// The first four variants are the domain taxonomy that service callers see.
/// The rest describe failures inside the cache layer itself; the typed cache
/// recovers from the decode failures (see [`Error::is_cache_corruption`]) by
/// evicting the entry and falling back to the repository.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Referenced id is absent on a read-by-id or mutate-by-id path.
    ///
    /// Only ever raised after consulting the repository. An empty cache is
    /// never taken as proof of absence.
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: i32 },

    /// Malformed request input, e.g. an unparseable date.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external sunrise/sunset lookup failed.
    ///
    /// Timeouts, non-2xx responses, malformed payloads and non-OK statuses
    /// all collapse into this one variant.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Anything that fits nowhere else.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// Serialization failed when converting a value to cache bytes.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a value.
    ///
    /// **Recovery:** Cache entry is evicted and recomputed.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    #[error("Invalid cache entry: {0}")]
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    #[error("Cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// The entry under a key holds a different kind of value than the reader asked for.
    #[error("Cache kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    /// Cache backend storage error.
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Relational store error (constraint violation, connection lost, ...).
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Error::NotFound { entity, id }
    }

    /// True for failures caused by a bad cache entry rather than a bad backend.
    ///
    /// Such entries are safe to evict and recompute.
    pub fn is_cache_corruption(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
                | Error::KindMismatch { .. }
        )
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::UpstreamUnavailable(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Unexpected(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Unexpected(e.to_string())
    }
}
