//! Postcard-based cache serialization with versioned, kind-tagged envelopes.
//!
//! Every cache entry follows this format:
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│ VERSION (varint)│ KIND (len + utf8)│ POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────┴──────────────────────────┘
//!   "SUNC"             u32                e.g. "Location[]"   postcard::to_allocvec(T)
//! ```
//!
//! The kind tag names what the payload is (a single `Location`, a list of
//! `SunriseSunset`, ...). Readers state the kind they expect and get
//! [`Error::KindMismatch`] instead of a mis-decoded value when the key holds
//! something else.
//!
//! # Example
//!
//! ```rust
//! use sun_cache::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Point {
//!     id: i32,
//!     name: String,
//! }
//!
//! # fn main() -> sun_cache::Result<()> {
//! let point = Point { id: 1, name: "Paris".to_string() };
//!
//! let bytes = serialize_for_cache("Point", &point)?;
//! let back: Point = deserialize_from_cache("Point", &bytes)?;
//! assert_eq!(point, back);
//!
//! assert!(deserialize_from_cache::<Point>("Other", &bytes).is_err());
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Magic header for sun-cache entries: b"SUNC"
pub const CACHE_MAGIC: [u8; 4] = *b"SUNC";

/// Current schema version.
///
/// Increment when a cached DTO changes shape. Entries written under another
/// version are rejected on read and recomputed from the repository.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for cache entries.
///
/// # Example
///
/// ```rust
/// use sun_cache::serialization::CacheEnvelope;
///
/// let envelope = CacheEnvelope::new("Location", "data");
/// assert_eq!(envelope.magic, *b"SUNC");
/// assert_eq!(envelope.kind, "Location");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"SUNC"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// Value kind tag
    pub kind: String,
    /// The actual cached data
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(kind: impl Into<String>, payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            kind: kind.into(),
            payload,
        }
    }
}

/// Leading fields of [`CacheEnvelope`], decoded before the payload.
#[derive(Deserialize)]
struct EnvelopeHeader {
    magic: [u8; 4],
    version: u32,
    kind: String,
}

/// Serialize a value with envelope for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(kind: &str, value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(kind, value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Cache serialization failed for {}: {}", kind, e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from cache storage with validation.
///
/// Checks, in order: magic header, schema version, kind tag, payload.
///
/// # Errors
///
/// - `Error::InvalidCacheEntry`: Invalid magic header or unreadable envelope
/// - `Error::VersionMismatch`: Schema version mismatch
/// - `Error::KindMismatch`: Entry holds another kind of value
/// - `Error::DeserializationError`: Corrupted Postcard payload
pub fn deserialize_from_cache<T: DeserializeOwned>(expected_kind: &str, bytes: &[u8]) -> Result<T> {
    let (header, payload): (EnvelopeHeader, &[u8]) =
        postcard::take_from_bytes(bytes).map_err(|e| {
            log::error!("Cache envelope unreadable: {}", e);
            Error::InvalidCacheEntry(e.to_string())
        })?;

    if header.magic != CACHE_MAGIC {
        log::warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC,
            header.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, header.magic
        )));
    }

    if header.version != CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION,
            header.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: header.version,
        });
    }

    if header.kind != expected_kind {
        log::warn!(
            "Cache kind mismatch: expected {}, got {}",
            expected_kind,
            header.kind
        );
        return Err(Error::KindMismatch {
            expected: expected_kind.to_string(),
            found: header.kind,
        });
    }

    postcard::from_bytes(payload).map_err(|e| {
        log::error!("Cache deserialization failed for {}: {}", expected_kind, e);
        Error::DeserializationError(e.to_string())
    })
}
