//! Core trait that every cached DTO implements.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// Trait that all values stored in the entity cache must implement.
///
/// The prefix doubles as the kind tag written into each cache envelope, so
/// a `Location` entry can never be read back as a `SunriseSunset`, and a
/// single entry can never be read back as a list.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use sun_cache::CacheEntity;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Station {
///     pub id: Option<i32>,
///     pub name: String,
/// }
///
/// impl CacheEntity for Station {
///     type Key = i32;
///
///     fn cache_key(&self) -> Option<Self::Key> {
///         self.id
///     }
///
///     fn cache_prefix() -> &'static str {
///         "Station"
///     }
/// }
///
/// assert_eq!(Station::list_kind(), "Station[]");
/// ```
pub trait CacheEntity: Send + Sync + Serialize + DeserializeOwned + Clone {
    /// Type of the entity's id.
    type Key: Display + Clone + Send + Sync + 'static;

    /// Return the entity's id, or `None` while it has not been persisted.
    fn cache_key(&self) -> Option<Self::Key>;

    /// Return the type prefix used in cache keys, e.g. `"Location"`.
    fn cache_prefix() -> &'static str;

    /// Kind tag for a single cached value.
    fn kind() -> String {
        Self::cache_prefix().to_string()
    }

    /// Kind tag for a cached list of values.
    fn list_kind() -> String {
        format!("{}[]", Self::cache_prefix())
    }
}
