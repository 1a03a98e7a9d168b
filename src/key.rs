//! Cache key scheme.
//!
//! ```text
//! Location_7                                  single entity
//! Location_All                                aggregate ("all records")
//! SunriseSunset_Location_7                    derived query: by location id
//! SunriseSunset_Date_2023-01-01_Location_Oslo derived query: by date + location name
//! ```

use crate::entity::CacheEntity;
use std::fmt::Display;

/// Separator between key segments.
pub const SEPARATOR: &str = "_";

/// Suffix of the aggregate key.
pub const ALL_SUFFIX: &str = "All";

/// Builder for cache keys.
pub struct CacheKey;

impl CacheKey {
    /// Single-entity key: `{prefix}_{id}`.
    pub fn entity<T: CacheEntity>(id: &T::Key) -> String {
        Self::build_with_prefix(T::cache_prefix(), id)
    }

    /// Aggregate key: `{prefix}_All`.
    pub fn all<T: CacheEntity>() -> String {
        Self::build_with_prefix(T::cache_prefix(), &ALL_SUFFIX)
    }

    /// Derived-query key: `{prefix}_{part}_{part}...`.
    pub fn query<T: CacheEntity>(parts: &[&dyn Display]) -> String {
        let mut key = T::cache_prefix().to_string();
        for part in parts {
            key.push_str(SEPARATOR);
            key.push_str(&part.to_string());
        }
        key
    }

    /// Common prefix of every derived-query key named `{prefix}_{query}_...`.
    pub fn query_prefix<T: CacheEntity>(query: &str) -> String {
        format!("{}{}{}{}", T::cache_prefix(), SEPARATOR, query, SEPARATOR)
    }

    /// Build cache key with custom prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn Display) -> String {
        format!("{}{}{}", prefix, SEPARATOR, id)
    }
}
