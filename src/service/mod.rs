//! Cache-aware services for locations and sunrise/sunset records.
//!
//! Both services follow the same shape. A read checks the cache, falls back
//! to the repository on a miss, converts to a DTO, caches it and returns it.
//! A write persists through the repository, re-caches the single-entity key
//! and drops the aggregate key.
//!
//! Locations and sunrise/sunset records are joined many-to-many, so a write
//! on one side also changes the DTOs cached for the other side. A write
//! therefore evicts:
//!
//! - the single keys of related records on the other side (old and new
//!   relations) and that side's aggregate key,
//! - every derived sunrise/sunset query key (`SunriseSunset_Location_*`,
//!   `SunriseSunset_Date_*`), but only when the write can change a derived
//!   result: a linked sunrise/sunset record, a changed location relation set
//!   or a location rename.
//!
//! ```ignore
//! use sun_cache::service::Services;
//!
//! let services = Services::new(EntityCache::new(InMemoryBackend::new()), store, sun_api);
//! let paris = services.locations.create(LocationDto::new("Paris", "France")).await?;
//! let again = services.locations.get_by_id(paris.id.unwrap()).await?; // cache hit
//! ```

pub mod location;
pub mod sunrise_sunset;

pub use location::LocationService;
pub use sunrise_sunset::SunriseSunsetService;

use crate::backend::CacheBackend;
use crate::cache::EntityCache;
use crate::counter::RequestCounter;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::CacheKey;
use crate::model::SunriseSunsetDto;
use crate::repository::{LocationRepository, SunriseSunsetRepository};
use crate::sun_api::SunTimesProvider;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Query name of the by-location-id derived key.
pub const QUERY_BY_LOCATION: &str = "Location";

/// Query name of the by-date-and-location-name derived key.
pub const QUERY_BY_DATE: &str = "Date";

/// Both services wired to one cache, one store and one request counter.
pub struct Services<B: CacheBackend, R, P> {
    pub locations: LocationService<B, R, R>,
    pub sunrise_sunsets: SunriseSunsetService<B, R, R, P>,
    counter: Arc<RequestCounter>,
}

impl<B, R, P> Services<B, R, P>
where
    B: CacheBackend,
    R: LocationRepository + SunriseSunsetRepository,
    P: SunTimesProvider,
{
    /// `store` serves both repositories.
    pub fn new(cache: EntityCache<B>, store: Arc<R>, sun_times: Arc<P>) -> Self {
        let counter = Arc::new(RequestCounter::new());

        let locations = LocationService::new(
            Arc::clone(&store),
            Arc::clone(&store),
            cache.clone(),
            Arc::clone(&counter),
        );
        let sunrise_sunsets = SunriseSunsetService::new(
            Arc::clone(&store),
            store,
            sun_times,
            cache,
            Arc::clone(&counter),
        );

        Services {
            locations,
            sunrise_sunsets,
            counter,
        }
    }

    /// The counter both services increment.
    pub fn counter(&self) -> &Arc<RequestCounter> {
        &self.counter
    }
}

/// Drop the single keys of `ids` and, if any, the aggregate key of `T`.
pub(crate) async fn evict_entities<B, T>(cache: &EntityCache<B>, ids: &BTreeSet<i32>) -> Result<()>
where
    B: CacheBackend,
    T: CacheEntity<Key = i32>,
{
    if ids.is_empty() {
        return Ok(());
    }

    let keys: Vec<String> = ids.iter().map(|id| CacheKey::entity::<T>(id)).collect();
    cache.remove_many(&keys).await?;
    cache.remove(&CacheKey::all::<T>()).await?;

    debug!(
        "Evicted {} related {} entries and {}",
        keys.len(),
        T::cache_prefix(),
        CacheKey::all::<T>()
    );
    Ok(())
}

/// Drop every derived sunrise/sunset query key.
pub(crate) async fn evict_derived_queries<B: CacheBackend>(cache: &EntityCache<B>) -> Result<()> {
    let mut removed = 0;
    for query in [QUERY_BY_LOCATION, QUERY_BY_DATE] {
        removed += cache
            .remove_prefix(&CacheKey::query_prefix::<SunriseSunsetDto>(query))
            .await?;
    }

    if removed > 0 {
        debug!("Evicted {} derived query entries", removed);
    }
    Ok(())
}

/// Union of two relation sets.
pub(crate) fn union_ids(before: &[i32], after: &[i32]) -> BTreeSet<i32> {
    before.iter().chain(after).copied().collect()
}

/// Whether two relation lists name different sets of ids.
pub(crate) fn relations_changed(before: &[i32], after: &[i32]) -> bool {
    let before: BTreeSet<i32> = before.iter().copied().collect();
    let after: BTreeSet<i32> = after.iter().copied().collect();
    before != after
}
