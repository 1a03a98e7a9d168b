//! Sunrise/sunset service.

use super::{evict_derived_queries, evict_entities, union_ids, QUERY_BY_DATE, QUERY_BY_LOCATION};
use crate::backend::CacheBackend;
use crate::cache::EntityCache;
use crate::counter::RequestCounter;
use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::model::{to_dtos, LocationDto, SunriseSunsetDto, SunriseSunsetEntity};
use crate::repository::{LocationRepository, SunriseSunsetRepository};
use crate::sun_api::{SunTimes, SunTimesProvider};
use chrono::NaiveDate;
use futures::future::try_join_all;
use std::sync::Arc;

const ENTITY: &str = "SunriseSunset";

/// Date format accepted by [`SunriseSunsetService::get_by_date_and_location_name`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// CRUD, bulk and join queries over sunrise/sunset records, fronted by the
/// shared cache.
///
/// Creates and updates take their `sunrise`/`sunset` from the
/// [`SunTimesProvider`]; a failed lookup aborts the write before anything is
/// persisted.
///
/// # Errors
///
/// - `Error::NotFound` when a by-id read, update or delete names a record the
///   repository does not hold.
/// - `Error::UpstreamUnavailable` when the lookup fails.
/// - `Error::InvalidInput` for an unparseable date.
pub struct SunriseSunsetService<B: CacheBackend, S, L, P> {
    sunrise_sunsets: Arc<S>,
    locations: Arc<L>,
    sun_times: Arc<P>,
    cache: EntityCache<B>,
    counter: Arc<RequestCounter>,
}

impl<B, S, L, P> SunriseSunsetService<B, S, L, P>
where
    B: CacheBackend,
    S: SunriseSunsetRepository,
    L: LocationRepository,
    P: SunTimesProvider,
{
    pub fn new(
        sunrise_sunsets: Arc<S>,
        locations: Arc<L>,
        sun_times: Arc<P>,
        cache: EntityCache<B>,
        counter: Arc<RequestCounter>,
    ) -> Self {
        SunriseSunsetService {
            sunrise_sunsets,
            locations,
            sun_times,
            cache,
            counter,
        }
    }

    pub fn cache(&self) -> &EntityCache<B> {
        &self.cache
    }

    /// Look up sun times for `dto`, then persist a new record.
    pub async fn create(&self, dto: SunriseSunsetDto) -> Result<SunriseSunsetDto> {
        self.counter.increment();

        let times = self.lookup(&dto).await?;
        let location_ids = self.resolve_locations(&dto.location_ids).await?;
        let saved = self
            .sunrise_sunsets
            .save(Self::entity_from(None, &dto, times, location_ids))
            .await?;
        let saved_dto = SunriseSunsetDto::from(&saved);

        info!("Caching {} {:?} after creation", ENTITY, saved_dto.id);
        self.cache.put_entity(&saved_dto).await?;
        self.cache.remove(&CacheKey::all::<SunriseSunsetDto>()).await?;
        self.evict_related(&[], &saved.location_ids).await?;

        Ok(saved_dto)
    }

    /// Record by id, from cache when present.
    pub async fn get_by_id(&self, id: i32) -> Result<SunriseSunsetDto> {
        self.counter.increment();

        let key = CacheKey::entity::<SunriseSunsetDto>(&id);
        if let Some(dto) = self.cache.get::<SunriseSunsetDto>(&key).await? {
            debug!("✓ Cache hit for {}", key);
            return Ok(dto);
        }

        debug!("✗ Cache miss for {}, querying repository", key);
        let entity = self
            .sunrise_sunsets
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        let dto = SunriseSunsetDto::from(&entity);
        self.cache.put(&key, &dto).await?;
        Ok(dto)
    }

    /// Records for the subset of `ids` that exist. Always reads the repository.
    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<SunriseSunsetDto>> {
        self.counter.increment();

        let entities = self.sunrise_sunsets.find_all_by_id(ids).await?;
        let dtos: Vec<SunriseSunsetDto> = to_dtos(&entities);
        self.cache.put_entities(&dtos).await?;
        Ok(dtos)
    }

    /// All records, from `SunriseSunset_All` when present.
    pub async fn get_all(&self) -> Result<Vec<SunriseSunsetDto>> {
        self.counter.increment();

        let key = CacheKey::all::<SunriseSunsetDto>();
        self.cached_query(&key, || self.sunrise_sunsets.find_all())
            .await
    }

    /// Re-fetch sun times and replace every field of record `id`.
    ///
    /// An empty `location_ids` clears the relation.
    pub async fn update(&self, id: i32, dto: SunriseSunsetDto) -> Result<SunriseSunsetDto> {
        self.counter.increment();

        let existing = self
            .sunrise_sunsets
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        let times = self.lookup(&dto).await?;
        let location_ids = self.resolve_locations(&dto.location_ids).await?;
        let updated = self
            .sunrise_sunsets
            .save(Self::entity_from(Some(id), &dto, times, location_ids))
            .await?;
        let updated_dto = SunriseSunsetDto::from(&updated);

        info!("Updated {} {}", ENTITY, id);
        self.cache.put_entity(&updated_dto).await?;
        self.cache.remove(&CacheKey::all::<SunriseSunsetDto>()).await?;
        self.evict_related(&existing.location_ids, &updated.location_ids)
            .await?;

        Ok(updated_dto)
    }

    /// Delete record `id` and its join rows.
    pub async fn delete(&self, id: i32) -> Result<()> {
        self.counter.increment();

        let existing = self
            .sunrise_sunsets
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        self.sunrise_sunsets.delete_by_id(id).await?;

        info!("Deleted {} {}", ENTITY, id);
        self.cache
            .remove(&CacheKey::entity::<SunriseSunsetDto>(&id))
            .await?;
        self.cache.remove(&CacheKey::all::<SunriseSunsetDto>()).await?;
        self.evict_related(&existing.location_ids, &[]).await?;

        Ok(())
    }

    /// Records joined to location `location_id`, cached under
    /// `SunriseSunset_Location_<id>`.
    pub async fn get_by_location_id(&self, location_id: i32) -> Result<Vec<SunriseSunsetDto>> {
        self.counter.increment();

        let key = CacheKey::query::<SunriseSunsetDto>(&[&QUERY_BY_LOCATION, &location_id]);
        self.cached_query(&key, || {
            self.sunrise_sunsets.find_by_location_id(location_id)
        })
        .await
    }

    /// Records on `date` (`YYYY-MM-DD`) joined to a location named
    /// `location_name`, cached under
    /// `SunriseSunset_Date_<date>_Location_<name>`.
    pub async fn get_by_date_and_location_name(
        &self,
        date: &str,
        location_name: &str,
    ) -> Result<Vec<SunriseSunsetDto>> {
        self.counter.increment();

        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
            Error::InvalidInput(format!("date {:?} is not {}: {}", date, DATE_FORMAT, e))
        })?;

        let key = CacheKey::query::<SunriseSunsetDto>(&[
            &QUERY_BY_DATE,
            &date,
            &QUERY_BY_LOCATION,
            &location_name,
        ]);
        self.cached_query(&key, || {
            self.sunrise_sunsets
                .find_by_date_and_location_name(date, location_name)
        })
        .await
    }

    /// Look up sun times for every record, then persist them all.
    ///
    /// Nothing is saved unless every lookup succeeds.
    pub async fn bulk_create(&self, dtos: Vec<SunriseSunsetDto>) -> Result<Vec<SunriseSunsetDto>> {
        self.counter.increment();

        let all_times = try_join_all(dtos.iter().map(|dto| self.lookup(dto))).await?;

        let mut entities = Vec::with_capacity(dtos.len());
        for (dto, times) in dtos.iter().zip(all_times) {
            let location_ids = self.resolve_locations(&dto.location_ids).await?;
            entities.push(Self::entity_from(None, dto, times, location_ids));
        }

        let saved = self.sunrise_sunsets.save_all(entities).await?;
        let saved_dtos: Vec<SunriseSunsetDto> = to_dtos(&saved);

        info!("Bulk created {} {} entries", saved_dtos.len(), ENTITY);
        self.cache.put_entities(&saved_dtos).await?;
        self.cache.remove(&CacheKey::all::<SunriseSunsetDto>()).await?;

        let related: Vec<i32> = saved
            .iter()
            .flat_map(|e| e.location_ids.iter().copied())
            .collect();
        self.evict_related(&[], &related).await?;

        Ok(saved_dtos)
    }

    /// Serve a list from `key`, or run `query`, cache each record under its
    /// own key and the list under `key`.
    async fn cached_query<F, Fut>(&self, key: &str, query: F) -> Result<Vec<SunriseSunsetDto>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<SunriseSunsetEntity>>>,
    {
        if let Some(dtos) = self.cache.get_list::<SunriseSunsetDto>(key).await? {
            debug!("✓ Cache hit for {}", key);
            return Ok(dtos);
        }

        debug!("✗ Cache miss for {}, querying repository", key);
        let entities = query().await?;
        let dtos: Vec<SunriseSunsetDto> = to_dtos(&entities);
        self.cache.put_entities(&dtos).await?;
        self.cache.put_list(key, &dtos).await?;
        Ok(dtos)
    }

    async fn lookup(&self, dto: &SunriseSunsetDto) -> Result<SunTimes> {
        self.sun_times
            .lookup(dto.latitude, dto.longitude, dto.date)
            .await
    }

    /// Existing location ids among `ids`, skipping the lookup when empty.
    async fn resolve_locations(&self, ids: &[i32]) -> Result<Vec<i32>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.locations.find_all_by_id(ids).await?;
        Ok(found.into_iter().filter_map(|l| l.id).collect())
    }

    /// An unlinked record appears in no derived query result.
    async fn evict_related(&self, before: &[i32], after: &[i32]) -> Result<()> {
        let related = union_ids(before, after);
        evict_entities::<B, LocationDto>(&self.cache, &related).await?;
        if !related.is_empty() {
            evict_derived_queries(&self.cache).await?;
        }
        Ok(())
    }

    fn entity_from(
        id: Option<i32>,
        dto: &SunriseSunsetDto,
        times: SunTimes,
        location_ids: Vec<i32>,
    ) -> SunriseSunsetEntity {
        SunriseSunsetEntity {
            id,
            date: dto.date,
            latitude: dto.latitude,
            longitude: dto.longitude,
            sunrise: Some(times.sunrise),
            sunset: Some(times.sunset),
            location_ids,
        }
    }
}
