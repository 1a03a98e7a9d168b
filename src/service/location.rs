//! Location service.

use super::{evict_derived_queries, evict_entities, relations_changed, union_ids};
use crate::backend::CacheBackend;
use crate::cache::EntityCache;
use crate::counter::RequestCounter;
use crate::error::{Error, Result};
use crate::key::CacheKey;
use crate::model::{to_dtos, LocationDto, LocationEntity, SunriseSunsetDto};
use crate::repository::{LocationRepository, SunriseSunsetRepository};
use std::collections::BTreeSet;
use std::sync::Arc;

const ENTITY: &str = "Location";

/// CRUD and bulk operations over locations, fronted by the shared cache.
///
/// # Errors
///
/// - `Error::NotFound` when a by-id read, update or delete names a location
///   the repository does not hold.
/// - `Error::RepositoryError` / `Error::BackendError` are propagated as-is.
pub struct LocationService<B: CacheBackend, L, S> {
    locations: Arc<L>,
    sunrise_sunsets: Arc<S>,
    cache: EntityCache<B>,
    counter: Arc<RequestCounter>,
}

impl<B, L, S> LocationService<B, L, S>
where
    B: CacheBackend,
    L: LocationRepository,
    S: SunriseSunsetRepository,
{
    pub fn new(
        locations: Arc<L>,
        sunrise_sunsets: Arc<S>,
        cache: EntityCache<B>,
        counter: Arc<RequestCounter>,
    ) -> Self {
        LocationService {
            locations,
            sunrise_sunsets,
            cache,
            counter,
        }
    }

    pub fn cache(&self) -> &EntityCache<B> {
        &self.cache
    }

    /// Persist a new location.
    ///
    /// Unknown sunrise/sunset ids in `dto` are dropped. The result is cached
    /// under `Location_<id>`; `Location_All` is invalidated.
    pub async fn create(&self, dto: LocationDto) -> Result<LocationDto> {
        self.counter.increment();

        let sunrise_sunset_ids = self.resolve_sunrise_sunsets(&dto.sunrise_sunset_ids).await?;
        let saved = self
            .locations
            .save(LocationEntity {
                id: None,
                name: dto.name,
                country: dto.country,
                sunrise_sunset_ids,
            })
            .await?;
        let saved_dto = LocationDto::from(&saved);

        info!("Caching {} {:?} after creation", ENTITY, saved_dto.id);
        self.cache.put_entity(&saved_dto).await?;
        self.cache.remove(&CacheKey::all::<LocationDto>()).await?;
        self.evict_related(&[], &saved.sunrise_sunset_ids, false).await?;

        Ok(saved_dto)
    }

    /// Location by id, from cache when present.
    pub async fn get_by_id(&self, id: i32) -> Result<LocationDto> {
        self.counter.increment();

        let key = CacheKey::entity::<LocationDto>(&id);
        if let Some(dto) = self.cache.get::<LocationDto>(&key).await? {
            debug!("✓ Cache hit for {}", key);
            return Ok(dto);
        }

        debug!("✗ Cache miss for {}, querying repository", key);
        let entity = self
            .locations
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        let dto = LocationDto::from(&entity);
        self.cache.put(&key, &dto).await?;
        Ok(dto)
    }

    /// Locations for the subset of `ids` that exist.
    ///
    /// Always reads the repository; each result is cached under its own key.
    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<LocationDto>> {
        self.counter.increment();

        let entities = self.locations.find_all_by_id(ids).await?;
        let dtos: Vec<LocationDto> = to_dtos(&entities);
        self.cache.put_entities(&dtos).await?;
        Ok(dtos)
    }

    /// All locations, from `Location_All` when present.
    pub async fn get_all(&self) -> Result<Vec<LocationDto>> {
        self.counter.increment();

        let key = CacheKey::all::<LocationDto>();
        if let Some(dtos) = self.cache.get_list::<LocationDto>(&key).await? {
            debug!("✓ Cache hit for all Locations");
            return Ok(dtos);
        }

        debug!("✗ Cache miss for all Locations, querying repository");
        let entities = self.locations.find_all().await?;
        let dtos: Vec<LocationDto> = to_dtos(&entities);
        self.cache.put_entities(&dtos).await?;
        self.cache.put_list(&key, &dtos).await?;
        Ok(dtos)
    }

    /// Replace name, country and relation set of location `id`.
    ///
    /// An empty `sunrise_sunset_ids` clears the relation.
    pub async fn update(&self, id: i32, dto: LocationDto) -> Result<LocationDto> {
        self.counter.increment();

        let existing = self
            .locations
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        let sunrise_sunset_ids = self.resolve_sunrise_sunsets(&dto.sunrise_sunset_ids).await?;
        let updated = self
            .locations
            .save(LocationEntity {
                id: Some(id),
                name: dto.name,
                country: dto.country,
                sunrise_sunset_ids,
            })
            .await?;
        let updated_dto = LocationDto::from(&updated);

        info!("Updated {} {}", ENTITY, id);
        self.cache.put_entity(&updated_dto).await?;
        self.cache.remove(&CacheKey::all::<LocationDto>()).await?;
        self.evict_related(
            &existing.sunrise_sunset_ids,
            &updated.sunrise_sunset_ids,
            existing.name != updated.name,
        )
        .await?;

        Ok(updated_dto)
    }

    /// Delete location `id` and its join rows.
    pub async fn delete(&self, id: i32) -> Result<()> {
        self.counter.increment();

        let existing = self
            .locations
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(ENTITY, id))?;

        self.locations.delete_by_id(id).await?;

        info!("Deleted {} {}", ENTITY, id);
        self.cache.remove(&CacheKey::entity::<LocationDto>(&id)).await?;
        self.cache.remove(&CacheKey::all::<LocationDto>()).await?;
        self.evict_related(&existing.sunrise_sunset_ids, &[], false).await?;

        Ok(())
    }

    /// Persist many locations at once.
    ///
    /// `Location_All` is invalidated once, after every entity is cached.
    pub async fn bulk_create(&self, dtos: Vec<LocationDto>) -> Result<Vec<LocationDto>> {
        self.counter.increment();

        let mut entities = Vec::with_capacity(dtos.len());
        for dto in dtos {
            entities.push(LocationEntity {
                id: None,
                sunrise_sunset_ids: self.resolve_sunrise_sunsets(&dto.sunrise_sunset_ids).await?,
                name: dto.name,
                country: dto.country,
            });
        }

        let saved = self.locations.save_all(entities).await?;
        let saved_dtos: Vec<LocationDto> = to_dtos(&saved);

        info!("Bulk created {} {} entries", saved_dtos.len(), ENTITY);
        self.cache.put_entities(&saved_dtos).await?;
        self.cache.remove(&CacheKey::all::<LocationDto>()).await?;

        let related: Vec<i32> = saved
            .iter()
            .flat_map(|e| e.sunrise_sunset_ids.iter().copied())
            .collect();
        self.evict_related(&[], &related, false).await?;

        Ok(saved_dtos)
    }

    /// Delete many locations, detaching them from their sunrise/sunset
    /// records first.
    ///
    /// Unknown ids are ignored.
    pub async fn bulk_delete(&self, ids: &[i32]) -> Result<()> {
        self.counter.increment();

        let targets = self.locations.find_all_by_id(ids).await?;
        let target_ids: BTreeSet<i32> = targets.iter().filter_map(|l| l.id).collect();
        let related: BTreeSet<i32> = targets
            .iter()
            .flat_map(|l| l.sunrise_sunset_ids.iter().copied())
            .collect();

        if !related.is_empty() {
            let related_ids: Vec<i32> = related.iter().copied().collect();
            let mut records = self.sunrise_sunsets.find_all_by_id(&related_ids).await?;
            for record in &mut records {
                record.location_ids.retain(|l| !target_ids.contains(l));
            }
            self.sunrise_sunsets.save_all(records).await?;
            debug!(
                "Detached {} {} entries from {} sunrise/sunset records",
                target_ids.len(),
                ENTITY,
                related.len()
            );
        }

        let detached: Vec<LocationEntity> = targets
            .into_iter()
            .map(|mut l| {
                l.sunrise_sunset_ids.clear();
                l
            })
            .collect();
        self.locations.save_all(detached).await?;
        self.locations.delete_all_by_id(ids).await?;

        info!("Bulk deleted {} {} entries", target_ids.len(), ENTITY);
        let keys: Vec<String> = ids
            .iter()
            .map(|id| CacheKey::entity::<LocationDto>(id))
            .collect();
        self.cache.remove_many(&keys).await?;
        self.cache.remove(&CacheKey::all::<LocationDto>()).await?;
        evict_entities::<B, SunriseSunsetDto>(&self.cache, &related).await?;
        if !related.is_empty() {
            evict_derived_queries(&self.cache).await?;
        }

        Ok(())
    }

    /// Existing sunrise/sunset ids among `ids`, skipping the lookup when empty.
    async fn resolve_sunrise_sunsets(&self, ids: &[i32]) -> Result<Vec<i32>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = self.sunrise_sunsets.find_all_by_id(ids).await?;
        Ok(found.into_iter().filter_map(|s| s.id).collect())
    }

    /// Derived queries join through relation rows and match on location
    /// name, so they survive writes that change neither.
    async fn evict_related(&self, before: &[i32], after: &[i32], renamed: bool) -> Result<()> {
        evict_entities::<B, SunriseSunsetDto>(&self.cache, &union_ids(before, after)).await?;
        if renamed || relations_changed(before, after) {
            evict_derived_queries(&self.cache).await?;
        }
        Ok(())
    }
}
