//! Repository traits for the relational store, plus an in-memory implementation.
//!
//! The services never talk to a database directly. They consume
//! [`LocationRepository`] and [`SunriseSunsetRepository`], which mirror the
//! usual CRUD surface plus two join queries. Implement them over SQLx,
//! Diesel or anything else; [`InMemoryStore`] implements both over one set of
//! tables and is what the tests run against.
//!
//! # Relation semantics
//!
//! Saving an entity replaces *that side's* join rows with the ids it carries.
//! Deleting an entity removes its row and all of its join rows. Linking to an
//! id that does not exist on the other side is a foreign-key violation.
//!
//! # Example
//!
//! ```ignore
//! use sun_cache::repository::{InMemoryStore, LocationRepository};
//! use sun_cache::model::LocationEntity;
//!
//! let store = InMemoryStore::new();
//! let saved = LocationRepository::save(&store, LocationEntity {
//!     name: "Paris".into(),
//!     ..Default::default()
//! }).await?;
//! assert!(saved.id.is_some());
//! ```

use crate::error::{Error, Result};
use crate::model::{LocationEntity, SunriseSunsetEntity};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Store operations over locations.
///
/// # Errors
///
/// Every method returns `Err(Error::RepositoryError)` when the store fails.
/// Absence is not an error: `find_by_id` returns `Ok(None)`, deletes of
/// unknown ids are no-ops.
#[allow(async_fn_in_trait)]
pub trait LocationRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<LocationEntity>>;

    /// Fetch the subset of `ids` that exist. Unknown ids are skipped.
    async fn find_all_by_id(&self, ids: &[i32]) -> Result<Vec<LocationEntity>>;

    async fn find_all(&self) -> Result<Vec<LocationEntity>>;

    /// Insert (no id) or update (id set). Returns the stored entity with its id.
    async fn save(&self, entity: LocationEntity) -> Result<LocationEntity>;

    async fn save_all(&self, entities: Vec<LocationEntity>) -> Result<Vec<LocationEntity>> {
        let mut saved = Vec::with_capacity(entities.len());
        for entity in entities {
            saved.push(self.save(entity).await?);
        }
        Ok(saved)
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn delete_by_id(&self, id: i32) -> Result<()>;

    async fn delete_all_by_id(&self, ids: &[i32]) -> Result<()> {
        for id in ids {
            self.delete_by_id(*id).await?;
        }
        Ok(())
    }
}

/// Store operations over sunrise/sunset records.
///
/// Same contract as [`LocationRepository`], plus the two join queries.
#[allow(async_fn_in_trait)]
pub trait SunriseSunsetRepository: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<Option<SunriseSunsetEntity>>;

    async fn find_all_by_id(&self, ids: &[i32]) -> Result<Vec<SunriseSunsetEntity>>;

    async fn find_all(&self) -> Result<Vec<SunriseSunsetEntity>>;

    async fn save(&self, entity: SunriseSunsetEntity) -> Result<SunriseSunsetEntity>;

    async fn save_all(
        &self,
        entities: Vec<SunriseSunsetEntity>,
    ) -> Result<Vec<SunriseSunsetEntity>> {
        let mut saved = Vec::with_capacity(entities.len());
        for entity in entities {
            saved.push(self.save(entity).await?);
        }
        Ok(saved)
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }

    async fn delete_by_id(&self, id: i32) -> Result<()>;

    async fn delete_all_by_id(&self, ids: &[i32]) -> Result<()> {
        for id in ids {
            self.delete_by_id(*id).await?;
        }
        Ok(())
    }

    /// Records joined to the location with `location_id`.
    async fn find_by_location_id(&self, location_id: i32) -> Result<Vec<SunriseSunsetEntity>>;

    /// Records on exactly `date` joined to a location named `location_name`.
    async fn find_by_date_and_location_name(
        &self,
        date: NaiveDate,
        location_name: &str,
    ) -> Result<Vec<SunriseSunsetEntity>>;
}

// ============================================================================
// In-Memory Store
// ============================================================================

#[derive(Clone)]
struct LocationRow {
    name: String,
    country: Option<String>,
}

#[derive(Clone)]
struct SunriseSunsetRow {
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    sunrise: Option<DateTime<FixedOffset>>,
    sunset: Option<DateTime<FixedOffset>>,
}

/// Tables behind [`InMemoryStore`].
#[derive(Default)]
struct Tables {
    locations: BTreeMap<i32, LocationRow>,
    sunrise_sunsets: BTreeMap<i32, SunriseSunsetRow>,
    /// Join table: (location_id, sunrise_sunset_id)
    links: BTreeSet<(i32, i32)>,
    next_location_id: i32,
    next_sunrise_sunset_id: i32,
}

impl Tables {
    fn location(&self, id: i32) -> Option<LocationEntity> {
        self.locations.get(&id).map(|row| LocationEntity {
            id: Some(id),
            name: row.name.clone(),
            country: row.country.clone(),
            sunrise_sunset_ids: self
                .links
                .iter()
                .filter(|(l, _)| *l == id)
                .map(|(_, s)| *s)
                .collect(),
        })
    }

    fn sunrise_sunset(&self, id: i32) -> Option<SunriseSunsetEntity> {
        self.sunrise_sunsets.get(&id).map(|row| SunriseSunsetEntity {
            id: Some(id),
            date: row.date,
            latitude: row.latitude,
            longitude: row.longitude,
            sunrise: row.sunrise,
            sunset: row.sunset,
            location_ids: self
                .links
                .iter()
                .filter(|(_, s)| *s == id)
                .map(|(l, _)| *l)
                .collect(),
        })
    }

    fn assign_location_id(&mut self, requested: Option<i32>) -> i32 {
        match requested {
            Some(id) => {
                self.next_location_id = self.next_location_id.max(id);
                id
            }
            None => {
                self.next_location_id += 1;
                self.next_location_id
            }
        }
    }

    fn assign_sunrise_sunset_id(&mut self, requested: Option<i32>) -> i32 {
        match requested {
            Some(id) => {
                self.next_sunrise_sunset_id = self.next_sunrise_sunset_id.max(id);
                id
            }
            None => {
                self.next_sunrise_sunset_id += 1;
                self.next_sunrise_sunset_id
            }
        }
    }
}

/// In-memory stand-in for the relational store.
///
/// Implements both repository traits over shared tables with
/// identity-assigned ids and a join table. Every read and write call is
/// counted so tests can tell a cache hit from a store round trip.
///
/// Both traits name their methods alike; call them through the trait when
/// the receiver is the concrete store:
///
/// ```ignore
/// LocationRepository::find_by_id(&store, 1).await?;
/// SunriseSunsetRepository::find_by_id(&store, 1).await?;
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of rows in the join table.
    pub async fn link_count(&self) -> usize {
        self.tables.read().await.links.len()
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl LocationRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<LocationEntity>> {
        self.count_read();
        Ok(self.tables.read().await.location(id))
    }

    async fn find_all_by_id(&self, ids: &[i32]) -> Result<Vec<LocationEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        let unique: BTreeSet<i32> = ids.iter().copied().collect();
        Ok(unique.into_iter().filter_map(|id| tables.location(id)).collect())
    }

    async fn find_all(&self) -> Result<Vec<LocationEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        Ok(tables
            .locations
            .keys()
            .filter_map(|id| tables.location(*id))
            .collect())
    }

    async fn save(&self, entity: LocationEntity) -> Result<LocationEntity> {
        self.count_write();
        let mut tables = self.tables.write().await;

        if let Some(missing) = entity
            .sunrise_sunset_ids
            .iter()
            .find(|id| !tables.sunrise_sunsets.contains_key(*id))
        {
            return Err(Error::RepositoryError(format!(
                "foreign key violation: sunrise_sunset {} does not exist",
                missing
            )));
        }

        let id = tables.assign_location_id(entity.id);
        tables.locations.insert(
            id,
            LocationRow {
                name: entity.name,
                country: entity.country,
            },
        );
        tables.links.retain(|(l, _)| *l != id);
        for s in entity.sunrise_sunset_ids {
            tables.links.insert((id, s));
        }

        tables
            .location(id)
            .ok_or_else(|| Error::RepositoryError(format!("location {} vanished on save", id)))
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool> {
        self.count_read();
        Ok(self.tables.read().await.locations.contains_key(&id))
    }

    async fn delete_by_id(&self, id: i32) -> Result<()> {
        self.count_write();
        let mut tables = self.tables.write().await;
        tables.locations.remove(&id);
        tables.links.retain(|(l, _)| *l != id);
        Ok(())
    }
}

impl SunriseSunsetRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<SunriseSunsetEntity>> {
        self.count_read();
        Ok(self.tables.read().await.sunrise_sunset(id))
    }

    async fn find_all_by_id(&self, ids: &[i32]) -> Result<Vec<SunriseSunsetEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        let unique: BTreeSet<i32> = ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| tables.sunrise_sunset(id))
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<SunriseSunsetEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        Ok(tables
            .sunrise_sunsets
            .keys()
            .filter_map(|id| tables.sunrise_sunset(*id))
            .collect())
    }

    async fn save(&self, entity: SunriseSunsetEntity) -> Result<SunriseSunsetEntity> {
        self.count_write();
        let mut tables = self.tables.write().await;

        if let Some(missing) = entity
            .location_ids
            .iter()
            .find(|id| !tables.locations.contains_key(*id))
        {
            return Err(Error::RepositoryError(format!(
                "foreign key violation: location {} does not exist",
                missing
            )));
        }

        let id = tables.assign_sunrise_sunset_id(entity.id);
        tables.sunrise_sunsets.insert(
            id,
            SunriseSunsetRow {
                date: entity.date,
                latitude: entity.latitude,
                longitude: entity.longitude,
                sunrise: entity.sunrise,
                sunset: entity.sunset,
            },
        );
        tables.links.retain(|(_, s)| *s != id);
        for l in entity.location_ids {
            tables.links.insert((l, id));
        }

        tables.sunrise_sunset(id).ok_or_else(|| {
            Error::RepositoryError(format!("sunrise_sunset {} vanished on save", id))
        })
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool> {
        self.count_read();
        Ok(self.tables.read().await.sunrise_sunsets.contains_key(&id))
    }

    async fn delete_by_id(&self, id: i32) -> Result<()> {
        self.count_write();
        let mut tables = self.tables.write().await;
        tables.sunrise_sunsets.remove(&id);
        tables.links.retain(|(_, s)| *s != id);
        Ok(())
    }

    async fn find_by_location_id(&self, location_id: i32) -> Result<Vec<SunriseSunsetEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        Ok(tables
            .links
            .iter()
            .filter(|(l, _)| *l == location_id)
            .filter_map(|(_, s)| tables.sunrise_sunset(*s))
            .collect())
    }

    async fn find_by_date_and_location_name(
        &self,
        date: NaiveDate,
        location_name: &str,
    ) -> Result<Vec<SunriseSunsetEntity>> {
        self.count_read();
        let tables = self.tables.read().await;
        let matching: BTreeSet<i32> = tables
            .links
            .iter()
            .filter(|(l, s)| {
                tables
                    .locations
                    .get(l)
                    .is_some_and(|row| row.name == location_name)
                    && tables.sunrise_sunsets.get(s).is_some_and(|row| row.date == date)
            })
            .map(|(_, s)| *s)
            .collect();
        Ok(matching
            .into_iter()
            .filter_map(|id| tables.sunrise_sunset(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(d: &str, location_ids: Vec<i32>) -> SunriseSunsetEntity {
        SunriseSunsetEntity {
            id: None,
            date: date(d),
            latitude: 48.8566,
            longitude: 2.3522,
            sunrise: None,
            sunset: None,
            location_ids,
        }
    }

    fn location(name: &str, sunrise_sunset_ids: Vec<i32>) -> LocationEntity {
        LocationEntity {
            id: None,
            name: name.to_string(),
            country: Some("France".to_string()),
            sunrise_sunset_ids,
        }
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let store = InMemoryStore::new();

        let a = LocationRepository::save(&store, location("Paris", vec![]))
            .await
            .unwrap();
        let b = LocationRepository::save(&store, location("Lyon", vec![]))
            .await
            .unwrap();

        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_relation_is_visible_from_both_sides() {
        let store = InMemoryStore::new();
        let ss = SunriseSunsetRepository::save(&store, record("2023-01-01", vec![]))
            .await
            .unwrap();
        let loc = LocationRepository::save(&store, location("Paris", vec![ss.id.unwrap()]))
            .await
            .unwrap();

        assert_eq!(loc.sunrise_sunset_ids, vec![1]);

        let reloaded = SunriseSunsetRepository::find_by_id(&store, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.location_ids, vec![loc.id.unwrap()]);
    }

    #[tokio::test]
    async fn test_save_replaces_own_side_of_relation() {
        let store = InMemoryStore::new();
        SunriseSunsetRepository::save(&store, record("2023-01-01", vec![]))
            .await
            .unwrap();
        SunriseSunsetRepository::save(&store, record("2023-01-02", vec![]))
            .await
            .unwrap();
        let mut loc = LocationRepository::save(&store, location("Paris", vec![1, 2]))
            .await
            .unwrap();
        assert_eq!(store.link_count().await, 2);

        loc.sunrise_sunset_ids = vec![2];
        let loc = LocationRepository::save(&store, loc).await.unwrap();

        assert_eq!(loc.sunrise_sunset_ids, vec![2]);
        assert_eq!(store.link_count().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_key_violation() {
        let store = InMemoryStore::new();

        let result = LocationRepository::save(&store, location("Paris", vec![99])).await;

        assert!(matches!(result, Err(Error::RepositoryError(_))));
        assert!(LocationRepository::find_all(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_all_by_id_skips_unknown() {
        let store = InMemoryStore::new();
        LocationRepository::save(&store, location("Paris", vec![]))
            .await
            .unwrap();

        let found = LocationRepository::find_all_by_id(&store, &[1, 1, 5])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let store = InMemoryStore::new();
        SunriseSunsetRepository::save(&store, record("2023-01-01", vec![]))
            .await
            .unwrap();
        LocationRepository::save(&store, location("Paris", vec![1]))
            .await
            .unwrap();

        assert!(LocationRepository::exists_by_id(&store, 1).await.unwrap());

        LocationRepository::delete_by_id(&store, 1).await.unwrap();
        LocationRepository::delete_by_id(&store, 1).await.unwrap();

        assert!(!LocationRepository::exists_by_id(&store, 1).await.unwrap());
        assert_eq!(store.link_count().await, 0);
        let ss = SunriseSunsetRepository::find_by_id(&store, 1)
            .await
            .unwrap()
            .unwrap();
        assert!(ss.location_ids.is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_by_id() {
        let store = InMemoryStore::new();
        for d in ["2023-01-01", "2023-01-02", "2023-01-03"] {
            SunriseSunsetRepository::save(&store, record(d, vec![]))
                .await
                .unwrap();
        }

        SunriseSunsetRepository::delete_all_by_id(&store, &[1, 3])
            .await
            .unwrap();

        let left = SunriseSunsetRepository::find_all(&store).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, Some(2));
    }

    #[tokio::test]
    async fn test_join_queries() {
        let store = InMemoryStore::new();
        let paris = LocationRepository::save(&store, location("Paris", vec![]))
            .await
            .unwrap()
            .id
            .unwrap();
        let lyon = LocationRepository::save(&store, location("Lyon", vec![]))
            .await
            .unwrap()
            .id
            .unwrap();

        SunriseSunsetRepository::save_all(
            &store,
            vec![
                record("2023-01-01", vec![paris]),
                record("2023-01-02", vec![paris, lyon]),
                record("2023-01-01", vec![lyon]),
            ],
        )
        .await
        .unwrap();

        let by_paris = store.find_by_location_id(paris).await.unwrap();
        assert_eq!(
            by_paris.iter().map(|e| e.id.unwrap()).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let lyon_jan_1 = store
            .find_by_date_and_location_name(date("2023-01-01"), "Lyon")
            .await
            .unwrap();
        assert_eq!(lyon_jan_1.len(), 1);
        assert_eq!(lyon_jan_1[0].id, Some(3));

        let nowhere = store
            .find_by_date_and_location_name(date("2023-01-01"), "Nice")
            .await
            .unwrap();
        assert!(nowhere.is_empty());
    }

    #[tokio::test]
    async fn test_read_counter() {
        let store = InMemoryStore::new();
        let before = store.read_count();

        LocationRepository::find_all(&store).await.unwrap();
        SunriseSunsetRepository::find_by_id(&store, 1).await.unwrap();

        assert_eq!(store.read_count(), before + 2);
    }
}
