//! DTOs exchanged with callers, persisted entities, and the mapping between them.
//!
//! The relation between locations and sunrise/sunset records is many-to-many.
//! Both layers carry it as foreign ids; the store keeps the join rows.

use crate::entity::CacheEntity;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Location as seen by callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationDto {
    /// Assigned by the store on creation.
    #[serde(default)]
    pub id: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sunrise_sunset_ids: Vec<i32>,
}

impl LocationDto {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        LocationDto {
            id: None,
            name: name.into(),
            country: Some(country.into()),
            sunrise_sunset_ids: Vec::new(),
        }
    }

    pub fn with_sunrise_sunset_ids(mut self, ids: Vec<i32>) -> Self {
        self.sunrise_sunset_ids = ids;
        self
    }
}

impl CacheEntity for LocationDto {
    type Key = i32;

    fn cache_key(&self) -> Option<Self::Key> {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "Location"
    }
}

/// Sunrise/sunset record as seen by callers.
///
/// `sunrise` and `sunset` are filled in from the upstream lookup; values sent
/// in by callers are ignored on create and update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SunriseSunsetDto {
    #[serde(default)]
    pub id: Option<i32>,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub sunrise: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub sunset: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub location_ids: Vec<i32>,
}

impl SunriseSunsetDto {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64) -> Self {
        SunriseSunsetDto {
            id: None,
            date,
            latitude,
            longitude,
            sunrise: None,
            sunset: None,
            location_ids: Vec::new(),
        }
    }

    pub fn with_location_ids(mut self, ids: Vec<i32>) -> Self {
        self.location_ids = ids;
        self
    }
}

impl CacheEntity for SunriseSunsetDto {
    type Key = i32;

    fn cache_key(&self) -> Option<Self::Key> {
        self.id
    }

    fn cache_prefix() -> &'static str {
        "SunriseSunset"
    }
}

/// Persisted location row plus its join rows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationEntity {
    /// `None` until saved.
    pub id: Option<i32>,
    pub name: String,
    pub country: Option<String>,
    pub sunrise_sunset_ids: Vec<i32>,
}

/// Persisted sunrise/sunset row plus its join rows.
#[derive(Clone, Debug, PartialEq)]
pub struct SunriseSunsetEntity {
    pub id: Option<i32>,
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub location_ids: Vec<i32>,
}

impl From<&LocationEntity> for LocationDto {
    fn from(entity: &LocationEntity) -> Self {
        LocationDto {
            id: entity.id,
            name: entity.name.clone(),
            country: entity.country.clone(),
            sunrise_sunset_ids: entity.sunrise_sunset_ids.clone(),
        }
    }
}

impl From<&SunriseSunsetEntity> for SunriseSunsetDto {
    fn from(entity: &SunriseSunsetEntity) -> Self {
        SunriseSunsetDto {
            id: entity.id,
            date: entity.date,
            latitude: entity.latitude,
            longitude: entity.longitude,
            sunrise: entity.sunrise,
            sunset: entity.sunset,
            location_ids: entity.location_ids.clone(),
        }
    }
}

/// Convert a slice of entities into DTOs.
pub fn to_dtos<'a, E: 'a, D>(entities: impl IntoIterator<Item = &'a E>) -> Vec<D>
where
    D: From<&'a E>,
{
    entities.into_iter().map(D::from).collect()
}
