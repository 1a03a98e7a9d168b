//! # sun-cache
//!
//! Cache-consistent services for named locations and their sunrise/sunset
//! records.
//!
//! ## Features
//!
//! - **Read-through cache:** Single-entity, aggregate and derived-query keys in one shared store
//! - **Write invalidation:** Every write re-caches the entity and evicts whatever it made stale
//! - **Typed entries:** Kind-tagged envelopes, so a cached value is never read back as the wrong type
//! - **Store agnostic:** Services consume repository traits; [`repository::InMemoryStore`] ships for tests
//! - **Upstream lookup:** Sunrise/sunset times from an HTTP API behind [`sun_api::SunTimesProvider`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use sun_cache::{
//!     backend::InMemoryBackend,
//!     model::{LocationDto, SunriseSunsetDto},
//!     repository::InMemoryStore,
//!     sun_api::SunApiClient,
//!     EntityCache, Services,
//! };
//! use std::sync::Arc;
//!
//! // 1. One cache, one store, one upstream client
//! let cache = EntityCache::new(InMemoryBackend::new());
//! let store = Arc::new(InMemoryStore::new());
//! let sun_api = Arc::new(SunApiClient::from_env()?);
//!
//! // 2. Both services share them, plus one request counter
//! let services = Services::new(cache, store, sun_api);
//!
//! // 3. Writes persist and cache
//! let oslo = services.locations.create(LocationDto::new("Oslo", "Norway")).await?;
//! let date = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//! services
//!     .sunrise_sunsets
//!     .create(SunriseSunsetDto::new(date, 59.91, 10.75).with_location_ids(vec![oslo.id.unwrap()]))
//!     .await?;
//!
//! // 4. Reads are served from cache until a write invalidates them
//! let records = services
//!     .sunrise_sunsets
//!     .get_by_date_and_location_name("2023-01-01", "Oslo")
//!     .await?;
//! assert_eq!(services.counter().value(), 3);
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod counter;
pub mod entity;
pub mod error;
pub mod key;
pub mod model;
pub mod observability;
pub mod repository;
pub mod serialization;
pub mod service;
pub mod sun_api;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cache::EntityCache;
pub use counter::RequestCounter;
pub use entity::CacheEntity;
pub use error::{Error, Result};
pub use key::CacheKey;
pub use service::{LocationService, Services, SunriseSunsetService};
pub use sun_api::{SunTimes, SunTimesProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
