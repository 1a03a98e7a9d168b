//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveDate};
use sun_cache::backend::InMemoryBackend;
use sun_cache::observability::CacheCounters;
use sun_cache::repository::InMemoryStore;
use sun_cache::{EntityCache, Error, Result, Services, SunTimes, SunTimesProvider};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Provider answering 08:00 / 16:00 UTC on the requested day.
#[derive(Default)]
pub struct StubSunTimes {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StubSunTimes {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SunTimesProvider for StubSunTimes {
    async fn lookup(&self, _latitude: f64, _longitude: f64, date: NaiveDate) -> Result<SunTimes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::UpstreamUnavailable("stub upstream is down".to_string()));
        }
        Ok(SunTimes {
            sunrise: ts(&format!("{}T08:00:00+00:00", date)),
            sunset: ts(&format!("{}T16:00:00+00:00", date)),
        })
    }
}

pub type TestServices = Services<InMemoryBackend, InMemoryStore, StubSunTimes>;

pub struct Fixture {
    pub services: TestServices,
    pub store: Arc<InMemoryStore>,
    pub backend: InMemoryBackend,
    pub sun: Arc<StubSunTimes>,
    pub metrics: Arc<CacheCounters>,
}

pub fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = InMemoryBackend::new();
    let metrics = Arc::new(CacheCounters::new());
    let cache = EntityCache::new(backend.clone()).with_metrics(metrics.clone());
    let store = Arc::new(InMemoryStore::new());
    let sun = Arc::new(StubSunTimes::default());

    Fixture {
        services: Services::new(cache, Arc::clone(&store), Arc::clone(&sun)),
        store,
        backend,
        sun,
        metrics,
    }
}

pub fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("valid RFC 3339 timestamp")
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}
