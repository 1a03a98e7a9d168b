//! Sunrise/sunset lookup against an external time API.
//!
//! Services depend on [`SunTimesProvider`], not on HTTP. [`SunApiClient`]
//! is the production implementation over `reqwest`; tests plug in a stub.

pub mod client;
pub mod config;

pub use client::SunApiClient;
pub use config::SunApiConfig;

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

/// Sunrise and sunset for one place on one day, with UTC offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}

/// Source of sunrise/sunset times.
///
/// # Errors
///
/// Every failure (transport, timeout, bad status, bad payload) is reported as
/// [`Error::UpstreamUnavailable`].
#[allow(async_fn_in_trait)]
pub trait SunTimesProvider: Send + Sync {
    async fn lookup(&self, latitude: f64, longitude: f64, date: NaiveDate) -> Result<SunTimes>;
}

#[derive(Deserialize)]
struct SunApiResponse {
    #[serde(default)]
    results: Option<SunApiResults>,
    status: String,
}

#[derive(Deserialize)]
struct SunApiResults {
    sunrise: String,
    sunset: String,
}

const STATUS_OK: &str = "OK";

/// Parse an API response body.
///
/// Expects `{"results": {"sunrise": <RFC 3339>, "sunset": <RFC 3339>}, "status": "OK"}`.
pub fn parse_response(body: &str) -> Result<SunTimes> {
    let response: SunApiResponse = serde_json::from_str(body)
        .map_err(|e| Error::UpstreamUnavailable(format!("malformed payload: {}", e)))?;

    if response.status != STATUS_OK {
        return Err(Error::UpstreamUnavailable(format!(
            "upstream status {}",
            response.status
        )));
    }

    let results = response
        .results
        .ok_or_else(|| Error::UpstreamUnavailable("payload has no results".to_string()))?;

    Ok(SunTimes {
        sunrise: parse_timestamp("sunrise", &results.sunrise)?,
        sunset: parse_timestamp("sunset", &results.sunset)?,
    })
}

fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| Error::UpstreamUnavailable(format!("bad {} timestamp {:?}: {}", field, raw, e)))
}
