//! HTTP client for the sunrise/sunset API.

use super::{parse_response, SunApiConfig, SunTimes, SunTimesProvider};
use crate::error::{Error, Result};
use chrono::NaiveDate;
use reqwest::Client;

/// [`SunTimesProvider`] over HTTP.
///
/// Issues `GET <base_url>?lat=..&lng=..&date=YYYY-MM-DD&formatted=0` and
/// parses the JSON body. Cloning shares the connection pool.
///
/// # Example
///
/// ```no_run
/// # use sun_cache::sun_api::{SunApiClient, SunApiConfig, SunTimesProvider};
/// # use sun_cache::error::Result;
/// # async fn example() -> Result<()> {
/// let client = SunApiClient::new(SunApiConfig::default())?;
/// let date = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let times = client.lookup(55.7558, 37.6173, date).await?;
/// println!("{} -> {}", times.sunrise, times.sunset);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SunApiClient {
    client: Client,
    config: SunApiConfig,
}

impl SunApiClient {
    /// Create a client from validated configuration.
    ///
    /// # Errors
    /// Returns `Err(Error::ConfigError)` if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: SunApiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "✓ Sun API client initialized: {} (timeout {:?})",
            config.base_url, config.timeout
        );

        Ok(SunApiClient { client, config })
    }

    /// Create a client from `SUN_API_URL` / `SUN_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::new(SunApiConfig::from_env()?)
    }

    pub fn config(&self) -> &SunApiConfig {
        &self.config
    }

    async fn fetch(&self, latitude: f64, longitude: f64, date: NaiveDate) -> Result<SunTimes> {
        let query = [
            ("lat", format!("{:.6}", latitude)),
            ("lng", format!("{:.6}", longitude)),
            ("date", date.format("%Y-%m-%d").to_string()),
            ("formatted", "0".to_string()),
        ];

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        parse_response(&body)
    }
}

impl SunTimesProvider for SunApiClient {
    async fn lookup(&self, latitude: f64, longitude: f64, date: NaiveDate) -> Result<SunTimes> {
        debug!("Sun API lookup: lat={} lng={} date={}", latitude, longitude, date);

        let result = self.fetch(latitude, longitude, date).await;
        if let Err(e) = &result {
            warn!(
                "Sun API lookup failed for lat={} lng={} date={}: {}",
                latitude, longitude, date, e
            );
        }
        result
    }
}
