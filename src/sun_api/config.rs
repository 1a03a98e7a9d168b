//! Settings for the sunrise/sunset HTTP client.

use crate::error::{Error, Result};
use std::time::Duration;

/// Public endpoint of sunrise-sunset.org.
pub const DEFAULT_BASE_URL: &str = "https://api.sunrise-sunset.org/json";

/// Request timeout used unless overridden.
/// Override with SUN_API_TIMEOUT_SECS environment variable
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the endpoint URL.
pub const ENV_BASE_URL: &str = "SUN_API_URL";

/// Environment variable holding the request timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "SUN_API_TIMEOUT_SECS";

/// Configuration for [`SunApiClient`](super::SunApiClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SunApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SunApiConfig {
    fn default() -> Self {
        SunApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("sun-cache/{}", crate::VERSION),
        }
    }
}

impl SunApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Defaults overridden by `SUN_API_URL` and `SUN_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    /// Returns `Err(Error::ConfigError)` if a variable is set but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = SunApiConfig::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("{}={:?} is not a number: {}", ENV_TIMEOUT_SECS, raw, e))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings before a client is built from them.
    ///
    /// # Errors
    /// Returns `Err(Error::ConfigError)` for a non-HTTP URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::ConfigError(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(Error::ConfigError("timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
