//! Loading and validation for `ScraperConfig`

use std::path::Path;

use url::Url;

use super::ConfigError;
use super::types::ScraperConfig;
use crate::scheduler::CronSchedule;

impl ScraperConfig {
    /// Parse a JSON document; omitted fields take their defaults
    ///
    /// # Errors
    ///
    /// `Parse` on malformed JSON, or any validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, otherwise as `from_json_str`.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&raw)
    }

    /// Check every invariant the pipeline relies on
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }

        for target in &self.targets {
            let parsed = Url::parse(&target.url).map_err(|e| ConfigError::InvalidUrl {
                url: target.url.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl {
                    url: target.url.clone(),
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
            if target.department.trim().is_empty() {
                return Err(ConfigError::EmptyDepartment(target.url.clone()));
            }
        }

        for expression in [&self.schedule, &self.health_schedule] {
            CronSchedule::parse(expression).map_err(|e| ConfigError::InvalidSchedule(e.to_string()))?;
        }

        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(ConfigError::Invalid("viewport dimensions must be non-zero".into()));
        }
        if self.browser.navigation_timeout_secs == 0 {
            return Err(ConfigError::Invalid("navigation timeout must be non-zero".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history capacity must be non-zero".into()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff multiplier {} is below 1.0",
                self.retry.backoff_multiplier
            )));
        }

        if let Some(proxy) = &self.browser.proxy_server {
            Url::parse(proxy).map_err(|e| ConfigError::InvalidUrl {
                url: proxy.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }
}
