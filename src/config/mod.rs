//! Configuration for the scrape pipeline
//!
//! `ScraperConfig` plus its type-safe builder, JSON loading and validation.

pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

pub use builder::{ScraperConfigBuilder, WithTargets};
pub use types::{BrowserEngine, BrowserSettings, ReadinessSettings, ScraperConfig};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("At least one scrape target is required")]
    NoTargets,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Target {0} has an empty department")]
    EmptyDepartment(String),

    #[error("{0}")]
    InvalidSchedule(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
