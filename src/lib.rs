//! Recipe-Harvest: a politeness-paced recipe crawler
//!
//! This crate runs one independently paced crawl task per recipe site. Each
//! task walks a resumable frontier (a numeric-ID enumeration or a set of
//! links replayed from downloaded sitemaps), retires itself once failures
//! become too dense, and writes extracted recipes into rotating JSON shards.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod frontier;
pub mod output;
pub mod progress;
pub mod sitemap;
pub mod state;

use thiserror::Error;

/// Main error type for Recipe-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Invalid response from {url}: HTTP {status}")]
    InvalidResponse { url: String, status: u16 },

    #[error("All {max} output shards for {date} are taken")]
    ShardCapacity { date: String, max: u32 },

    #[error("Failed to parse sitemap {file}: {message}")]
    SitemapParse { file: String, message: String },

    #[error("Output worker is no longer running")]
    WorkerClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Site '{site}' is missing required parameter '{parameter}'")]
    MissingParameter { site: String, parameter: String },

    #[error("Invalid URL template '{0}': expected a '{{0}}' placeholder")]
    InvalidTemplate(String),

    #[error("Invalid progress pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Recipe-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlTask, Scheduler};
pub use extract::Record;
pub use output::OutputStore;
pub use state::TaskState;
