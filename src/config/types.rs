use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Recipe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}


/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "request-delay", default = "default_request_delay")]
    pub request_delay: u64,

    /// Fetch timeout (seconds); long enough to ride out a network outage
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Consecutive failures tolerated before a task is retired
    #[serde(
        rename = "max-consecutive-failures",
        default = "default_max_consecutive_failures"
    )]
    pub max_consecutive_failures: u32,

    /// Number of URLs produced per frontier refill
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,
}

impl CrawlerConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.request_delay)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn default_request_delay() -> u64 {
    3000
}

fn default_request_timeout() -> u64 {
    30 * 60
}

fn default_max_consecutive_failures() -> u32 {
    25
}

fn default_batch_size() -> usize {
    50
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives the rotating record shards
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Byte size after which the current shard is rotated out
    #[serde(rename = "max-shard-bytes", default = "default_max_shard_bytes")]
    pub max_shard_bytes: u64,

    /// Number of shards allowed per calendar day
    #[serde(rename = "max-daily-shards", default = "default_max_daily_shards")]
    pub max_daily_shards: u32,

    /// Append-only log of fetch attempts
    #[serde(rename = "progress-log")]
    pub progress_log: PathBuf,

    /// Root directory for downloaded sitemap shards
    #[serde(rename = "sitemap-dir")]
    pub sitemap_dir: PathBuf,
}

fn default_max_shard_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_daily_shards() -> u32 {
    100
}

/// Which extraction capability a site uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractorKind {
    #[default]
    HRecipe,
    JsonLd,
}

/// Per-site crawl configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Short site name; also names the site's sitemap directory
    pub name: String,

    #[serde(default)]
    pub extractor: ExtractorKind,

    /// Template for sequential-ID URLs, with a `{0}` placeholder
    #[serde(rename = "url-template")]
    pub url_template: Option<String>,

    /// First ID to request when the progress log has nothing newer
    #[serde(rename = "start-id")]
    pub start_id: Option<u64>,

    /// Overrides `crawler.batch-size` for this site
    #[serde(rename = "batch-size")]
    pub batch_size: Option<usize>,

    #[serde(rename = "robots-url")]
    pub robots_url: Option<String>,

    /// Seed sitemap URLs; used instead of the robots.txt listing when present
    #[serde(default)]
    pub sitemaps: Vec<String>,

    /// Substrings that must all appear in a recipe link
    #[serde(default)]
    pub include: Vec<String>,

    /// Substrings that must not appear in a recipe link
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Regex with one capture group for the numeric ID in progress log URLs
    #[serde(rename = "progress-pattern")]
    pub progress_pattern: Option<String>,
}

impl SiteConfig {
    /// Returns true if the site has any sitemap source configured
    pub fn has_sitemap_source(&self) -> bool {
        self.robots_url.is_some() || !self.sitemaps.is_empty()
    }
}
