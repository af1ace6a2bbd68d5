use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_delay < 100 {
        return Err(ConfigError::Validation(format!(
            "request_delay must be >= 100ms, got {}ms",
            config.request_delay
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be >= 1s".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("data_dir cannot be empty".to_string()));
    }

    if config.progress_log.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "progress_log cannot be empty".to_string(),
        ));
    }

    if config.sitemap_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "sitemap_dir cannot be empty".to_string(),
        ));
    }

    if config.max_shard_bytes < 1 {
        return Err(ConfigError::Validation(
            "max_shard_bytes must be >= 1".to_string(),
        ));
    }

    if !(1..=999).contains(&config.max_daily_shards) {
        return Err(ConfigError::Validation(format!(
            "max_daily_shards must be between 1 and 999, got {}",
            config.max_daily_shards
        )));
    }

    Ok(())
}

/// Validates the site entries
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for site in sites {
        validate_site_name(&site.name)?;

        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name '{}'",
                site.name
            )));
        }

        if let Some(robots_url) = &site.robots_url {
            Url::parse(robots_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid robots_url '{}': {}", robots_url, e))
            })?;
        }

        for sitemap in &site.sitemaps {
            Url::parse(sitemap).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid sitemap URL '{}': {}", sitemap, e))
            })?;
        }

        if site.has_sitemap_source() && site.include.iter().all(|s| s.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' has a sitemap source but no include patterns",
                site.name
            )));
        }

        if let Some(pattern) = &site.progress_pattern {
            let regex =
                Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
            if regex.captures_len() < 2 {
                return Err(ConfigError::InvalidPattern(format!(
                    "'{}' must contain a capture group for the numeric ID",
                    pattern
                )));
            }
        }
    }

    Ok(())
}

/// Site names become directory names, so keep them simple
fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation("site name cannot be empty".to_string()));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "site name must contain only ASCII letters, digits, '-' or '_', got '{}'",
            name
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
