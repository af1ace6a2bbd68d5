//! Sitemap discovery
//!
//! Walks a site's sitemap tree starting from its robots.txt (or configured
//! seed URLs) and stores every sitemap document, gzip-compressed, in the
//! site's pending directory for later replay.

use crate::config::SiteConfig;
use crate::crawler::FetchClient;
use crate::sitemap::{completed_dir, pending_dir, xml};
use crate::state::DomainState;
use crate::Result;
use robotstxt::{parse_robotstxt, RobotsParseHandler};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Counts reported after one site's discovery run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Sitemap documents fetched and parsed
    pub fetched: usize,
    /// Documents newly written to the pending directory
    pub persisted: usize,
    /// Documents whose file name was already pending or completed
    pub skipped_existing: usize,
    /// Fetches or parses that failed
    pub failed: usize,
}

/// Downloads sitemap trees into `<root>/<site>/`
pub struct SitemapDownloader {
    client: Arc<dyn FetchClient>,
    root: PathBuf,
    interval: Duration,
    timeout: Duration,
}

impl SitemapDownloader {
    pub fn new(
        client: Arc<dyn FetchClient>,
        root: impl Into<PathBuf>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            root: root.into(),
            interval,
            timeout,
        }
    }

    /// Discovers and persists one site's sitemaps
    ///
    /// Individual fetch or parse failures are logged and counted; only local
    /// I/O errors abort the run.
    pub async fn download(&self, site: &SiteConfig) -> Result<DownloadReport> {
        let site_dir = pending_dir(&self.root, &site.name);
        tokio::fs::create_dir_all(&site_dir).await?;

        let mut report = DownloadReport::default();
        let mut pacing = DomainState::new();

        let seeds = self.seed_urls(site, &mut pacing, &mut report).await?;
        tracing::info!(site = %site.name, seeds = seeds.len(), "Starting sitemap discovery");

        let mut stack: Vec<String> = seeds.into_iter().rev().collect();
        let mut visited = HashSet::new();

        while let Some(url) = stack.pop() {
            if !visited.insert(url.clone()) {
                continue;
            }

            let Some(body) = self.paced_fetch(&url, &mut pacing, &mut report).await else {
                continue;
            };

            let decoded = match xml::decode(&body) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(site = %site.name, url = %url, "Failed to decompress sitemap: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let locs = match xml::extract_locs(&decoded, &url) {
                Ok(locs) => locs,
                Err(e) => {
                    tracing::warn!(site = %site.name, "{}", e);
                    report.failed += 1;
                    continue;
                }
            };
            report.fetched += 1;

            if self.persist(&site.name, &url, decoded).await? {
                report.persisted += 1;
            } else {
                report.skipped_existing += 1;
            }

            for loc in locs.into_iter().rev() {
                if xml::is_sitemap_link(&loc) && !visited.contains(&loc) {
                    stack.push(loc);
                }
            }
        }

        tracing::info!(
            site = %site.name,
            fetched = report.fetched,
            persisted = report.persisted,
            skipped = report.skipped_existing,
            failed = report.failed,
            "Sitemap discovery finished"
        );
        Ok(report)
    }

    async fn seed_urls(
        &self,
        site: &SiteConfig,
        pacing: &mut DomainState,
        report: &mut DownloadReport,
    ) -> Result<Vec<String>> {
        if !site.sitemaps.is_empty() {
            return Ok(site.sitemaps.clone());
        }

        let Some(robots_url) = &site.robots_url else {
            tracing::warn!(site = %site.name, "No robots URL or seed sitemaps configured");
            return Ok(Vec::new());
        };

        match self.paced_fetch(robots_url, pacing, report).await {
            Some(body) => Ok(sitemaps_from_robots(&String::from_utf8_lossy(&body))),
            None => Ok(Vec::new()),
        }
    }

    /// Waits out the pacing interval, then fetches; `None` on any failure
    async fn paced_fetch(
        &self,
        url: &str,
        pacing: &mut DomainState,
        report: &mut DownloadReport,
    ) -> Option<Vec<u8>> {
        let wait = pacing.time_until_next_request(self.interval, Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        pacing.record_request(Instant::now());

        match self.client.fetch(url, self.timeout).await {
            Ok(response) if response.is_ok() => Some(response.body),
            Ok(response) => {
                tracing::warn!(url = %url, status = response.status, "Sitemap request rejected");
                report.failed += 1;
                None
            }
            Err(e) => {
                tracing::warn!("{}", e);
                report.failed += 1;
                None
            }
        }
    }

    /// Writes a compressed copy unless the name is already pending or completed
    async fn persist(&self, site: &str, url: &str, xml_bytes: Vec<u8>) -> Result<bool> {
        let name = shard_file_name(url);
        let pending = pending_dir(&self.root, site).join(&name);
        let completed = completed_dir(&self.root, site).join(&name);

        if exists(&pending).await? || exists(&completed).await? {
            tracing::debug!(url = %url, file = %name, "Sitemap already stored, skipping");
            return Ok(false);
        }

        let compressed = tokio::task::spawn_blocking(move || xml::compress(&xml_bytes))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;
        tokio::fs::write(&pending, compressed).await?;
        tracing::debug!(url = %url, file = %pending.display(), "Stored sitemap");
        Ok(true)
    }
}

/// Collects `Sitemap:` values while robots.txt is parsed; every other
/// directive is ignored
#[derive(Default)]
struct SitemapCollector {
    sitemaps: Vec<String>,
}

impl RobotsParseHandler for SitemapCollector {
    fn handle_robots_start(&mut self) {}
    fn handle_robots_end(&mut self) {}
    fn handle_user_agent(&mut self, _line_num: u32, _user_agent: &str) {}
    fn handle_allow(&mut self, _line_num: u32, _value: &str) {}
    fn handle_disallow(&mut self, _line_num: u32, _value: &str) {}

    fn handle_sitemap(&mut self, _line_num: u32, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.sitemaps.push(value.to_string());
        }
    }

    fn handle_unknown_action(&mut self, _line_num: u32, _action: &str, _value: &str) {}
}

/// Extracts `Sitemap:` directives from a robots.txt body
pub fn sitemaps_from_robots(robots: &str) -> Vec<String> {
    let mut collector = SitemapCollector::default();
    parse_robotstxt(robots, &mut collector);
    collector.sitemaps
}

/// Local file name for a sitemap URL: its last path segment, plus a
/// sanitized query when present, always ending in `.gz`
pub fn shard_file_name(url: &str) -> String {
    let parsed = Url::parse(url).ok();

    let mut name = parsed
        .as_ref()
        .and_then(|u| u.path_segments())
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("sitemap.xml")
        .to_string();

    if let Some(query) = parsed.as_ref().and_then(Url::query) {
        let query: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        name = format!("{}_{}", name, query);
    }

    if !name.ends_with(".gz") {
        name.push_str(".gz");
    }
    name
}

async fn exists(path: &Path) -> Result<bool> {
    Ok(tokio::fs::try_exists(path).await?)
}
