//! Crawler coordinator - mode orchestration
//!
//! This module wires configuration into running crawl tasks:
//! - Building one task per site for the ID or sitemap crawl
//! - Seeding ID cursors from the progress log
//! - Running sitemap discovery
//! - Finalizing the output store on every exit path

use crate::config::{Config, SiteConfig};
use crate::crawler::task::{CrawlTask, TaskLimits};
use crate::crawler::{FetchClient, HttpFetcher, Scheduler};
use crate::extract::extractor_for;
use crate::frontier::{Frontier, IdFrontier};
use crate::output::OutputStore;
use crate::progress::{recover_start_ids, visited_links, ProgressLog};
use crate::sitemap::{DownloadReport, LinkFilter, ReplayOrder, SitemapDownloader, SitemapReplay};
use crate::state::TaskState;
use crate::{HarvestError, Result};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Final state of one site after a crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub site: String,
    pub state: TaskState,
    /// Fetches dispatched during this run
    pub fetched: u64,
    /// Records written during this run
    pub written: u64,
    /// Failure streak at the end of the run
    pub consecutive_failures: u32,
    /// Next undispatched ID, for numeric frontiers
    pub cursor: Option<u64>,
    /// Why the task could not be built
    pub error: Option<String>,
}

impl TaskReport {
    fn failed(site: &str, error: &HarvestError) -> Self {
        Self {
            site: site.to_string(),
            state: TaskState::Failed,
            fetched: 0,
            written: 0,
            consecutive_failures: 0,
            cursor: None,
            error: Some(error.to_string()),
        }
    }
}

impl From<&CrawlTask> for TaskReport {
    fn from(task: &CrawlTask) -> Self {
        let domain = task.domain_state();
        Self {
            site: task.site().to_string(),
            state: task.state(),
            fetched: domain.request_count,
            written: domain.records_written,
            consecutive_failures: domain.consecutive_failures,
            cursor: task.cursor(),
            error: None,
        }
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} fetched, {} written",
            self.site, self.state, self.fetched, self.written
        )?;
        if let Some(cursor) = self.cursor {
            write!(f, ", next id {}", cursor)?;
        }
        if let Some(error) = &self.error {
            write!(f, ", {}", error)?;
        }
        f.write_str(")")
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    client: Arc<dyn FetchClient>,
}

impl Coordinator {
    /// Creates a coordinator using the HTTP fetch client
    pub fn new(config: Config) -> Result<Self> {
        let client = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Creates a coordinator around any fetch client
    pub fn with_client(config: Config, client: Arc<dyn FetchClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Computes each site's resume cursor from the progress log
    pub async fn recover_start_ids(&self) -> Result<HashMap<String, u64>> {
        let log = self.config.output.progress_log.clone();
        let sites = self.config.sites.clone();
        tokio::task::spawn_blocking(move || recover_start_ids(&log, &sites))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))?
    }

    /// Runs the sequential-ID crawl until every task retires or Ctrl-C
    pub async fn crawl_ids(&self) -> Result<Vec<TaskReport>> {
        self.crawl_ids_until(ctrl_c()).await
    }

    /// Runs the sequential-ID crawl until every task retires or `shutdown`
    ///
    /// Sites with neither a URL template nor a start ID take no part. Each
    /// cursor starts at the larger of the configured start ID and the ID
    /// recovered from the progress log.
    pub async fn crawl_ids_until<F>(&self, shutdown: F) -> Result<Vec<TaskReport>>
    where
        F: Future<Output = ()>,
    {
        let recovered = self.recover_start_ids().await?;
        let sites: Vec<&SiteConfig> = self
            .config
            .sites
            .iter()
            .filter(|site| site.url_template.is_some() || site.start_id.is_some())
            .collect();

        let mut frontiers = Vec::new();
        let mut failed = Vec::new();
        for site in sites {
            let start_id = site
                .start_id
                .map(|start| recovered.get(&site.name).map_or(start, |&r| start.max(r)));
            let batch_size = site.batch_size.or(Some(self.config.crawler.batch_size));

            match IdFrontier::new(&site.name, site.url_template.as_deref(), start_id, batch_size) {
                Ok(ids) => {
                    tracing::info!(site = %site.name, start = ids.cursor(), batch = ids.batch_size(), "Starting ID crawl");
                    frontiers.push((site, Frontier::Sequential(ids)));
                }
                Err(e) => {
                    let error = HarvestError::from(e);
                    tracing::error!(site = %site.name, "Cannot build crawl task: {}", error);
                    failed.push(TaskReport::failed(&site.name, &error));
                }
            }
        }

        self.run(frontiers, failed, shutdown).await
    }

    /// Replays downloaded sitemaps until every task retires or Ctrl-C
    pub async fn crawl_sitemaps(&self, order: ReplayOrder) -> Result<Vec<TaskReport>> {
        self.crawl_sitemaps_until(order, ctrl_c()).await
    }

    /// Replays downloaded sitemaps until every task retires or `shutdown`
    ///
    /// Links already present in the progress log are skipped.
    pub async fn crawl_sitemaps_until<F>(&self, order: ReplayOrder, shutdown: F) -> Result<Vec<TaskReport>>
    where
        F: Future<Output = ()>,
    {
        let mut frontiers = Vec::new();
        for site in self.config.sites.iter().filter(|s| s.has_sitemap_source()) {
            let filter = LinkFilter::for_site(site);
            let log = self.config.output.progress_log.clone();
            let scan_filter = filter.clone();
            let visited = tokio::task::spawn_blocking(move || visited_links(&log, &scan_filter))
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))??;

            let replay = SitemapReplay::open(
                &self.config.output.sitemap_dir,
                &site.name,
                filter,
                visited,
                order,
            )
            .await?;
            let batch_size = site.batch_size.unwrap_or(self.config.crawler.batch_size);
            frontiers.push((site, Frontier::sitemap(replay, batch_size)));
        }

        self.run(frontiers, Vec::new(), shutdown).await
    }

    /// Downloads every site's sitemap tree into the sitemap directory
    pub async fn download_sitemaps(&self) -> Result<Vec<(String, DownloadReport)>> {
        let downloader = SitemapDownloader::new(
            self.client.clone(),
            &self.config.output.sitemap_dir,
            self.config.crawler.pacing_interval(),
            self.config.crawler.fetch_timeout(),
        );

        let mut reports = Vec::new();
        for site in self.config.sites.iter().filter(|s| s.has_sitemap_source()) {
            let report = downloader.download(site).await?;
            reports.push((site.name.clone(), report));
        }
        Ok(reports)
    }

    async fn run<F>(
        &self,
        frontiers: Vec<(&SiteConfig, Frontier)>,
        mut reports: Vec<TaskReport>,
        shutdown: F,
    ) -> Result<Vec<TaskReport>>
    where
        F: Future<Output = ()>,
    {
        if frontiers.is_empty() {
            tracing::warn!("No crawlable sites configured for this mode");
            return Ok(reports);
        }

        let store = OutputStore::open(&self.config.output)?;
        let progress = Arc::new(ProgressLog::open(&self.config.output.progress_log).await?);
        let limits = TaskLimits::from(&self.config.crawler);

        let mut scheduler = Scheduler::new();
        for (site, frontier) in frontiers {
            let task = CrawlTask::new(
                site.name.clone(),
                frontier,
                extractor_for(site.extractor),
                self.client.clone(),
                store.clone(),
                limits,
            )
            .with_progress_log(progress.clone());
            scheduler.add_task(task);
        }

        let outcome = scheduler.run_until(shutdown).await;
        drop(scheduler);
        // Tasks hold store handles; release them before shutting the store down
        let outcome = outcome.map(|tasks| tasks.iter().map(TaskReport::from).collect::<Vec<_>>());

        let finalized = store.shutdown().await;
        let task_reports = outcome?;
        if let Some(path) = finalized? {
            tracing::info!("Finalized shard {}", path.display());
        }

        reports.extend(task_reports);
        Ok(reports)
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl-C");
}
