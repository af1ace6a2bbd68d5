//! Per-site crawl task
//!
//! A [`CrawlTask`] owns one site's frontier, pacing and circuit-breaker
//! state. The scheduler drives it one cycle at a time; each cycle dispatches
//! at most one fetch, so a site never has two requests in flight.

use crate::config::CrawlerConfig;
use crate::crawler::FetchClient;
use crate::extract::{extract_record, Extractor};
use crate::frontier::{Frontier, UrlFrontierBatch};
use crate::output::OutputStore;
use crate::progress::{FetchOutcome, ProgressLog};
use crate::state::{DomainState, TaskState};
use crate::{HarvestError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Pacing and retirement limits shared by every task of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLimits {
    /// Minimum gap between the starts of two requests to the same site
    pub interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    /// Failure streak length that must be exceeded to retire a task
    pub max_consecutive_failures: u32,
}

impl From<&CrawlerConfig> for TaskLimits {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            interval: config.pacing_interval(),
            timeout: config.fetch_timeout(),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

/// What the scheduler should do after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Run the next cycle after `delay`
    Continue { delay: Duration },
    /// The task has retired; never schedule it again
    Exhausted,
}

/// One site's crawl stream
pub struct CrawlTask {
    site: String,
    frontier: Frontier,
    batch: UrlFrontierBatch,
    extractor: Arc<dyn Extractor>,
    client: Arc<dyn FetchClient>,
    store: OutputStore,
    progress: Option<Arc<ProgressLog>>,
    limits: TaskLimits,
    state: TaskState,
    domain: DomainState,
}

impl CrawlTask {
    pub fn new(
        site: impl Into<String>,
        frontier: Frontier,
        extractor: Arc<dyn Extractor>,
        client: Arc<dyn FetchClient>,
        store: OutputStore,
        limits: TaskLimits,
    ) -> Self {
        Self {
            site: site.into(),
            frontier,
            batch: UrlFrontierBatch::default(),
            extractor,
            client,
            store,
            progress: None,
            limits,
            state: TaskState::Waiting,
            domain: DomainState::new(),
        }
    }

    /// Records every fetch attempt in `log`
    pub fn with_progress_log(mut self, log: Arc<ProgressLog>) -> Self {
        self.progress = Some(log);
        self
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn domain_state(&self) -> &DomainState {
        &self.domain
    }

    /// Next numeric ID that has not been dispatched yet
    ///
    /// `None` for sitemap-driven tasks.
    pub fn cursor(&self) -> Option<u64> {
        self.frontier
            .id_cursor()
            .map(|next| next.saturating_sub(self.batch.len() as u64))
    }

    /// Runs one cycle: pop a URL, fetch it, extract and write a record
    ///
    /// Non-200 responses and transport failures feed the circuit breaker and
    /// are not errors. Errors returned here come from local I/O or the output
    /// store.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if self.state.is_terminal() {
            return Ok(CycleOutcome::Exhausted);
        }
        self.transition(TaskState::Fetching);

        let Some(url) = self.next_url().await? else {
            if self.frontier.is_depleted() {
                return Ok(self.exhaust("frontier depleted"));
            }
            // An empty refill is evidence the frontier is running dry
            self.domain.record_failure();
            if self.domain.is_tripped(self.limits.max_consecutive_failures) {
                return Ok(self.exhaust("frontier returned no links"));
            }
            self.transition(TaskState::Waiting);
            return Ok(CycleOutcome::Continue {
                delay: self.limits.interval,
            });
        };

        self.domain.record_request(Instant::now());
        match self.client.fetch(&url, self.limits.timeout).await {
            Ok(response) if response.is_ok() => {
                self.domain.record_success();
                self.log_attempt(FetchOutcome::Ok, Some(response.status), &url)
                    .await?;

                self.transition(TaskState::Extracting);
                match extract_record(self.extractor.as_ref(), &response.text(), &response.final_url) {
                    Ok(record) => {
                        self.transition(TaskState::Writing);
                        let shard = self.store.append(&record).await?;
                        self.domain.record_written();
                        tracing::debug!(site = %self.site, url = %record.url, shard = %shard.display(), "Wrote record");
                    }
                    Err(e) => {
                        tracing::debug!(
                            site = %self.site,
                            extractor = self.extractor.name(),
                            "Discarding page: {}",
                            e
                        );
                    }
                }
            }
            Ok(response) => {
                self.log_attempt(FetchOutcome::Invalid, Some(response.status), &url)
                    .await?;
                let error = HarvestError::InvalidResponse {
                    url: url.clone(),
                    status: response.status,
                };
                if self.record_failure(&error) {
                    return Ok(self.exhaust("too many consecutive failures"));
                }
            }
            Err(e) => {
                self.log_attempt(FetchOutcome::Transient, None, &url).await?;
                if self.record_failure(&HarvestError::Fetch(e)) {
                    return Ok(self.exhaust("too many consecutive failures"));
                }
            }
        }

        self.transition(TaskState::Waiting);
        Ok(CycleOutcome::Continue {
            delay: self
                .domain
                .time_until_next_request(self.limits.interval, Instant::now()),
        })
    }

    /// Pops the next URL, refilling the batch once it is drained
    async fn next_url(&mut self) -> Result<Option<String>> {
        if let Some(url) = self.batch.pop() {
            return Ok(Some(url));
        }
        if self.frontier.is_depleted() {
            return Ok(None);
        }

        self.batch = self.frontier.next_batch().await?;
        tracing::debug!(site = %self.site, size = self.batch.len(), "Refilled frontier batch");
        Ok(self.batch.pop())
    }

    /// Counts a failure; returns true once the breaker has tripped
    fn record_failure(&mut self, error: &HarvestError) -> bool {
        let streak = self.domain.record_failure();
        tracing::info!(site = %self.site, streak, "{}", error);
        self.domain.is_tripped(self.limits.max_consecutive_failures)
    }

    fn exhaust(&mut self, reason: &str) -> CycleOutcome {
        tracing::warn!(
            site = %self.site,
            requests = self.domain.request_count,
            written = self.domain.records_written,
            "Retiring crawl task: {}",
            reason
        );
        self.transition(TaskState::Exhausted);
        CycleOutcome::Exhausted
    }

    async fn log_attempt(&self, outcome: FetchOutcome, status: Option<u16>, url: &str) -> Result<()> {
        match &self.progress {
            Some(log) => log.record(&self.site, outcome, status, url).await,
            None => Ok(()),
        }
    }

    fn transition(&mut self, next: TaskState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(site = %self.site, from = %self.state, to = %next, "Unexpected task state transition");
        }
        self.state = next;
    }
}

impl fmt::Debug for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlTask")
            .field("site", &self.site)
            .field("state", &self.state)
            .field("cursor", &self.cursor())
            .field("batch", &self.batch.len())
            .field("domain", &self.domain)
            .finish()
    }
}
