use std::time::Duration;
use tokio::time::Instant;

/// Tracks the pacing and failure state of one domain's crawl task
///
/// The consecutive-failure counter is the circuit breaker: any successful
/// fetch resets it, and once it strictly exceeds the configured threshold the
/// frontier is assumed to have run past the site's content.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Failures since the last HTTP 200
    pub consecutive_failures: u32,

    /// Number of fetches dispatched to this domain
    pub request_count: u64,

    /// Number of records written for this domain
    pub records_written: u64,

    /// When the most recent cycle started
    pub last_request_time: Option<Instant>,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was dispatched to this domain
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Records a successful fetch; clears the failure streak
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Records one failure signal and returns the new streak length
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub fn record_written(&mut self) {
        self.records_written += 1;
    }

    /// Returns true once the failure streak strictly exceeds `threshold`
    pub fn is_tripped(&self, threshold: u32) -> bool {
        self.consecutive_failures > threshold
    }

    /// Calculates how long to wait before the next request may start
    ///
    /// This is the pacing interval minus the time already spent since the
    /// last request began, floored at zero.
    pub fn time_until_next_request(&self, interval: Duration, now: Instant) -> Duration {
        match self.last_request_time {
            Some(last) => interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}
