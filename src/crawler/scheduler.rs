//! Timer-driven scheduler for crawl tasks
//!
//! This module handles:
//! - A min-heap of tasks keyed by the instant their next cycle is due
//! - Running due cycles concurrently, at most one per task
//! - Retiring tasks whose cycle reports exhaustion
//! - Cooperative shutdown

use crate::crawler::task::{CrawlTask, CycleOutcome};
use crate::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How long in-flight cycles may run on after shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A task waiting for its next cycle
struct Scheduled {
    /// When the next cycle may start
    due: Instant,

    /// Insertion order, breaking ties between equal deadlines
    seq: u64,

    task: CrawlTask,
}

// Earlier deadlines have higher priority (are popped first from BinaryHeap)
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

/// Runs crawl tasks until every one of them has retired
///
/// The scheduler never starts a task's next cycle before the previous one
/// has finished, so politeness holds per site without a shared rate limiter.
/// Sites are otherwise independent and progress at their own pace.
#[derive(Default)]
pub struct Scheduler {
    queue: BinaryHeap<Scheduled>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task whose first cycle is due immediately
    pub fn add_task(&mut self, task: CrawlTask) {
        self.schedule(task, Instant::now());
    }

    /// Number of tasks waiting for their next cycle
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn schedule(&mut self, task: CrawlTask, due: Instant) {
        self.seq += 1;
        self.queue.push(Scheduled {
            due,
            seq: self.seq,
            task,
        });
    }

    /// Runs until every task has retired
    pub async fn run(&mut self) -> Result<Vec<CrawlTask>> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until every task has retired or `shutdown` resolves
    ///
    /// # Returns
    ///
    /// * `Ok(tasks)` - Every task, retired or (after shutdown) still live
    /// * `Err(e)` - A cycle hit a local error such as a full output store;
    ///   nothing further is scheduled
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<Vec<CrawlTask>>
    where
        F: Future<Output = ()>,
    {
        let mut finished = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        tokio::pin!(shutdown);

        loop {
            let now = Instant::now();
            while self.queue.peek().is_some_and(|next| next.due <= now) {
                let Some(next) = self.queue.pop() else {
                    break;
                };
                in_flight.push(drive(next.task));
            }

            if in_flight.is_empty() && self.queue.is_empty() {
                break;
            }

            let next_due = self.queue.peek().map(|next| next.due);
            let wake_at = next_due.unwrap_or(now);

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(
                        in_flight = in_flight.len(),
                        waiting = self.queue.len(),
                        "Shutdown requested, no further cycles will start"
                    );
                    break;
                }
                Some((task, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    match result {
                        Ok(CycleOutcome::Continue { delay }) => {
                            tracing::trace!(site = %task.site(), ?delay, "Cycle complete");
                            self.schedule(task, Instant::now() + delay);
                        }
                        Ok(CycleOutcome::Exhausted) => finished.push(task),
                        Err(e) => {
                            tracing::error!(site = %task.site(), "Crawl cycle failed: {}", e);
                            return Err(e);
                        }
                    }
                }
                _ = tokio::time::sleep_until(wake_at), if next_due.is_some() => {}
            }
        }

        // Let cycles that already started finish their fetch and write
        let drain = async {
            while let Some((task, result)) = in_flight.next().await {
                if let Err(e) = result {
                    tracing::error!(site = %task.site(), "Crawl cycle failed during shutdown: {}", e);
                }
                finished.push(task);
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!("Abandoning cycles still in flight after {:?}", SHUTDOWN_GRACE);
        }

        finished.extend(self.queue.drain().map(|scheduled| scheduled.task));
        Ok(finished)
    }
}

async fn drive(mut task: CrawlTask) -> (CrawlTask, Result<CycleOutcome>) {
    let result = task.run_cycle().await;
    (task, result)
}
