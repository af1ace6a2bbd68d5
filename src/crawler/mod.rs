//! Crawler module for paced per-site crawling
//!
//! This module contains the core crawling logic, including:
//! - The fetch client capability and its HTTP implementation
//! - Per-site crawl tasks with circuit breaking
//! - Timer-driven scheduling of task cycles
//! - Mode orchestration and shutdown

mod coordinator;
mod fetcher;
mod scheduler;
mod task;

pub use coordinator::{Coordinator, TaskReport};
pub use fetcher::{build_http_client, FetchClient, FetchError, FetchResponse, HttpFetcher};
pub use scheduler::Scheduler;
pub use task::{CrawlTask, CycleOutcome, TaskLimits};
