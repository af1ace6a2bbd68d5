//! State module for tracking crawl task progress
//!
//! # Components
//!
//! - `TaskState`: where a crawl task is in its fetch/extract/write/wait cycle
//! - `DomainState`: per-domain pacing and consecutive-failure bookkeeping

mod domain_state;
mod task_state;

// Re-export main types
pub use domain_state::DomainState;
pub use task_state::TaskState;
