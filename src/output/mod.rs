//! Output module for persisting extracted records
//!
//! This module handles:
//! - Rotating size- and count-bounded shard files
//! - Funnelling appends from every crawl task through one writer per directory
//! - Reading finalized shards back

mod shard;
mod store;

pub use shard::ShardWriter;
pub use store::OutputStore;

use crate::extract::Record;
use crate::Result;
use std::path::Path;

/// Loads every record from a finalized shard, in append order
///
/// Shards that are still being written have no closing bracket and fail to
/// parse; callers must not read the current shard of a running store.
pub fn load_shard(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
