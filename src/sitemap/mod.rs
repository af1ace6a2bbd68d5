//! Sitemap ingest
//!
//! Discovery downloads a site's sitemap tree into `<sitemap-dir>/<site>/`.
//! Replay later turns those stored documents into frontier links, moving each
//! one to `<sitemap-dir>/<site>/completed/` once consumed.

mod discovery;
mod filter;
mod replay;
pub mod xml;

pub use discovery::{shard_file_name, sitemaps_from_robots, DownloadReport, SitemapDownloader};
pub use filter::LinkFilter;
pub use replay::{ReplayOrder, SitemapReplay};

use std::path::{Path, PathBuf};

/// Subdirectory receiving consumed sitemap documents
pub const COMPLETED_DIR: &str = "completed";

/// Directory holding a site's not-yet-replayed sitemap documents
pub fn pending_dir(root: &Path, site: &str) -> PathBuf {
    root.join(site)
}

/// Directory holding a site's consumed sitemap documents
pub fn completed_dir(root: &Path, site: &str) -> PathBuf {
    pending_dir(root, site).join(COMPLETED_DIR)
}
