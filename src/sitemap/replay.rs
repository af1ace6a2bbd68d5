//! Sitemap replay
//!
//! Yields the filtered, not-yet-visited `<loc>` links of a site's pending
//! sitemap documents, one document at a time, in file-name order.

use crate::sitemap::{completed_dir, pending_dir, xml, LinkFilter};
use crate::{HarvestError, Result};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Order in which pending documents are replayed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayOrder {
    #[default]
    Ascending,
    Descending,
}

/// Lazy link source over one site's pending sitemap documents
#[derive(Debug)]
pub struct SitemapReplay {
    site: String,
    completed: PathBuf,
    shards: VecDeque<PathBuf>,
    filter: LinkFilter,
    visited: HashSet<String>,
    links: VecDeque<String>,
    /// Document whose links are still being handed out
    current: Option<PathBuf>,
}

impl SitemapReplay {
    /// Lists the site's pending documents
    ///
    /// `visited` holds links already attempted in earlier runs; they are never
    /// yielded again.
    pub async fn open(
        root: &Path,
        site: &str,
        filter: LinkFilter,
        visited: HashSet<String>,
        order: ReplayOrder,
    ) -> Result<Self> {
        let pending = pending_dir(root, site);
        let mut shards = Vec::new();

        match tokio::fs::read_dir(&pending).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_file() {
                        shards.push(entry.path());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(site = %site, "No sitemap directory at {}", pending.display());
            }
            Err(e) => return Err(e.into()),
        }

        shards.sort();
        if order == ReplayOrder::Descending {
            shards.reverse();
        }
        tracing::info!(site = %site, shards = shards.len(), visited = visited.len(), "Opened sitemap replay");

        Ok(Self {
            site: site.to_string(),
            completed: completed_dir(root, site),
            shards: shards.into(),
            filter,
            visited,
            links: VecDeque::new(),
            current: None,
        })
    }

    /// Returns true once every document has been consumed and every link
    /// handed out
    pub fn is_exhausted(&self) -> bool {
        self.links.is_empty() && self.shards.is_empty() && self.current.is_none()
    }

    /// Pulls up to `max` links, opening further documents as needed
    ///
    /// Returns fewer than `max` links (possibly none) only when the pending
    /// documents run out.
    pub async fn next_links(&mut self, max: usize) -> Result<Vec<String>> {
        let mut batch = Vec::with_capacity(max);

        while batch.len() < max {
            if let Some(link) = self.links.pop_front() {
                batch.push(link);
                continue;
            }

            self.complete_current().await?;

            let Some(shard) = self.shards.pop_front() else {
                break;
            };
            self.load(shard).await?;
        }

        if self.links.is_empty() {
            self.complete_current().await?;
        }

        Ok(batch)
    }

    async fn load(&mut self, shard: PathBuf) -> Result<()> {
        let source = shard.display().to_string();
        let path = shard.clone();
        let parsed = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let raw = std::fs::read(&path)?;
            let decoded = xml::decode(&raw).map_err(|e| HarvestError::SitemapParse {
                file: source.clone(),
                message: e.to_string(),
            })?;
            xml::extract_locs(&decoded, &source)
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

        let locs = match parsed {
            Ok(locs) => locs,
            Err(e @ HarvestError::SitemapParse { .. }) => {
                tracing::warn!(site = %self.site, "Skipping sitemap: {}", e);
                self.move_to_completed(&shard).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let total = locs.len();
        for link in locs {
            if self.filter.matches(&link) && self.visited.insert(link.clone()) {
                self.links.push_back(link);
            }
        }
        tracing::debug!(
            site = %self.site,
            file = %shard.display(),
            total,
            kept = self.links.len(),
            "Loaded sitemap"
        );

        self.current = Some(shard);
        Ok(())
    }

    async fn complete_current(&mut self) -> Result<()> {
        if let Some(shard) = self.current.take() {
            self.move_to_completed(&shard).await?;
        }
        Ok(())
    }

    async fn move_to_completed(&self, shard: &Path) -> Result<()> {
        let Some(name) = shard.file_name() else {
            return Ok(());
        };
        tokio::fs::create_dir_all(&self.completed).await?;
        tokio::fs::rename(shard, self.completed.join(name)).await?;
        tracing::debug!(site = %self.site, file = ?name, "Sitemap consumed");
        Ok(())
    }
}
