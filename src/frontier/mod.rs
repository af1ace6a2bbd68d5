//! Frontier generation
//!
//! A crawl task holds one [`Frontier`] and asks it for a new
//! [`UrlFrontierBatch`] only after the previous batch has been fully drained.

mod sequential;

pub use sequential::IdFrontier;

use crate::sitemap::SitemapReplay;
use crate::Result;
use std::collections::VecDeque;

/// Ordered, bounded set of URLs not yet dispatched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlFrontierBatch {
    urls: VecDeque<String>,
}

impl UrlFrontierBatch {
    pub fn pop(&mut self) -> Option<String> {
        self.urls.pop_front()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl From<Vec<String>> for UrlFrontierBatch {
    fn from(urls: Vec<String>) -> Self {
        Self { urls: urls.into() }
    }
}

/// Source of candidate URLs for one site
#[derive(Debug)]
pub enum Frontier {
    Sequential(IdFrontier),
    Sitemap {
        replay: SitemapReplay,
        batch_size: usize,
    },
}

impl Frontier {
    pub fn sitemap(replay: SitemapReplay, batch_size: usize) -> Self {
        Self::Sitemap {
            replay,
            batch_size: batch_size.max(1),
        }
    }

    /// Produces the next batch; an empty batch is not an error
    pub async fn next_batch(&mut self) -> Result<UrlFrontierBatch> {
        match self {
            Self::Sequential(ids) => Ok(ids.next_batch().into()),
            Self::Sitemap { replay, batch_size } => {
                Ok(replay.next_links(*batch_size).await?.into())
            }
        }
    }

    /// Returns true when no further batch can ever contain a URL
    pub fn is_depleted(&self) -> bool {
        match self {
            Self::Sequential(ids) => ids.is_depleted(),
            Self::Sitemap { replay, .. } => replay.is_exhausted(),
        }
    }

    /// Next ID the generator would emit, for numeric frontiers
    pub fn id_cursor(&self) -> Option<u64> {
        match self {
            Self::Sequential(ids) => Some(ids.cursor()),
            Self::Sitemap { .. } => None,
        }
    }
}
