//! Numeric-ID frontier

use crate::progress::ID_PLACEHOLDER;
use crate::{ConfigError, ConfigResult};

/// Enumerates `[cursor, cursor + batch)` through a URL template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFrontier {
    template: String,
    cursor: u64,
    batch_size: usize,
}

impl IdFrontier {
    /// Builds the generator for one site
    ///
    /// Every parameter is required; a missing one, a zero batch size, or a
    /// template without a `{0}` placeholder is a configuration error.
    pub fn new(
        site: &str,
        template: Option<&str>,
        start_id: Option<u64>,
        batch_size: Option<usize>,
    ) -> ConfigResult<Self> {
        let missing = |parameter: &str| ConfigError::MissingParameter {
            site: site.to_string(),
            parameter: parameter.to_string(),
        };

        let template = template.ok_or_else(|| missing("url-template"))?;
        let cursor = start_id.ok_or_else(|| missing("start-id"))?;
        let batch_size = batch_size.filter(|&n| n > 0).ok_or_else(|| missing("batch-size"))?;

        if !template.contains(ID_PLACEHOLDER) {
            return Err(ConfigError::InvalidTemplate(template.to_string()));
        }

        Ok(Self {
            template: template.to_string(),
            cursor,
            batch_size,
        })
    }

    /// Next ID the generator will emit
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn url_for(&self, id: u64) -> String {
        self.template.replace(ID_PLACEHOLDER, &id.to_string())
    }

    /// Returns true once the ID space has been used up
    pub fn is_depleted(&self) -> bool {
        self.cursor == u64::MAX
    }

    /// Emits the next batch of URLs and advances the cursor past it
    pub fn next_batch(&mut self) -> Vec<String> {
        let end = self.cursor.saturating_add(self.batch_size as u64);
        let urls = (self.cursor..end).map(|id| self.url_for(id)).collect();
        self.cursor = end;
        urls
    }
}
