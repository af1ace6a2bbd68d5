//! Per-site link filter

use crate::config::SiteConfig;

/// Substring filter deciding which links belong to a site's frontier
///
/// A link passes when it contains every include substring and none of the
/// exclude substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl LinkFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn for_site(site: &SiteConfig) -> Self {
        Self::new(site.include.clone(), site.exclude.clone())
    }

    pub fn matches(&self, link: &str) -> bool {
        self.include.iter().all(|needle| link.contains(needle.as_str()))
            && !self.exclude.iter().any(|needle| link.contains(needle.as_str()))
    }
}
