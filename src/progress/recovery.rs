//! Rebuilding crawl progress from the progress log

use crate::config::SiteConfig;
use crate::sitemap::LinkFilter;
use crate::{ConfigError, ConfigResult, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

/// Placeholder substituted with the numeric ID in URL templates
pub const ID_PLACEHOLDER: &str = "{0}";

/// Builds a pattern capturing the ID from URLs produced by `template`
///
/// The scheme is dropped so `http` and `https` variants of the same site
/// both match. The host must start at a line start, whitespace or `/`, so
/// `food.com` never matches inside `seafood.com`.
pub fn derive_id_pattern(template: &str) -> ConfigResult<Regex> {
    let (prefix, suffix) = template
        .split_once(ID_PLACEHOLDER)
        .ok_or_else(|| ConfigError::InvalidTemplate(template.to_string()))?;

    let prefix = prefix
        .strip_prefix("https://")
        .or_else(|| prefix.strip_prefix("http://"))
        .unwrap_or(prefix);

    let pattern = format!(
        r"(?:^|[\s/]){}(\d+){}",
        regex::escape(prefix),
        regex::escape(suffix)
    );
    Regex::new(&pattern).map_err(|e| ConfigError::InvalidPattern(e.to_string()))
}

/// Returns the ID pattern for a site: the configured one, else one derived
/// from its URL template; `None` when the site has neither
pub fn id_pattern(site: &SiteConfig) -> ConfigResult<Option<Regex>> {
    if let Some(pattern) = &site.progress_pattern {
        return Regex::new(pattern)
            .map(Some)
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()));
    }

    site.url_template
        .as_deref()
        .map(derive_id_pattern)
        .transpose()
}

/// Scans log lines and returns the highest ID matched by each pattern
pub fn scan_max_ids<R: BufRead>(reader: R, patterns: &[(String, Regex)]) -> Result<HashMap<String, u64>> {
    let mut max_ids: HashMap<String, u64> = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        for (site, pattern) in patterns {
            for captures in pattern.captures_iter(&line) {
                let Some(id) = captures.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) else {
                    continue;
                };
                let entry = max_ids.entry(site.clone()).or_insert(id);
                *entry = (*entry).max(id);
            }
        }
    }

    Ok(max_ids)
}

/// Computes each site's resume cursor as `max(matched ids) + 1`
///
/// Sites with no matching lines, or without an ID pattern, are absent from
/// the result. A missing log file means nothing to recover.
pub fn recover_start_ids(log_path: &Path, sites: &[SiteConfig]) -> Result<HashMap<String, u64>> {
    let mut patterns = Vec::new();
    for site in sites {
        if let Some(pattern) = id_pattern(site)? {
            patterns.push((site.name.clone(), pattern));
        }
    }

    let file = match File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("No progress log at {}, nothing to recover", log_path.display());
            return Ok(HashMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let max_ids = scan_max_ids(BufReader::new(file), &patterns)?;
    Ok(max_ids
        .into_iter()
        .map(|(site, id)| (site, id.saturating_add(1)))
        .collect())
}

/// Collects every word in the log that passes the site's link filter
pub fn visited_links(log_path: &Path, filter: &LinkFilter) -> Result<HashSet<String>> {
    let file = match File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut visited = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        for word in line.split_whitespace() {
            let word = word.trim_matches(',');
            if filter.matches(word) {
                visited.insert(word.to_string());
            }
        }
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorKind;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn site(name: &str, template: Option<&str>) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            extractor: ExtractorKind::HRecipe,
            url_template: template.map(str::to_string),
            start_id: Some(1),
            batch_size: None,
            robots_url: None,
            sitemaps: vec![],
            include: vec![],
            exclude: vec![],
            progress_pattern: None,
        }
    }

    const LOG: &str = "\
2024-03-09T12:00:00Z allrecipes ok 200 https://allrecipes.com/recipe/41
2024-03-09T12:00:03Z epicurious ok 200 https://www.epicurious.com/recipes/food/views/412
2024-03-09T12:00:06Z allrecipes invalid 404 https://allrecipes.com/recipe/57
2024-03-09T12:00:09Z allrecipes transient - http://allrecipes.com/recipe/9
";

    #[test]
    fn test_resume_cursor_is_max_plus_one() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("progress.log");
        std::fs::write(&log, LOG).unwrap();

        let sites = vec![
            site("allrecipes", Some("https://allrecipes.com/recipe/{0}")),
            site("epicurious", Some("https://www.epicurious.com/recipes/food/views/{0}")),
            site("food", None),
        ];
        let ids = recover_start_ids(&log, &sites).unwrap();

        assert_eq!(ids.get("allrecipes"), Some(&58));
        assert_eq!(ids.get("epicurious"), Some(&413));
        assert!(!ids.contains_key("food"));
    }

    #[test]
    fn test_missing_log_recovers_nothing() {
        let dir = tempdir().unwrap();
        let sites = vec![site("allrecipes", Some("https://allrecipes.com/recipe/{0}"))];
        let ids = recover_start_ids(&dir.path().join("absent.log"), &sites).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_derived_pattern_ignores_scheme_and_escapes() {
        let pattern = derive_id_pattern("https://www.food.com/recipe/{0}?print=1").unwrap();
        assert!(pattern.is_match("http://www.food.com/recipe/12?print=1"));
        assert!(!pattern.is_match("https://wwwXfood.com/recipe/12?print=1"));

        let captures = pattern.captures("https://www.food.com/recipe/345?print=1").unwrap();
        assert_eq!(&captures[1], "345");
    }

    #[test]
    fn test_host_suffix_of_another_site_does_not_match() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("progress.log");
        std::fs::write(
            &log,
            "t food ok 200 https://food.com/recipe/12\n\
             t seafood ok 200 https://seafood.com/recipe/90000\n\
             t seafood ok 200 seafood.com/recipe/90001\n",
        )
        .unwrap();

        let sites = vec![
            site("food", Some("https://food.com/recipe/{0}")),
            site("seafood", Some("https://seafood.com/recipe/{0}")),
        ];
        let ids = recover_start_ids(&log, &sites).unwrap();

        assert_eq!(ids.get("food"), Some(&13));
        assert_eq!(ids.get("seafood"), Some(&90002));
    }

    #[test]
    fn test_template_without_placeholder_is_rejected() {
        assert!(matches!(
            derive_id_pattern("https://www.food.com/recipe/"),
            Err(ConfigError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_configured_pattern_wins() {
        let mut entry = site("allrecipes", Some("https://allrecipes.com/recipe/{0}"));
        entry.progress_pattern = Some(r"/r/(\d+)".to_string());

        let pattern = id_pattern(&entry).unwrap().unwrap();
        let ids = scan_max_ids(
            Cursor::new("x https://allrecipes.com/r/7\n"),
            &[("allrecipes".to_string(), pattern)],
        )
        .unwrap();
        assert_eq!(ids.get("allrecipes"), Some(&7));
    }

    #[test]
    fn test_visited_links_uses_filter() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("progress.log");
        std::fs::write(
            &log,
            "t food ok 200 http://www.food.com/recipe/tea-1\n\
             t food ok 200 http://www.food.com/recipe/tea-1/review\n\
             t food ok 200 http://www.food.com/about\n",
        )
        .unwrap();

        let filter = LinkFilter::new(
            vec!["www.food.com/recipe/".to_string()],
            vec!["/review".to_string()],
        );
        let visited = visited_links(&log, &filter).unwrap();

        assert_eq!(visited.len(), 1);
        assert!(visited.contains("http://www.food.com/recipe/tea-1"));
    }
}
