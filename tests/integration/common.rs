//! Shared fixtures

use recipe_harvest::config::{parse_config, Config};
use std::path::Path;

pub const RECIPE_PAGE: &str = r#"<html><body>
  <div itemscope itemtype="http://schema.org/Recipe">
    <h1 itemprop="name">Mock Muffins</h1>
    <li itemprop="recipeIngredient">2 cups flour</li>
    <li itemprop="recipeIngredient">1 cup milk</li>
    <li itemprop="recipeInstructions">Mix and bake.</li>
  </div>
</body></html>"#;

/// Builds a validated config whose output lives under `dir`
///
/// `sites` is appended verbatim as `[[site]]` tables.
pub fn test_config(dir: &Path, max_failures: u32, sites: &str) -> Config {
    let toml = format!(
        r#"
[crawler]
request-delay = 100
request-timeout = 5
max-consecutive-failures = {max_failures}
batch-size = 3

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
data-dir = "{data}"
progress-log = "{log}"
sitemap-dir = "{sitemaps}"

{sites}
"#,
        max_failures = max_failures,
        data = dir.join("data").display(),
        log = dir.join("log").join("progress.log").display(),
        sitemaps = dir.join("sitemaps").display(),
        sites = sites,
    );
    parse_config(&toml).expect("test config should be valid")
}

/// Lists the finalized shard files in the data directory
pub fn shard_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir.join("data"))
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
