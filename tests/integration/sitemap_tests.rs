//! Sitemap discovery and replay over HTTP

use crate::common::{shard_files, test_config, RECIPE_PAGE};
use recipe_harvest::crawler::Coordinator;
use recipe_harvest::output::load_shard;
use recipe_harvest::sitemap::{completed_dir, pending_dir, xml, ReplayOrder};
use recipe_harvest::state::TaskState;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urlset(links: &[String]) -> String {
    let urls: String = links
        .iter()
        .map(|link| format!("<url><loc>{}</loc></url>", link))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        urls
    )
}

async fn mount(server: &MockServer, at: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(response)
        .mount(server)
        .await;
}

/// robots.txt -> index -> two sitemaps (one gzipped); two recipe links
async fn mount_site(server: &MockServer) {
    let uri = server.uri();

    mount(
        server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nDisallow: /search\nSitemap: {}/sitemap_index.xml\n",
            uri
        )),
    )
    .await;

    let index = format!(
        r#"<?xml version="1.0"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
             <sitemap><loc>{uri}/sitemap-recipes.xml.gz</loc></sitemap>
             <sitemap><loc>{uri}/sitemap-pages.xml</loc></sitemap>
             <sitemap><loc>{uri}/sitemap_index.xml</loc></sitemap>
           </sitemapindex>"#,
        uri = uri
    );
    mount(server, "/sitemap_index.xml", ResponseTemplate::new(200).set_body_string(index)).await;

    let recipes = urlset(&[
        format!("{}/recipe/muffins", uri),
        format!("{}/recipe/gone", uri),
        format!("{}/recipe/muffins/reviews", uri),
    ]);
    mount(
        server,
        "/sitemap-recipes.xml.gz",
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/x-gzip")
            .set_body_bytes(xml::compress(recipes.as_bytes()).unwrap()),
    )
    .await;

    let pages = urlset(&[format!("{}/about", uri)]);
    mount(server, "/sitemap-pages.xml", ResponseTemplate::new(200).set_body_string(pages)).await;

    mount(server, "/recipe/muffins", ResponseTemplate::new(200).set_body_string(RECIPE_PAGE)).await;
}

fn site_table(uri: &str) -> String {
    format!(
        r#"
[[site]]
name = "mock"
robots-url = "{uri}/robots.txt"
include = ["/recipe/"]
exclude = ["/reviews"]
"#,
        uri = uri
    )
}

fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

async fn recipe_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .filter(|p| p.starts_with("/recipe/"))
        .collect()
}

#[tokio::test]
async fn test_discovery_persists_each_sitemap_once() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 5, &site_table(&server.uri()));
    let root = config.output.sitemap_dir.clone();
    let coordinator = Coordinator::new(config).unwrap();

    let reports = coordinator.download_sitemaps().await.unwrap();
    assert_eq!(reports.len(), 1);
    let (site, report) = &reports[0];
    assert_eq!(site, "mock");
    assert_eq!(report.fetched, 3);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.failed, 0);

    let pending = pending_dir(&root, "mock");
    assert_eq!(
        names_in(&pending),
        vec![
            "sitemap-pages.xml.gz",
            "sitemap-recipes.xml.gz",
            "sitemap_index.xml.gz"
        ]
    );

    // Stored documents are compressed and hold the original XML
    let stored = std::fs::read(pending.join("sitemap-pages.xml.gz")).unwrap();
    assert!(xml::is_gzip(&stored));
    let locs = xml::extract_locs(&xml::decode(&stored).unwrap(), "pages").unwrap();
    assert_eq!(locs, vec![format!("{}/about", server.uri())]);

    // A second run fetches again but rewrites nothing
    let again = coordinator.download_sitemaps().await.unwrap();
    assert_eq!(again[0].1.persisted, 0);
    assert_eq!(again[0].1.skipped_existing, 3);
}

#[tokio::test]
async fn test_replay_crawls_filtered_links_then_completes_shards() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 5, &site_table(&server.uri()));
    let root = config.output.sitemap_dir.clone();
    let coordinator = Coordinator::new(config).unwrap();
    coordinator.download_sitemaps().await.unwrap();

    let reports = coordinator
        .crawl_sitemaps_until(ReplayOrder::Ascending, std::future::pending())
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.state, TaskState::Exhausted);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.written, 1);
    assert_eq!(report.cursor, None);
    assert_eq!(
        recipe_requests(&server).await,
        vec!["/recipe/muffins", "/recipe/gone"]
    );

    // Every document was consumed
    assert!(names_in(&pending_dir(&root, "mock")).is_empty());
    assert_eq!(names_in(&completed_dir(&root, "mock")).len(), 3);

    let shards = shard_files(dir.path());
    let records = load_shard(&shards[0]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, format!("{}/recipe/muffins", server.uri()));
}

#[tokio::test]
async fn test_replay_skips_links_already_in_progress_log() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), 5, &site_table(&server.uri()));
    let root = config.output.sitemap_dir.clone();
    let coordinator = Coordinator::new(config).unwrap();
    coordinator.download_sitemaps().await.unwrap();
    coordinator
        .crawl_sitemaps_until(ReplayOrder::Ascending, std::future::pending())
        .await
        .unwrap();

    // Put the consumed documents back as if the move had never happened
    let completed = completed_dir(&root, "mock");
    for name in names_in(&completed) {
        std::fs::rename(completed.join(&name), pending_dir(&root, "mock").join(&name)).unwrap();
    }

    let reports = coordinator
        .crawl_sitemaps_until(ReplayOrder::Descending, std::future::pending())
        .await
        .unwrap();

    assert_eq!(reports[0].state, TaskState::Exhausted);
    assert_eq!(reports[0].fetched, 0);
    assert_eq!(recipe_requests(&server).await.len(), 2);
}
