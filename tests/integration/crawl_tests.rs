//! Sequential-ID crawl over HTTP

use crate::common::{shard_files, test_config, RECIPE_PAGE};
use recipe_harvest::crawler::Coordinator;
use recipe_harvest::output::load_shard;
use recipe_harvest::state::TaskState;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_recipes(server: &MockServer, ids: &[u64]) {
    for id in ids {
        Mock::given(method("GET"))
            .and(path(format!("/r/{}", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(RECIPE_PAGE),
            )
            .mount(server)
            .await;
    }
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_id_crawl_until_exhausted() {
    let server = MockServer::start().await;
    // Anything not mounted answers 404
    mount_recipes(&server, &[5, 6, 7]).await;

    let dir = tempdir().unwrap();
    let sites = format!(
        r#"
[[site]]
name = "mock"
url-template = "{uri}/r/{{0}}"
start-id = 5
"#,
        uri = server.uri()
    );
    let config = test_config(dir.path(), 1, &sites);
    let coordinator = Coordinator::new(config).unwrap();

    let reports = coordinator
        .crawl_ids_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.state, TaskState::Exhausted);
    assert_eq!(report.fetched, 5);
    assert_eq!(report.written, 3);
    assert_eq!(report.cursor, Some(10));

    // Two 404s past a threshold of one retire the task; nothing after 9
    assert_eq!(
        requested_paths(&server).await,
        vec!["/r/5", "/r/6", "/r/7", "/r/8", "/r/9"]
    );

    let shards = shard_files(dir.path());
    assert_eq!(shards.len(), 1);
    let records = load_shard(&shards[0]).unwrap();
    let urls: Vec<String> = records.iter().map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        (5..=7)
            .map(|id| format!("{}/r/{}", server.uri(), id))
            .collect::<Vec<_>>()
    );
    assert_eq!(records[0].recipe.title.as_deref(), Some("Mock Muffins"));
    assert_eq!(records[0].recipe.ingredients.len(), 2);

    let log = std::fs::read_to_string(dir.path().join("log").join("progress.log")).unwrap();
    let outcomes: Vec<&str> = log
        .lines()
        .map(|line| line.split_whitespace().nth(2).unwrap())
        .collect();
    assert_eq!(outcomes, vec!["ok", "ok", "ok", "invalid", "invalid"]);
}

#[tokio::test]
async fn test_second_run_resumes_after_logged_ids() {
    let server = MockServer::start().await;
    mount_recipes(&server, &[1, 2]).await;

    let dir = tempdir().unwrap();
    let sites = format!(
        r#"
[[site]]
name = "mock"
url-template = "{uri}/r/{{0}}"
start-id = 1
"#,
        uri = server.uri()
    );

    let first = Coordinator::new(test_config(dir.path(), 1, &sites)).unwrap();
    first.crawl_ids_until(std::future::pending()).await.unwrap();
    assert_eq!(requested_paths(&server).await.len(), 4);

    // IDs 1..=4 are in the log, so recovery resumes at 5
    let second = Coordinator::new(test_config(dir.path(), 1, &sites)).unwrap();
    let recovered = second.recover_start_ids().await.unwrap();
    assert_eq!(recovered.get("mock"), Some(&5));

    let reports = second
        .crawl_ids_until(std::future::pending())
        .await
        .unwrap();
    assert_eq!(reports[0].fetched, 2);
    assert_eq!(reports[0].written, 0);

    let paths = requested_paths(&server).await;
    assert_eq!(&paths[4..], ["/r/5", "/r/6"]);
}

#[tokio::test]
async fn test_site_missing_start_id_fails_alone() {
    let server = MockServer::start().await;
    mount_recipes(&server, &[1]).await;

    let dir = tempdir().unwrap();
    let sites = format!(
        r#"
[[site]]
name = "good"
url-template = "{uri}/r/{{0}}"
start-id = 1

[[site]]
name = "broken"
url-template = "{uri}/other/{{0}}"
"#,
        uri = server.uri()
    );
    let coordinator = Coordinator::new(test_config(dir.path(), 0, &sites)).unwrap();
    let reports = coordinator
        .crawl_ids_until(std::future::pending())
        .await
        .unwrap();

    let broken = reports.iter().find(|r| r.site == "broken").unwrap();
    assert_eq!(broken.state, TaskState::Failed);
    assert!(broken.error.as_deref().unwrap().contains("start-id"));

    let good = reports.iter().find(|r| r.site == "good").unwrap();
    assert_eq!(good.state, TaskState::Exhausted);
    assert_eq!(good.written, 1);
}

#[tokio::test]
async fn test_shutdown_finalizes_open_shard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RECIPE_PAGE))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let sites = format!(
        r#"
[[site]]
name = "endless"
url-template = "{uri}/r/{{0}}"
start-id = 1
"#,
        uri = server.uri()
    );
    let coordinator = Coordinator::new(test_config(dir.path(), 1, &sites)).unwrap();
    let reports = coordinator
        .crawl_ids_until(tokio::time::sleep(std::time::Duration::from_millis(350)))
        .await
        .unwrap();

    assert_eq!(reports[0].state, TaskState::Waiting);
    assert!(reports[0].written >= 1);

    // The shard was terminated even though the task never retired
    let shards = shard_files(dir.path());
    assert_eq!(shards.len(), 1);
    let records = load_shard(&shards[0]).unwrap();
    assert_eq!(records.len() as u64, reports[0].written);
}
