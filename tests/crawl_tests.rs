//! End-to-end crawl tests
//!
//! These tests run the full pipeline against a wiremock HTTP server and a
//! temp-file SQLite database: pagination, change gating across repeated
//! runs, tag reconciliation, 429 handling and fatal aborts.

use skimmer::config::{
    Config, CrawlerConfig, OutputConfig, SelectorConfig, SourceConfig, UserAgentConfig,
};
use skimmer::crawler::crawl;
use skimmer::storage::{SqliteStorage, Storage};
use skimmer::SkimmerError;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(start_url: &str, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            min_interval_ms: 10,
            backoff_base_ms: 50,
        },
        user_agent: UserAgentConfig {
            crawler_name: "SkimmerTest".to_string(),
            crawler_version: "0.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        source: SourceConfig {
            name: "test".to_string(),
            start_url: start_url.to_string(),
            selectors: SelectorConfig {
                item: "article.entry".to_string(),
                identity: "h2 a".to_string(),
                description: Some("p.desc".to_string()),
                language: Some("span.lang".to_string()),
                updated: None,
                tags: Some("a.tag".to_string()),
                next_page: Some("a.next".to_string()),
            },
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

/// Renders one listing page; items are (identity href, tags)
fn listing_page(items: &[(&str, &[&str])], next: Option<&str>) -> String {
    let mut html = String::from("<html><body>");
    for (href, tags) in items {
        html.push_str(&format!(
            r#"<article class="entry"><h2><a href="{}">item</a></h2>
               <p class="desc">a description</p><span class="lang">Rust</span>"#,
            href
        ));
        for tag in *tags {
            html.push_str(&format!(r#"<a class="tag">{}</a>"#, tag));
        }
        html.push_str("</article>");
    }
    if let Some(next_href) = next {
        html.push_str(&format!(r#"<a class="next" href="{}">next</a>"#, next_href));
    }
    html.push_str("</body></html>");
    html
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn open_db(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&dir.path().join("skimmer.db")).unwrap()
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("skimmer.db").display().to_string()
}

#[tokio::test]
async fn test_pagination_visits_whole_chain_and_stops() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &["x"])], Some("/list/2")),
    )
    .await;
    mount_page(
        &server,
        "/list/2",
        listing_page(&[("https://example.com/b", &["y"])], Some("/list/3")),
    )
    .await;
    mount_page(
        &server,
        "/list/3",
        listing_page(&[("https://example.com/c", &[])], None),
    )
    .await;

    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    let summary = crawl(config).await.unwrap();

    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.pages_changed, 3);

    let storage = open_db(&tmp);
    assert_eq!(storage.count_snapshots().unwrap(), 3);
    assert_eq!(storage.count_items().unwrap(), 3);
    // One dispatch per page, no retries
    assert_eq!(storage.list_api_calls().unwrap().len(), 3);
}

#[tokio::test]
async fn test_second_run_over_identical_content_writes_nothing() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &["x", "y"])], None),
    )
    .await;

    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));

    let first = crawl(config.clone()).await.unwrap();
    assert_eq!(first.pages_changed, 1);

    let listing_url = format!("{}/list/1", server.uri());
    let (checked_before, changed_before, item_updated_before) = {
        let storage = open_db(&tmp);
        let snapshot = storage.get_snapshot(&listing_url).unwrap().unwrap();
        let item = storage.get_item("https://example.com/a").unwrap().unwrap();
        (snapshot.last_checked_at, snapshot.last_changed_at, item.updated_at)
    };

    // Give the check timestamp room to visibly move
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let second = crawl(config).await.unwrap();
    assert_eq!(second.pages_visited, 1);
    assert_eq!(second.pages_changed, 0);
    assert!(!second.stats.wrote_anything());

    let storage = open_db(&tmp);
    let snapshot = storage.get_snapshot(&listing_url).unwrap().unwrap();
    let item = storage.get_item("https://example.com/a").unwrap().unwrap();

    assert_ne!(snapshot.last_checked_at, checked_before);
    assert_eq!(snapshot.last_changed_at, changed_before);
    assert_eq!(item.updated_at, item_updated_before);
    assert_eq!(storage.count_items().unwrap(), 1);
    assert_eq!(storage.count_item_tags().unwrap(), 2);
}

#[tokio::test]
async fn test_changed_tags_converge_to_observed_set() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));

    let first_page = listing_page(&[("https://example.com/a", &["a", "b", "c"])], None);
    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first_page))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &["b", "c", "d"])], None),
    )
    .await;

    crawl(config.clone()).await.unwrap();
    let summary = crawl(config).await.unwrap();
    assert_eq!(summary.pages_changed, 1);
    assert_eq!(summary.stats.tags_unlinked, 1);
    assert_eq!(summary.stats.tags_linked, 1);

    let storage = open_db(&tmp);
    let item = storage.get_item("https://example.com/a").unwrap().unwrap();
    assert_eq!(
        storage.get_item_tags(item.id).unwrap(),
        vec!["b".to_string(), "c".to_string(), "d".to_string()]
    );
}

#[tokio::test]
async fn test_rate_limited_dispatch_retries_and_succeeds() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &[])], None),
    )
    .await;

    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    let summary = crawl(config).await.unwrap();

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.pages_rate_limited, 1);

    // Every physical attempt is one log row: two 429s plus the success
    let storage = open_db(&tmp);
    let calls = storage.list_api_calls().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].status, Some(429));
    assert_eq!(calls[1].status, Some(429));
    assert_eq!(calls[2].status, Some(200));
    assert!(calls.iter().all(|c| c.end_time.is_some()));
}

#[tokio::test]
async fn test_retry_after_hint_overrides_backoff() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &[])], None),
    )
    .await;

    let mut config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    // If the hint were ignored, the internal backoff would stall for 30s
    config.crawler.backoff_base_ms = 30_000;

    let started = Instant::now();
    let summary = crawl(config).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.pages_visited, 1);
    assert!(elapsed >= Duration::from_secs(1), "hint not honored: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(10), "backoff used instead of hint: {:?}", elapsed);
}

#[tokio::test]
async fn test_dispatches_respect_minimum_spacing() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/list/1",
        listing_page(&[("https://example.com/a", &[])], Some("/list/2")),
    )
    .await;
    mount_page(
        &server,
        "/list/2",
        listing_page(&[("https://example.com/b", &[])], None),
    )
    .await;

    let mut config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    config.crawler.min_interval_ms = 400;

    let started = Instant::now();
    crawl(config).await.unwrap();
    let elapsed = started.elapsed();

    // Two dispatches, one enforced gap between them
    assert!(elapsed >= Duration::from_millis(400), "spacing violated: {:?}", elapsed);
}

#[tokio::test]
async fn test_uncanonicalizable_item_halts_crawl_with_no_partial_writes() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    mount_page(
        &server,
        "/list/1",
        listing_page(
            &[
                ("https://example.com/good", &["x"]),
                ("mailto:broken@example.com", &[]),
            ],
            Some("/list/2"),
        ),
    )
    .await;

    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    let result = crawl(config).await;

    match result {
        Err(SkimmerError::MissingIdentity {
            listing_url,
            item_url,
        }) => {
            assert!(listing_url.ends_with("/list/1"));
            assert_eq!(item_url, "mailto:broken@example.com");
        }
        other => panic!("expected MissingIdentity, got {:?}", other.map(|s| s.pages_visited)),
    }

    // The whole page rolled back and the chain never advanced
    let storage = open_db(&tmp);
    assert_eq!(storage.count_items().unwrap(), 0);
    assert_eq!(storage.count_tags().unwrap(), 0);
    assert_eq!(storage.count_snapshots().unwrap(), 0);
    assert_eq!(storage.list_api_calls().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_429_error_status_is_not_retried() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = test_config(&format!("{}/list/1", server.uri()), &db_path(&tmp));
    let result = crawl(config).await;

    assert!(matches!(
        result,
        Err(SkimmerError::HttpStatus { status: 503, .. })
    ));

    let storage = open_db(&tmp);
    assert_eq!(storage.list_api_calls().unwrap().len(), 1);
}
