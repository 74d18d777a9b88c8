//! Vendor-backed map discovery and crawl-job lifecycle against a mock
//! upstream API.

use std::sync::Arc;

use pulse_crawl::core::config::Config;
use pulse_crawl::mcp::http::dispatch_tool;
use pulse_crawl::tools::map::map;
use pulse_crawl::{AppState, CrawlState, MapOptions, PulseError, ResultHandling, SitemapMode};

fn vendor_state(server: &mockito::Server) -> Arc<AppState> {
    let config = Config {
        vendor_api_key: Some("test-key".to_string()),
        vendor_base_url: server.url(),
        ..Default::default()
    };
    Arc::new(AppState::new(config).unwrap())
}

fn map_options(url: &str, start_index: usize, max_results: usize) -> MapOptions {
    MapOptions {
        url: url.to_string(),
        search: None,
        limit: 10_000,
        sitemap: SitemapMode::Include,
        include_subdomains: false,
        ignore_query_parameters: false,
        timeout: None,
        location: None,
        start_index,
        max_results: Some(max_results),
        result_handling: ResultHandling::ReturnOnly,
    }
}

fn links_body(count: usize) -> String {
    let links: Vec<String> = (0..count)
        .map(|i| format!("\"https://example.com/page/{}\"", i))
        .collect();
    format!(r#"{{"success":true,"links":[{}]}}"#, links.join(","))
}

// Scenario: 450 discovered URLs come back in three windows of 200.
#[tokio::test]
async fn map_windows_advance_until_exhausted() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/v1/map")
        .with_status(200)
        .with_body(links_body(450))
        .create_async()
        .await;
    let state = vendor_state(&server);

    let first = map(&state, map_options("https://example.com", 0, 200)).await.unwrap();
    assert_eq!(first.links.len(), 200);
    assert_eq!(first.total, 450);
    assert_eq!(first.next_start_index, Some(200));

    let second = map(&state, map_options("https://example.com", 200, 200)).await.unwrap();
    assert_eq!(second.links.len(), 200);
    assert_eq!(second.next_start_index, Some(400));
    assert_eq!(second.links[0].url, "https://example.com/page/200");

    let last = map(&state, map_options("https://example.com", 400, 200)).await.unwrap();
    assert_eq!(last.links.len(), 50);
    assert_eq!(last.next_start_index, None);
}

#[tokio::test]
async fn map_save_mode_persists_a_readable_resource() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/v1/map")
        .with_status(200)
        .with_body(links_body(5))
        .create_async()
        .await;
    let state = vendor_state(&server);

    let mut options = map_options("https://example.com", 0, 200);
    options.result_handling = ResultHandling::SaveAndReturn;
    let outcome = map(&state, options).await.unwrap();
    let uri = outcome.uri.expect("map page persisted");
    assert!(uri.starts_with("pulse-crawl://map/example.com/"), "{}", uri);
    assert!(uri.ends_with("/page-0"), "{}", uri);

    let response = dispatch_tool(&state, "read_resource", &serde_json::json!({ "uri": uri })).await;
    assert!(!response.is_error);
    let rendered = serde_json::to_value(&response).unwrap();
    let text = rendered["content"][0]["resource"]["text"].as_str().unwrap();
    assert!(text.contains("https://example.com/page/4"));
}

#[tokio::test]
async fn map_rejects_out_of_range_windows() {
    let server = mockito::Server::new_async().await;
    let state = vendor_state(&server);

    let mut options = map_options("https://example.com", 0, 200);
    options.max_results = Some(0);
    assert!(matches!(map(&state, options).await.unwrap_err(), PulseError::Input(_)));

    let mut options = map_options("https://example.com", 0, 200);
    options.max_results = Some(5_001);
    assert!(matches!(map(&state, options).await.unwrap_err(), PulseError::Input(_)));

    let mut options = map_options("https://example.com", 0, 200);
    options.limit = 100_001;
    assert!(matches!(map(&state, options).await.unwrap_err(), PulseError::Input(_)));
}

// Scenario: start → poll to completion → idempotent cancel on a terminal
// job; cancelling an unknown job is a non-retryable job error.
#[tokio::test]
async fn crawl_lifecycle_reaches_terminal_state_and_stays_there() {
    let mut server = mockito::Server::new_async().await;
    let _start = server
        .mock("POST", "/v1/crawl")
        .with_status(200)
        .with_body(r#"{"success":true,"id":"job-9","url":"https://api.example/v1/crawl/job-9"}"#)
        .create_async()
        .await;
    let _status = server
        .mock("GET", "/v1/crawl/job-9")
        .with_status(200)
        .with_body(
            r##"{"status":"completed","total":5,"completed":4,"creditsUsed":4,"expiresAt":"2026-08-02T00:00:00Z","data":[{"markdown":"# a"},{"markdown":"# b"}]}"##,
        )
        .create_async()
        .await;
    let cancel_mock = server
        .mock("DELETE", "/v1/crawl/job-9")
        .with_status(200)
        .with_body(r#"{"status":"cancelled"}"#)
        .expect(0)
        .create_async()
        .await;
    let state = vendor_state(&server);

    let started = dispatch_tool(
        &state,
        "crawl",
        &serde_json::json!({ "url": "https://example.com", "limit": 5 }),
    )
    .await;
    assert!(!started.is_error);
    let rendered = serde_json::to_value(&started).unwrap();
    assert!(rendered["content"][0]["text"].as_str().unwrap().contains("job-9"));

    let snapshot = state.crawler.status("job-9").await.unwrap();
    assert_eq!(snapshot.status, CrawlState::Completed);
    assert!(snapshot.completed <= 5);
    assert_eq!(snapshot.data.len(), 2);

    // Terminal job: cancel answers locally without calling upstream.
    let cancelled = state.crawler.cancel("job-9").await.unwrap();
    assert_eq!(cancelled.status, CrawlState::Completed);
    cancel_mock.assert_async().await;
}

#[tokio::test]
async fn cancelling_an_unknown_job_is_a_job_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("DELETE", "/v1/crawl/unknown")
        .with_status(404)
        .with_body(r#"{"error":"Job not found"}"#)
        .create_async()
        .await;
    let state = vendor_state(&server);

    let err = state.crawler.cancel("unknown").await.unwrap_err();
    assert!(!err.retryable());
    match err {
        PulseError::Job(message) => assert!(message.contains("unknown"), "{}", message),
        other => panic!("expected job error, got {other}"),
    }
}

#[tokio::test]
async fn crawl_inputs_are_mutually_exclusive() {
    let server = mockito::Server::new_async().await;
    let state = vendor_state(&server);

    let both = dispatch_tool(
        &state,
        "crawl",
        &serde_json::json!({ "url": "https://example.com", "jobId": "job-1" }),
    )
    .await;
    assert!(both.is_error);

    let neither = dispatch_tool(&state, "crawl", &serde_json::json!({})).await;
    assert!(neither.is_error);

    let cancel_without_job = dispatch_tool(
        &state,
        "crawl",
        &serde_json::json!({ "url": "https://example.com", "cancel": true }),
    )
    .await;
    assert!(cancel_without_job.is_error);
}

// Crawl requires the vendor; without a key the tool reports a clear
// actionable error instead of attempting anything.
#[tokio::test]
async fn crawl_without_vendor_key_is_actionable() {
    let state = Arc::new(AppState::new(Config::default()).unwrap());
    let response = dispatch_tool(
        &state,
        "crawl",
        &serde_json::json!({ "url": "https://example.com", "limit": 5 }),
    )
    .await;
    assert!(response.is_error);
    let rendered = serde_json::to_value(&response).unwrap();
    assert!(rendered["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("VENDOR_API_KEY"));
}
