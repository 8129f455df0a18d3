use issue_sync::fetch::{GitHubFetcher, PER_PAGE};
use issue_sync::load_config::GitHubConfig;
use issue_sync_core::config::SourceRepo;
use issue_sync_core::contract::Fetcher;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn issues(range: std::ops::Range<i64>) -> Vec<Value> {
    range.map(|n| json!({ "id": n, "number": n })).collect()
}

fn fetcher(server: &MockServer, token: Option<&str>) -> GitHubFetcher {
    GitHubFetcher::new(&GitHubConfig {
        api_url: server.uri(),
        token: token.map(str::to_string),
    })
    .expect("client builds")
}

async fn mount_page(server: &MockServer, page: u32, body: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .and(query_param("state", "all"))
        .and(query_param("per_page", PER_PAGE.to_string()))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_follows_pages_until_empty() {
    let server = MockServer::start().await;
    mount_page(&server, 1, issues(0..100)).await;
    mount_page(&server, 2, issues(100..130)).await;
    mount_page(&server, 3, Vec::new()).await;

    let source = SourceRepo::new("octo", "widgets");
    let fetched = fetcher(&server, None).fetch(&source, None).await.unwrap();

    assert_eq!(fetched.len(), 130);
    assert_eq!(fetched[0]["id"], 0);
    assert_eq!(fetched[129]["id"], 129);
}

#[tokio::test]
async fn fetch_stops_at_page_cap() {
    let server = MockServer::start().await;
    mount_page(&server, 1, issues(0..100)).await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issues(100..200)))
        .expect(0)
        .mount(&server)
        .await;

    let source = SourceRepo::new("octo", "widgets");
    let fetched = fetcher(&server, None).fetch(&source, Some(1)).await.unwrap();

    assert_eq!(fetched.len(), 100);
}

#[tokio::test]
async fn fetch_sends_token_and_text_media_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .and(header("authorization", "Bearer gh-test-token"))
        .and(header("accept", "application/vnd.github.text+json"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issues(0..2)))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 2, Vec::new()).await;

    let source = SourceRepo::new("octo", "widgets");
    let fetched = fetcher(&server, Some("gh-test-token"))
        .fetch(&source, None)
        .await
        .unwrap();

    assert_eq!(fetched.len(), 2);
}

#[tokio::test]
async fn fetch_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let source = SourceRepo::new("octo", "widgets");
    let err = fetcher(&server, None)
        .fetch(&source, None)
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("401"), "got: {err}");
    assert!(err.contains("Bad credentials"), "got: {err}");
}

#[tokio::test]
async fn fetch_rejects_non_array_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/octo/widgets/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "nope" })))
        .mount(&server)
        .await;

    let source = SourceRepo::new("octo", "widgets");
    let result = fetcher(&server, None).fetch(&source, None).await;

    assert!(result.is_err());
}
