use super::*;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_url(server: &MockServer, route: &str) -> Url {
    Url::parse(&server.uri())
        .and_then(|base| base.join(route))
        .expect("mock server url should parse")
}

#[test]
fn backoff_doubles_per_attempt() {
    assert_eq!(backoff_factor(1), 1);
    assert_eq!(backoff_factor(2), 2);
    assert_eq!(backoff_factor(3), 4);
    assert_eq!(backoff_factor(100), 65536);
}

#[test]
fn retry_attempts_never_drop_below_one() {
    let transport = HttpTransport::default().with_retry_attempts(0);
    assert_eq!(transport.retry_attempts(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn post_json_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let url = server_url(&server, "/v1/chat");
    let body = tokio::task::spawn_blocking(move || {
        HttpTransport::default().post_json(&url, &serde_json::json!({"a": 1}), Some("secret"))
    })
    .await
    .expect("blocking task should complete")
    .expect("request should succeed");

    assert_eq!(body, "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let url = server_url(&server, "/flaky");
    let result = tokio::task::spawn_blocking(move || {
        HttpTransport::default()
            .with_retry_attempts(3)
            .with_backoff_unit(Duration::from_millis(1))
            .get_text(&url)
    })
    .await
    .expect("blocking task should complete");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = server_url(&server, "/missing");
    let result = tokio::task::spawn_blocking(move || {
        HttpTransport::default()
            .with_retry_attempts(3)
            .with_backoff_unit(Duration::from_millis(1))
            .get_text(&url)
    })
    .await
    .expect("blocking task should complete");

    let message = result.expect_err("404 should fail").to_string();
    assert!(message.contains("404"));
}
