use async_trait::async_trait;
use courier_core::resilience::{CircuitBreaker, MaxErrorsPerTime};
use courier_http::decorators::{
    CaptureToFile, CircuitBreakerDecorator, MetricsAndLogging, RetryDecorator,
};
use courier_http::metrics::{ELAPSED, SUCCESS};
use courier_http::{
    CORRELATION_ID_HEADER, CallResult, DefaultCallAnalyzer, FailureKind, HttpClient,
    HttpClientError, InMemoryMetrics, JsonSerialization, NoContent, PipelineBuilder, Request,
    Response, ThrowingHttpClient, Transport,
};
use http::StatusCode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Item {
    id: u32,
}

fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::with_base_address(format!("{}/", server.uri())).unwrap()
}

/// Fails with a connection error a fixed number of times, then answers
/// `{"id":7}`.
struct FlakyUpstream {
    failures: usize,
    attempts: Arc<AtomicUsize>,
    correlation_ids: Arc<Mutex<Vec<String>>>,
}

impl FlakyUpstream {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
            correlation_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Transport for FlakyUpstream {
    async fn send(
        &self,
        request: Request,
        _cancel: &CancellationToken,
    ) -> courier_http::Result<Response> {
        if let Some(id) = request.header(CORRELATION_ID_HEADER) {
            self.correlation_ids.lock().push(id.to_string());
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(HttpClientError::Connection("connection refused".into()));
        }
        Response::new(StatusCode::OK, r#"{"id":7}"#).with_header("content-type", "application/json")
    }
}

#[tokio::test]
async fn test_not_found_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such item"))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send::<Item>("items/404", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result,
        CallResult::HttpError {
            status: StatusCode::NOT_FOUND,
            body: "no such item".to_string(),
        }
    );
}

#[tokio::test]
async fn test_success_with_accept_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/7"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Item { id: 7 }))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send::<Item>("items/7", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status(), Some(StatusCode::OK));
    assert_eq!(result.into_value(), Some(Item { id: 7 }));
}

#[tokio::test]
async fn test_post_body_and_default_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(query_param("apikey", "k1"))
        .and(header("content-type", "application/json"))
        .and(body_json(Item { id: 9 }))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_default_query_param("apikey", "k1");
    let result = client
        .send_with::<_, NoContent>("items", &Item { id: 9 }, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status(), Some(StatusCode::CREATED));
    assert!(result.is_success());
}

#[tokio::test]
async fn test_unreachable_server_is_connection_failure() {
    let client = HttpClient::with_base_address("http://127.0.0.1:1/").unwrap();

    let result = client
        .send::<Item>("items/1", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.failure().map(|f| &f.kind),
        Some(&FailureKind::Connection)
    );
    assert_eq!(
        result.error_message(),
        Some("Failed to establish connection to the server.")
    );
}

#[tokio::test]
async fn test_caller_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = client_for(&server)
        .send::<Item>("slow", None, &cancel)
        .await
        .unwrap();

    assert_eq!(
        result.failure().map(|f| &f.kind),
        Some(&FailureKind::CancelledByCaller)
    );
}

#[tokio::test]
async fn test_timeout_is_server_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .timeout(Duration::from_millis(100));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<Item>("slow", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.failure().map(|f| &f.kind),
        Some(&FailureKind::ServerTimeout)
    );
}

#[tokio::test]
async fn test_throwing_client_raises_on_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such item"))
        .mount(&server)
        .await;

    let client = ThrowingHttpClient::with_base_address(format!("{}/", server.uri())).unwrap();
    let e = client
        .send::<Item>("items/404", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(e.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(e.body_text().as_deref(), Some("no such item"));
}

#[tokio::test]
async fn test_digest_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(|request: &wiremock::Request| {
            request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| {
                    v.starts_with("Digest username=\"user\", realm=\"vault\", nonce=\"abc\"")
                        && v.contains("qop=auth")
                })
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(Item { id: 1 }))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "www-authenticate",
            r#"Digest realm="vault", qop="auth", algorithm=SHA-256, nonce="abc""#,
        ))
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .digest_authentication("user", "secret");
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<Item>("secure", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.into_value(), Some(Item { id: 1 }));
}

#[tokio::test]
async fn test_md5_digest_when_challenge_names_no_algorithm() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(|request: &wiremock::Request| {
            request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("algorithm=MD5,") && v.contains("opaque=\"o1\""))
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(Item { id: 2 }))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "www-authenticate",
            r#"Digest realm="vault", qop="auth", nonce="abc", opaque="o1""#,
        ))
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .digest_authentication("user", "secret");
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<Item>("secure", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.into_value(), Some(Item { id: 2 }));
}

#[tokio::test]
async fn test_redirect_is_returned_when_limit_unset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Item { id: 3 }))
        .expect(0)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send::<Item>("old", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result,
        CallResult::HttpError {
            status: StatusCode::FOUND,
            body: String::new(),
        }
    );
}

#[tokio::test]
async fn test_redirect_is_followed_within_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Item { id: 3 }))
        .expect(1)
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .max_redirects(1);
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<Item>("old", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.into_value(), Some(Item { id: 3 }));
}

#[tokio::test]
async fn test_basic_authentication_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .basic_authentication("user", "secret");
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<NoContent>("ping", None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_after_two_failures() {
    let upstream = FlakyUpstream::new(2);
    let attempts = upstream.attempts.clone();

    let mut builder = PipelineBuilder::new();
    builder
        .base_address("https://api.example.test")
        .transport(upstream)
        .with(RetryDecorator::with_intervals(&[100, 200, 400]));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let started = tokio::time::Instant::now();
    let result = client
        .send::<Item>("/items/7", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.into_value(), Some(Item { id: 7 }));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_is_error() {
    let upstream = FlakyUpstream::new(usize::MAX);

    let mut builder = PipelineBuilder::new();
    builder
        .base_address("https://api.example.test")
        .transport(upstream)
        .with(RetryDecorator::with_intervals(&[100, 200]));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let err = client
        .send::<Item>("/items/7", None, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        HttpClientError::RetryExhausted {
            description,
            attempts,
        } => {
            assert_eq!(description, "intervals 100, 200 ms");
            assert_eq!(attempts.len(), 3);
            assert!(attempts.iter().all(|a| a.error.is_connection()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_correlation_id_is_stable_across_retries() {
    let upstream = FlakyUpstream::new(2);
    let ids = upstream.correlation_ids.clone();
    let metrics = InMemoryMetrics::new();

    let pipeline = PipelineBuilder::new()
        .transport(upstream)
        .with(MetricsAndLogging::new(DefaultCallAnalyzer::new("items"), metrics.clone()))
        .with(RetryDecorator::with_intervals(&[10, 10, 10]))
        .build()
        .unwrap();

    let request = Request::get("https://api.example.test/items/7")
        .unwrap()
        .with_correlation_id("corr-7");
    let response = pipeline
        .send(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*ids.lock(), vec!["corr-7", "corr-7", "corr-7"]);
    assert_eq!(metrics.counter("items", SUCCESS), 1);
    assert_eq!(metrics.timing_count("items", ELAPSED), 1);
}

#[tokio::test]
async fn test_open_breaker_is_error() {
    let breaker = Arc::new(CircuitBreaker::new(
        "items",
        MaxErrorsPerTime::new(1, Duration::from_secs(60)),
    ));
    let mut builder = PipelineBuilder::new();
    builder
        .base_address("https://api.example.test")
        .transport(FlakyUpstream::new(usize::MAX))
        .with(CircuitBreakerDecorator::new(breaker.clone()));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();
    let cancel = CancellationToken::new();

    let first = client.send::<Item>("/items/7", None, &cancel).await.unwrap();
    assert_eq!(first.failure().map(|f| &f.kind), Some(&FailureKind::Connection));

    let second = client.send::<Item>("/items/7", None, &cancel).await.unwrap_err();
    assert!(matches!(second, HttpClientError::CircuitOpen { .. }));
    assert!(!breaker.is_closed());
}

#[tokio::test]
async fn test_capture_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    let pipeline = PipelineBuilder::new()
        .transport(FlakyUpstream::new(0))
        .with(CaptureToFile::new(&root, DefaultCallAnalyzer::default()).propagate_errors(true))
        .build()
        .unwrap();

    let request = Request::post("https://api.example.test/items")
        .unwrap()
        .with_body(r#"{"id":9}"#, "application/json")
        .unwrap()
        .with_correlation_id("corr-42");
    pipeline
        .send(request, &CancellationToken::new())
        .await
        .unwrap();

    let days: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(days.len(), 1);

    let day = &days[0];
    let request_body = std::fs::read_to_string(day.join("POST__items_corr-42_req.json")).unwrap();
    let response_body = std::fs::read_to_string(day.join("POST__items_corr-42_resp.json")).unwrap();
    assert_eq!(request_body, r#"{"id":9}"#);
    assert_eq!(response_body, r#"{"id":7}"#);
}

#[tokio::test]
async fn test_capture_skips_empty_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_str().unwrap().to_string();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .with(CaptureToFile::new(&root, DefaultCallAnalyzer::default()));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<NoContent>("ping", None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
