//! Integration tests for common Courier workflows.
//!
//! These tests go through the umbrella crate the way an application would.

use courier::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Greeting {
    message: String,
}

// =============================================================================
// Result Facade
// =============================================================================

#[tokio::test]
async fn test_get_json_through_decorated_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/greetings/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Greeting {
            message: "hello".into(),
        }))
        .mount(&server)
        .await;

    let metrics = courier::InMemoryMetrics::new();
    let mut builder = PipelineBuilder::new();
    builder
        .base_address(format!("{}/", server.uri()))
        .no_cache()
        .with(MetricsAndLogging::new(
            DefaultCallAnalyzer::new("greetings"),
            metrics.clone(),
        ))
        .with(RetryDecorator::with_intervals(&[10, 20]));
    let client = HttpClient::from_builder(&mut builder, JsonSerialization).unwrap();

    let result = client
        .send::<Greeting>("greetings/1", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        result.into_value().map(|g| g.message),
        Some("hello".to_string())
    );
    assert_eq!(metrics.status_count("greetings", 200), 1);
}

#[tokio::test]
async fn test_server_error_is_reported_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = HttpClient::with_base_address(format!("{}/", server.uri())).unwrap();

    let result = client
        .send::<Greeting>("greetings/1", None, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(result.error_message(), Some("boom"));
}

// =============================================================================
// Exception Facade
// =============================================================================

#[tokio::test]
async fn test_exception_client_returns_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/greetings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(Greeting {
            message: "created".into(),
        }))
        .mount(&server)
        .await;

    let client = ThrowingHttpClient::with_base_address(format!("{}/", server.uri())).unwrap();

    let greeting: Greeting = client
        .send_with(
            "greetings",
            &Greeting {
                message: "hi".into(),
            },
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(greeting.message, "created");
}

// =============================================================================
// Resilience Recipes
// =============================================================================

#[test]
fn test_bounded_collections() {
    let mut ring = RingBuffer::new(2);
    ring.push(1);
    ring.push(2);
    ring.push(3);
    assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3]);

    let queue = BoundedQueue::new(1);
    assert_eq!(queue.enqueue("a"), 0);
    assert_eq!(queue.enqueue("b"), 1);
    assert_eq!(queue.dequeue(), Some("b"));
}
