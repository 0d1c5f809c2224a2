//! Mock API tests for the upstream moderation client.
//!
//! These tests use wiremock to simulate the upstream moderations endpoint,
//! with response bodies shaped like the official API reference.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modkit::category::Category;
use modkit::client::{ModerationCapability, ModerationClient, ModerationConfig};
use modkit::error::ModerationError;
use modkit::retry::RetryPolicy;

fn moderation_response() -> serde_json::Value {
    json!({
        "id": "modr-123",
        "model": "omni-moderation-latest",
        "results": [{
            "flagged": false,
            "categories": {
                "sexual": false,
                "hate": false,
                "harassment": false,
                "self-harm": false,
                "violence": false
            },
            "category_scores": {
                "sexual": 0.12,
                "hate": 0.01,
                "harassment": 0.02,
                "self-harm": 0.005,
                "violence": 0.3,
                "hate/threatening": 0.001,
                "violence/graphic": 0.002
            }
        }]
    })
}

fn test_client(server: &MockServer, max_attempts: u32) -> ModerationClient {
    let config = ModerationConfig::new("test-api-key")
        .with_base_url(server.uri())
        .with_retry(
            RetryPolicy::new()
                .with_max_attempts(max_attempts)
                .with_delay(Duration::from_millis(10)),
        );
    ModerationClient::new(config).unwrap()
}

#[tokio::test]
async fn scores_content_and_keeps_only_catalog_categories() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(moderation_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let scores = client.moderate("hello").await.unwrap().unwrap();

    // Subcategory keys like "hate/threatening" are dropped.
    assert_eq!(scores.len(), Category::ALL.len());
    assert_eq!(scores.get(&Category::Sexual), Some(&0.12));
    assert_eq!(scores.get(&Category::Violence), Some(&0.3));
}

#[tokio::test]
async fn identical_content_yields_independent_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(moderation_response()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    client.moderate("same content").await.unwrap().unwrap();
    client.moderate("same content").await.unwrap().unwrap();
}

#[tokio::test]
async fn retries_rate_limit_then_succeeds() {
    let mock_server = MockServer::start().await;

    // First two attempts are rate limited, the third succeeds.
    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({ "error": { "message": "rate limit exceeded" } })),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(moderation_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let scores = client.moderate("hello").await.unwrap();
    assert!(scores.is_some());
}

#[tokio::test]
async fn exhausting_retry_budget_returns_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let outcome = client.moderate("hello").await.unwrap();
    assert!(outcome.is_none(), "exhausted retries must degrade to unavailable");
}

#[tokio::test]
async fn auth_rejection_propagates_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "message": "invalid api key" } })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, ModerationError::Authentication(_)));
}

#[tokio::test]
async fn bad_request_propagates_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, ModerationError::Api { code: 400, .. }));
}

#[tokio::test]
async fn undecodable_body_is_a_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, ModerationError::Parse(_)));
}

#[tokio::test]
async fn empty_results_array_is_a_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/moderations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": "modr-0", "model": "m", "results": [] })),
        )
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server, 3);
    let err = client.moderate("hello").await.unwrap_err();
    assert!(matches!(err, ModerationError::Parse(_)));
}
