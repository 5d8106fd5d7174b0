//! Integration tests for `StripeClient` using wiremock HTTP mocks.

use boutique_stripe::{IntentMetadata, StripeClient, StripeError};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> StripeClient {
    StripeClient::with_base_url("sk_test_123", 30, base_url)
        .expect("client construction should not fail")
        .with_retry(2, 0)
}

fn intent_body(metadata: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": "pi_123",
        "object": "payment_intent",
        "amount": 4400,
        "currency": "usd",
        "client_secret": "pi_123_secret_abc",
        "metadata": metadata
    })
}

#[tokio::test]
async fn create_payment_intent_posts_amount_and_currency() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(header_exists("idempotency-key"))
        .and(body_string_contains("amount=4400"))
        .and(body_string_contains("currency=usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body(serde_json::json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let intent = client
        .create_payment_intent(4400, "usd")
        .await
        .expect("should create intent");

    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.amount, 4400);
    assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
}

#[tokio::test]
async fn modify_metadata_sends_bracketed_keys() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_123"))
        .and(body_string_contains("metadata%5Bbag%5D="))
        .and(body_string_contains("metadata%5Bsave_info%5D=true"))
        .and(body_string_contains("metadata%5Busername%5D=ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body(serde_json::json!({
            "bag": "{\"1\":2}",
            "save_info": "true",
            "username": "ada"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let metadata = IntentMetadata {
        bag: r#"{"1":2}"#.to_owned(),
        save_info: true,
        username: "ada".to_owned(),
    };
    let intent = client
        .modify_payment_intent_metadata("pi_123", &metadata)
        .await
        .expect("should modify intent");

    assert_eq!(intent.metadata_value("bag"), Some(r#"{"1":2}"#));
    assert_eq!(intent.metadata_value("save_info"), Some("true"));
}

#[tokio::test]
async fn api_error_surfaces_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents/pi_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "message": "No such payment_intent: 'pi_missing'", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let metadata = IntentMetadata {
        bag: "{}".to_owned(),
        save_info: false,
        username: "AnonymousUser".to_owned(),
    };
    let err = client
        .modify_payment_intent_metadata("pi_missing", &metadata)
        .await
        .expect_err("should fail");

    match err {
        StripeError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(
                message.contains("No such payment_intent"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body(serde_json::json!({}))))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let intent = client
        .create_payment_intent(4400, "usd")
        .await
        .expect("should succeed after one retry");
    assert_eq!(intent.id, "pi_123");
}

#[tokio::test]
async fn malformed_success_body_is_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .create_payment_intent(100, "usd")
        .await
        .expect_err("should fail");
    assert!(matches!(err, StripeError::Deserialize { .. }));
}
