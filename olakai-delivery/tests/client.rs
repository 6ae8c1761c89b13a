use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use olakai_core::{ControlPayload, Endpoint, MonitorPayload, OlakaiConfig};
use olakai_delivery::{DeliveryClient, DeliveryError};

fn config(server: &MockServer) -> OlakaiConfig {
    OlakaiConfig::new(SecretString::new("test-key".to_string()))
        .with_monitor_endpoint(format!("{}/monitoring", server.uri()))
        .with_control_endpoint(format!("{}/control", server.uri()))
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
}

fn monitor_payload() -> MonitorPayload {
    MonitorPayload {
        prompt: json!("hi"),
        response: json!("hello"),
        chat_id: "123".to_string(),
        email: "anonymous@olakai.ai".to_string(),
        task: None,
        sub_task: None,
        tokens: 0,
        request_time_ms: 5,
        blocked: false,
        error_message: None,
        sensitivity: vec![],
        llm_metadata: None,
    }
}

#[tokio::test]
async fn send_attaches_key_version_and_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .and(header("x-api-key", "test-key"))
        .and(header("x-sdk-version", olakai_core::SDK_VERSION))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "totalRequests": 1,
            "successCount": 1,
            "failureCount": 0,
            "results": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Arc::new(config(&server))).unwrap();
    let response = client.send_monitoring(&monitor_payload()).await.unwrap();
    assert_eq!(response.success_count, 1);
}

#[tokio::test]
async fn empty_monitoring_body_counts_as_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Arc::new(config(&server))).unwrap();
    let response = client.send_monitoring(&monitor_payload()).await.unwrap();
    assert!(response.success);
}

#[tokio::test]
async fn monitoring_rejection_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "totalRequests": 1,
            "successCount": 0,
            "failureCount": 1,
            "results": [{"index": 0, "success": false, "error": "invalid chatId"}]
        })))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Arc::new(config(&server))).unwrap();
    let err = client.send_monitoring(&monitor_payload()).await.unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected(ref reason) if reason == "invalid chatId"));
}

#[tokio::test]
async fn control_response_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "allowed": false,
            "details": {"detectedSensitivity": ["PII"], "isAllowedPersona": false},
            "message": "blocked"
        })))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Arc::new(config(&server))).unwrap();
    let response = client
        .send_control(&ControlPayload {
            prompt: json!("my ssn is 123-45-6789"),
            chat_id: "123".to_string(),
            email: "anonymous@olakai.ai".to_string(),
            task: None,
            sub_task: None,
            tokens: 0,
            override_criteria: false,
        })
        .await
        .unwrap();
    assert!(!response.allowed);
    assert_eq!(response.details.detected_sensitivity, vec!["PII".to_string()]);
}

#[tokio::test]
async fn offline_client_fails_fast_without_requests() {
    let server = MockServer::start().await;
    let client = DeliveryClient::new(Arc::new(config(&server))).unwrap();
    client.set_online(false);

    let err = client
        .send(Endpoint::Monitoring, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Offline));
    assert!(server.received_requests().await.unwrap().is_empty());

    client.set_online(true);
    assert!(client.is_online());
}

#[tokio::test]
async fn request_id_is_stable_across_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = DeliveryClient::new(Arc::new(config(&server).with_retries(2))).unwrap();
    let _ = client.send(Endpoint::Monitoring, &json!({})).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let ids: HashSet<_> = requests
        .iter()
        .map(|request| request.headers.get("x-request-id").cloned())
        .collect();
    assert_eq!(ids.len(), 1);
}
