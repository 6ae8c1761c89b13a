use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use olakai_core::{Endpoint, OlakaiConfig};
use olakai_delivery::{BreakerState, DeliveryClient, DeliveryError};

fn config(server: &MockServer, cooldown: Duration) -> OlakaiConfig {
    OlakaiConfig::new(SecretString::new("test-key".to_string()))
        .with_monitor_endpoint(format!("{}/monitoring", server.uri()))
        .with_control_endpoint(format!("{}/control", server.uri()))
        .with_retries(0)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(1))
        .with_breaker(2, cooldown)
}

#[tokio::test]
async fn breaker_opens_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client =
        DeliveryClient::new(Arc::new(config(&server, Duration::from_secs(60)))).unwrap();
    for _ in 0..2 {
        let err = client.send(Endpoint::Control, &json!({})).await.unwrap_err();
        assert!(matches!(err, DeliveryError::RetriesExhausted { .. }));
    }
    assert_eq!(client.breaker_state(Endpoint::Control), BreakerState::Open);

    let err = client.send(Endpoint::Control, &json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        DeliveryError::CircuitOpen {
            endpoint: Endpoint::Control
        }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn breakers_are_per_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client =
        DeliveryClient::new(Arc::new(config(&server, Duration::from_secs(60)))).unwrap();
    for _ in 0..2 {
        let _ = client.send(Endpoint::Control, &json!({})).await;
    }
    assert_eq!(client.breaker_state(Endpoint::Control), BreakerState::Open);
    assert_eq!(client.breaker_state(Endpoint::Monitoring), BreakerState::Closed);
    assert!(client.send(Endpoint::Monitoring, &json!({})).await.is_ok());
}

#[tokio::test]
async fn half_open_trial_closes_breaker_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client =
        DeliveryClient::new(Arc::new(config(&server, Duration::from_millis(50)))).unwrap();
    for _ in 0..2 {
        let _ = client.send(Endpoint::Monitoring, &json!({})).await;
    }
    assert_eq!(client.breaker_state(Endpoint::Monitoring), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(client.send(Endpoint::Monitoring, &json!({})).await.is_ok());
    assert_eq!(client.breaker_state(Endpoint::Monitoring), BreakerState::Closed);
}

#[tokio::test]
async fn client_errors_do_not_trip_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let client =
        DeliveryClient::new(Arc::new(config(&server, Duration::from_secs(60)))).unwrap();
    for _ in 0..3 {
        let err = client
            .send(Endpoint::Monitoring, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Http { .. }));
    }
    assert_eq!(client.breaker_state(Endpoint::Monitoring), BreakerState::Closed);
}

#[tokio::test]
async fn cancelled_trial_does_not_wedge_the_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"allowed": true}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let cooldown = Duration::from_millis(10);
    let config = config(&server, cooldown).with_breaker(1, cooldown);
    let client = DeliveryClient::new(Arc::new(config)).unwrap();
    assert!(client.send(Endpoint::Control, &json!({})).await.is_err());
    assert_eq!(client.breaker_state(Endpoint::Control), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        client.send(Endpoint::Control, &json!({})),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(client.breaker_state(Endpoint::Control), BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let later = client.send(Endpoint::Control, &json!({})).await;
    assert!(later.is_ok(), "unexpected {later:?}");
    assert_eq!(client.breaker_state(Endpoint::Control), BreakerState::Closed);
}
