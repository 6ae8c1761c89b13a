use std::time::Duration;

use secrecy::SecretString;
use serde_json::{json, Value};
use serial_test::serial;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use olakai::{MonitorOptions, OlakaiConfig, OlakaiError, ReportEvent};

async fn monitoring_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "totalRequests": 1,
            "successCount": 1,
            "failureCount": 0,
            "results": [{"index": 0, "success": true, "promptRequestId": "req-1"}]
        })))
        .mount(&server)
        .await;
    server
}

fn config(server: &MockServer) -> OlakaiConfig {
    OlakaiConfig::new(SecretString::new("test-key".to_string()))
        .with_monitor_endpoint(format!("{}/monitoring", server.uri()))
        .with_control_endpoint(format!("{}/control", server.uri()))
}

async fn reports(server: &MockServer) -> Vec<Value> {
    olakai::drain(Duration::from_secs(5)).await.unwrap();
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.body_json().unwrap())
        .collect()
}

async fn reset() {
    olakai::shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
#[serial]
async fn operations_before_initialize() {
    reset().await;
    assert!(!olakai::is_initialized());

    let err = olakai::report_direct(ReportEvent::new("q", "a")).await.unwrap_err();
    assert!(matches!(err, OlakaiError::NotInitialized));
    assert!(matches!(olakai::get(), Err(OlakaiError::NotInitialized)));

    // neither of these may fail or panic
    olakai::report_event(ReportEvent::new("q", "a"));
    olakai::drain(Duration::from_millis(10)).await.unwrap();

    let double = olakai::wrap_function(
        |n: u32| async move { Ok::<_, String>(n * 2) },
        MonitorOptions::new(),
    );
    assert_eq!(double.call(21).await.unwrap(), 42);
}

#[tokio::test]
#[serial]
async fn invalid_configuration_is_not_installed() {
    reset().await;
    let result = olakai::initialize(OlakaiConfig::new(SecretString::new(String::new())));
    assert!(matches!(result, Err(OlakaiError::Config(_))));
    assert!(!olakai::is_initialized());
}

#[tokio::test]
#[serial]
async fn wrapper_created_before_initialize_reports_after_it() {
    reset().await;
    let server = monitoring_server().await;
    let greet = olakai::wrap_function(
        |name: String| async move { Ok::<_, String>(format!("hello {name}")) },
        MonitorOptions::new().with_task("greeting"),
    );

    greet.call("early".to_string()).await.unwrap();
    olakai::initialize(config(&server)).unwrap();
    greet.call("ada".to_string()).await.unwrap();

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["prompt"], "ada");
    assert_eq!(reports[0]["response"], "hello ada");
    assert_eq!(reports[0]["task"], "greeting");
    reset().await;
}

#[tokio::test]
#[serial]
async fn reinitialize_switches_destination() {
    reset().await;
    let first = monitoring_server().await;
    let second = monitoring_server().await;
    let echo = olakai::wrap_sync_function(
        |text: String| Ok::<_, String>(text),
        MonitorOptions::new(),
    );

    olakai::initialize(config(&first)).unwrap();
    echo.call("one".to_string()).await.unwrap();
    olakai::drain(Duration::from_secs(5)).await.unwrap();

    olakai::initialize(config(&second)).unwrap();
    echo.call("two".to_string()).await.unwrap();

    let to_second = reports(&second).await;
    let to_first = first.received_requests().await.unwrap_or_default();
    assert_eq!(to_first.len(), 1);
    assert_eq!(to_second.len(), 1);
    assert_eq!(to_second[0]["prompt"], "two");
    reset().await;
}

#[tokio::test]
#[serial]
async fn manual_reports() {
    reset().await;
    let server = monitoring_server().await;
    olakai::initialize(config(&server)).unwrap();

    olakai::report_event(
        ReportEvent::new("what is 2+2?", "4")
            .with_chat_id("chat-9")
            .with_tokens(7)
            .with_request_time_ms(120),
    );
    let ack = olakai::report_direct(ReportEvent::new("ping", "pong").with_email("ops@example.com"))
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.results[0].prompt_request_id.as_deref(), Some("req-1"));

    let reports = reports(&server).await;
    assert_eq!(reports.len(), 2);
    let event = reports
        .iter()
        .find(|report| report["prompt"] == "what is 2+2?")
        .unwrap();
    assert_eq!(event["chatId"], "chat-9");
    assert_eq!(event["email"], "anonymous@olakai.ai");
    assert_eq!(event["tokens"], 7);
    assert_eq!(event["requestTimeMs"], 120);
    reset().await;
}

#[tokio::test]
#[serial]
async fn shutdown_drains_then_uninstalls() {
    reset().await;
    let server = monitoring_server().await;
    olakai::initialize(config(&server)).unwrap();
    let length = olakai::wrap_function(
        |text: String| async move { Ok::<_, String>(text.len()) },
        MonitorOptions::new(),
    );

    length.call("abc".to_string()).await.unwrap();
    olakai::shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
    assert!(!olakai::is_initialized());

    // unmonitored once uninstalled
    assert_eq!(length.call("abcd".to_string()).await.unwrap(), 4);
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn explicit_instance_needs_no_global_state() {
    let server = monitoring_server().await;
    let olakai = olakai::Olakai::new(config(&server)).unwrap();
    let upper = olakai.wrap_function(
        |text: String| async move { Ok::<_, String>(text.to_uppercase()) },
        MonitorOptions::new().with_chat_id("local"),
    );

    assert_eq!(upper.call("quiet".to_string()).await.unwrap(), "QUIET");
    olakai.drain(Duration::from_secs(5)).await.unwrap();

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 1);
    let report: Value = received[0].body_json().unwrap();
    assert_eq!(report["chatId"], "local");
}
