#![cfg(feature = "vercel")]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use olakai_core::OlakaiConfig;
use olakai_delivery::DeliveryClient;
use olakai_llm::{ChunkStream, EventListener, Instrument, VercelAi, VercelAiModel, WrapperConfig};
use olakai_monitor::{Monitor, MonitorBinding, MonitorOptions};

/// Emits each part to the listener as the pull side reaches it.
struct FakeModel {
    parts: Vec<Value>,
}

impl FakeModel {
    fn streaming_abc() -> Self {
        Self {
            parts: vec![
                json!({"type": "text-delta", "textDelta": "a"}),
                json!({"type": "text-delta", "textDelta": "b"}),
                json!({"type": "tool-call", "toolCallId": "t1", "toolName": "weather", "args": {}}),
                json!({"type": "text-delta", "textDelta": "c"}),
                json!({"type": "finish", "finishReason": "stop",
                       "usage": {"promptTokens": 9, "completionTokens": 3}}),
            ],
        }
    }
}

#[async_trait]
impl VercelAiModel for FakeModel {
    type Error = String;

    async fn generate_text(&self, _request: Value) -> Result<Value, String> {
        Ok(json!({
            "text": "sunny",
            "finishReason": "stop",
            "usage": {"inputTokens": 4, "outputTokens": 1},
            "totalUsage": {"inputTokens": 20, "outputTokens": 2, "totalTokens": 22},
            "response": {"modelId": "gpt-4o-mini-2024-07-18"}
        }))
    }

    async fn stream_text(
        &self,
        _request: Value,
        on_event: EventListener,
    ) -> Result<ChunkStream<String>, String> {
        let parts = self.parts.clone();
        Ok(stream::iter(parts)
            .map(move |part| {
                on_event(&part);
                Ok(part)
            })
            .boxed())
    }
}

async fn setup() -> (MockServer, Monitor) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/monitoring"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let config = OlakaiConfig::new(SecretString::new("test-key".to_string()))
        .with_monitor_endpoint(format!("{}/monitoring", server.uri()))
        .with_control_endpoint(format!("{}/control", server.uri()));
    let monitor = Monitor::new(DeliveryClient::new(Arc::new(config)).unwrap());
    (server, monitor)
}

async fn reports(server: &MockServer, monitor: &Monitor) -> Vec<Value> {
    monitor.reporter().drain(Duration::from_secs(5)).await.unwrap();
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.body_json().unwrap())
        .collect()
}

fn text_request() -> Value {
    json!({
        "model": {"provider": "openai.chat", "modelId": "gpt-4o-mini"},
        "prompt": "weather in Paris?",
        "temperature": 0.5
    })
}

#[tokio::test]
async fn generate_text_prefers_total_usage() {
    let (server, monitor) = setup().await;
    let model = VercelAi(FakeModel { parts: Vec::new() }).instrument(
        WrapperConfig::new().with_options(MonitorOptions::new().with_task("forecast")),
        MonitorBinding::Bound(monitor.clone()),
    );

    model.generate_text(text_request()).await.unwrap();

    let reports = reports(&server, &monitor).await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report["prompt"], "weather in Paris?");
    assert_eq!(report["response"], "sunny");
    assert_eq!(report["task"], "forecast");
    assert_eq!(report["tokens"], 22);
    assert_eq!(report["llmMetadata"]["provider"], "openai.chat");
    assert_eq!(report["llmMetadata"]["model"], "gpt-4o-mini-2024-07-18");
}

#[tokio::test]
async fn events_and_pull_together_report_text_once() {
    let (server, monitor) = setup().await;
    let model = VercelAi(FakeModel::streaming_abc())
        .instrument(WrapperConfig::new(), MonitorBinding::Bound(monitor.clone()));

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let on_event: EventListener = Arc::new(move |part: &Value| {
        sink.lock().unwrap().push(part["type"].clone());
    });

    let stream = model.open_stream(text_request(), on_event).await.unwrap();
    let result = stream.final_response().await.unwrap();
    assert_eq!(result["text"], "abc");
    assert_eq!(result["toolCalls"].as_array().map(Vec::len), Some(1));

    assert_eq!(received.lock().unwrap().len(), 5);

    let reports = reports(&server, &monitor).await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report["response"], "abc");
    assert_eq!(report["tokens"], 12);
    assert_eq!(report["llmMetadata"]["streamMode"], true);
    assert_eq!(report["llmMetadata"]["finishReason"], "stop");
    assert_eq!(report["llmMetadata"]["functionCalls"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn abort_part_ends_the_stream() {
    let (server, monitor) = setup().await;
    let model = VercelAi(FakeModel {
        parts: vec![
            json!({"type": "text-delta", "textDelta": "par"}),
            json!({"type": "abort"}),
        ],
    })
    .instrument(WrapperConfig::new(), MonitorBinding::Bound(monitor.clone()));

    let mut stream = model
        .open_stream(text_request(), Arc::new(|_: &Value| {}))
        .await
        .unwrap();
    while stream.next().await.is_some() {}
    assert!(stream.is_complete());
    drop(stream);

    let reports = reports(&server, &monitor).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["response"], "par");
    assert_eq!(reports[0]["llmMetadata"]["finishReason"], "abort");
    assert!(reports[0].get("errorMessage").is_none());
}

#[tokio::test]
async fn error_part_is_reported_as_failure() {
    let (server, monitor) = setup().await;
    let model = VercelAi(FakeModel {
        parts: vec![json!({"type": "error", "error": {"message": "quota exceeded"}})],
    })
    .instrument(WrapperConfig::new(), MonitorBinding::Bound(monitor.clone()));

    let stream = model
        .open_stream(text_request(), Arc::new(|_: &Value| {}))
        .await
        .unwrap();
    stream.final_response().await.unwrap();

    let reports = reports(&server, &monitor).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["errorMessage"], "quota exceeded");
}
