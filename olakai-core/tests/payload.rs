use serde_json::json;

use olakai_core::{ControlResponse, MonitorPayload, MonitoringResponse};

#[test]
fn control_response_tolerates_missing_details() {
    let response: ControlResponse = serde_json::from_value(json!({"allowed": true})).unwrap();
    assert!(response.allowed);
    assert!(response.details.detected_sensitivity.is_empty());
}

#[test]
fn denied_control_response_becomes_blocked_error() {
    let response: ControlResponse = serde_json::from_value(json!({
        "allowed": false,
        "details": {"detectedSensitivity": ["PII"], "isAllowedPersona": true},
        "message": "contains PII"
    }))
    .unwrap();
    let blocked = response.into_blocked();
    assert_eq!(blocked.detected_sensitivity, vec!["PII".to_string()]);
    assert!(blocked.is_allowed_persona);
    assert_eq!(blocked.to_string(), "execution blocked by policy: contains PII");
}

#[test]
fn monitor_payload_uses_wire_field_names() {
    let payload = MonitorPayload {
        prompt: json!("hi"),
        response: json!("hello"),
        chat_id: "c1".to_string(),
        email: "a@b.co".to_string(),
        task: Some("support".to_string()),
        sub_task: None,
        tokens: 3,
        request_time_ms: 12,
        blocked: false,
        error_message: None,
        sensitivity: vec![],
        llm_metadata: None,
    };
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["chatId"], json!("c1"));
    assert_eq!(value["requestTimeMs"], json!(12));
    assert!(value.get("subTask").is_none());
    assert!(value.get("errorMessage").is_none());
}

#[test]
fn monitoring_response_parses_batch_shape() {
    let response: MonitoringResponse = serde_json::from_value(json!({
        "success": true,
        "totalRequests": 1,
        "successCount": 1,
        "failureCount": 0,
        "results": [{"index": 0, "success": true, "promptRequestId": "p1"}]
    }))
    .unwrap();
    assert_eq!(response.results[0].prompt_request_id.as_deref(), Some("p1"));
}
