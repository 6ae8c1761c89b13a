use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ExecutionBlocked, LlmMetadata, OlakaiConfig, Value};

/// Which remote endpoint a payload is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Monitoring,
    Control,
}

impl Endpoint {
    pub fn url<'a>(&self, config: &'a OlakaiConfig) -> &'a str {
        match self {
            Endpoint::Monitoring => &config.monitor_endpoint,
            Endpoint::Control => &config.control_endpoint,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Monitoring => f.write_str("monitoring"),
            Endpoint::Control => f.write_str("control"),
        }
    }
}

/// Authorization request sent before the wrapped call runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPayload {
    pub prompt: Value,
    pub chat_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_task: Option<String>,
    pub tokens: u32,
    pub override_criteria: bool,
}

/// One completed, failed or blocked interaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPayload {
    pub prompt: Value,
    pub response: Value,
    pub chat_id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_task: Option<String>,
    pub tokens: u32,
    pub request_time_ms: u64,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub sensitivity: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_metadata: Option<LlmMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDetails {
    #[serde(default)]
    pub detected_sensitivity: Vec<String>,
    #[serde(default)]
    pub is_allowed_persona: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub allowed: bool,
    #[serde(default)]
    pub details: ControlDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlResponse {
    pub fn into_blocked(self) -> ExecutionBlocked {
        ExecutionBlocked {
            detected_sensitivity: self.details.detected_sensitivity,
            is_allowed_persona: self.details.is_allowed_persona,
            message: self.message,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringResult {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch-shaped acknowledgement, also used for single payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringResponse {
    pub success: bool,
    #[serde(default)]
    pub total_requests: u32,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub results: Vec<MonitoringResult>,
}
