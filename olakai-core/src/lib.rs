//! Shared types for the Olakai SDK: configuration, wire payloads, the
//! canonical LLM metadata envelope, identifier resolution and sanitization.
mod config;
mod error;
mod identity;
mod metadata;
mod payload;
mod sanitize;

pub use config::{OlakaiConfig, DEFAULT_CONTROL_ENDPOINT, DEFAULT_MONITOR_ENDPOINT, SDK_VERSION};
pub use error::{ConfigError, ExecutionBlocked};
pub use identity::{Identifier, IdentifierError, DEFAULT_CHAT_ID, DEFAULT_EMAIL};
pub use metadata::{mask_api_key, LlmMetadata, PartialMetadata, Timing, TokenUsage};
pub use payload::{
    ControlDetails, ControlPayload, ControlResponse, Endpoint, MonitorPayload,
    MonitoringResponse, MonitoringResult,
};
pub use sanitize::{sanitize_text, sanitize_value, Sanitizer};

pub type Value = serde_json::Value;
