use serde_json::Value;

use olakai_core::{
    sanitize_text, sanitize_value, LlmMetadata, MonitorPayload, DEFAULT_CHAT_ID, DEFAULT_EMAIL,
};

/// A manually reported interaction, for calls that never went through a
/// wrapped client or function.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportEvent {
    pub prompt: Value,
    pub response: Value,
    pub chat_id: Option<String>,
    pub email: Option<String>,
    pub task: Option<String>,
    pub sub_task: Option<String>,
    pub tokens: u32,
    pub request_time_ms: u64,
    pub blocked: bool,
    pub sensitivity: Vec<String>,
    pub error_message: Option<String>,
    pub llm_metadata: Option<LlmMetadata>,
    pub sanitize: bool,
}

impl ReportEvent {
    pub fn new(prompt: impl Into<Value>, response: impl Into<Value>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            chat_id: None,
            email: None,
            task: None,
            sub_task: None,
            tokens: 0,
            request_time_ms: 0,
            blocked: false,
            sensitivity: Vec::new(),
            error_message: None,
            llm_metadata: None,
            sanitize: false,
        }
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_sub_task(mut self, sub_task: impl Into<String>) -> Self {
        self.sub_task = Some(sub_task.into());
        self
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_request_time_ms(mut self, request_time_ms: u64) -> Self {
        self.request_time_ms = request_time_ms;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_blocked(mut self, sensitivity: Vec<String>) -> Self {
        self.blocked = true;
        self.sensitivity = sensitivity;
        self
    }

    /// Token count falls back to the metadata total when none was given.
    pub fn with_llm_metadata(mut self, metadata: LlmMetadata) -> Self {
        self.llm_metadata = Some(metadata);
        self
    }

    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    pub fn into_payload(self) -> MonitorPayload {
        let tokens = match (&self.llm_metadata, self.tokens) {
            (Some(metadata), 0) => metadata.tokens.total,
            (_, tokens) => tokens,
        };
        let (prompt, response, error_message) = if self.sanitize {
            (
                sanitize_value(self.prompt),
                sanitize_value(self.response),
                self.error_message.map(|message| sanitize_text(&message)),
            )
        } else {
            (self.prompt, self.response, self.error_message)
        };
        MonitorPayload {
            prompt,
            response,
            chat_id: self.chat_id.unwrap_or_else(|| DEFAULT_CHAT_ID.to_string()),
            email: self.email.unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
            task: self.task,
            sub_task: self.sub_task,
            tokens,
            request_time_ms: self.request_time_ms,
            blocked: self.blocked,
            error_message,
            sensitivity: self.sensitivity,
            llm_metadata: self.llm_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_identity() {
        let payload = ReportEvent::new("q", "a").into_payload();
        assert_eq!(payload.chat_id, DEFAULT_CHAT_ID);
        assert_eq!(payload.email, DEFAULT_EMAIL);
        assert!(!payload.blocked);
    }

    #[test]
    fn sanitize_covers_prompt_response_and_error() {
        let payload = ReportEvent::new("mail me at jane@example.com", "ok")
            .with_error("key sk-abcdefghijklmnopqrstuvwx leaked")
            .with_sanitize(true)
            .into_payload();
        assert_eq!(payload.prompt, Value::String("mail me at [REDACTED]".into()));
        assert!(!payload.error_message.unwrap_or_default().contains("sk-"));
    }
}
