use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Raised when the control endpoint denies a call, or when permission could
/// not be confirmed at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionBlocked {
    pub detected_sensitivity: Vec<String>,
    pub is_allowed_persona: bool,
    pub message: Option<String>,
}

impl ExecutionBlocked {
    /// Block issued because the control check itself failed.
    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            detected_sensitivity: Vec::new(),
            is_allowed_persona: false,
            message: Some(reason.into()),
        }
    }
}

impl fmt::Display for ExecutionBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "execution blocked by policy: {message}"),
            None => f.write_str("execution blocked by policy"),
        }
    }
}

impl std::error::Error for ExecutionBlocked {}
