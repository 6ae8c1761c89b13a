use reqwest::StatusCode;
use thiserror::Error;

use olakai_core::Endpoint;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http error: {status}")]
    Http { status: StatusCode, body: String },
    #[error("offline: delivery skipped")]
    Offline,
    #[error("circuit open for {endpoint} endpoint")]
    CircuitOpen { endpoint: Endpoint },
    #[error("delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<DeliveryError>,
    },
    #[error("rejected by monitoring service: {0}")]
    Rejected(String),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Failures that count against an endpoint's health.
    pub fn is_transient(&self) -> bool {
        match self {
            DeliveryError::Request(err) => !err.is_builder(),
            DeliveryError::Http { status, .. } => is_retryable_status(*status),
            DeliveryError::Offline | DeliveryError::RetriesExhausted { .. } => true,
            DeliveryError::CircuitOpen { .. }
            | DeliveryError::Rejected(_)
            | DeliveryError::Decode(_) => false,
        }
    }
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
