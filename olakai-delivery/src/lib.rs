//! Delivery of monitoring and control payloads to the Olakai service.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use secrecy::SecretString;
//! use olakai_core::{Endpoint, OlakaiConfig};
//! use olakai_delivery::DeliveryClient;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = Arc::new(OlakaiConfig::new(SecretString::new("key".to_string())));
//! let client = DeliveryClient::new(config).unwrap();
//! let _ = client
//!     .send(Endpoint::Monitoring, &serde_json::json!({"prompt": "hi"}))
//!     .await;
//! # }
//! ```
mod backoff;
mod breaker;
mod client;
mod error;

pub use backoff::Backoff;
pub use breaker::{Admission, BreakerState, CircuitBreaker, Permit};
pub use client::DeliveryClient;
pub use error::DeliveryError;
