//! Olakai SDK: monitoring and policy control for generative-AI provider
//! calls.
//!
//! ```rust,no_run
//! use secrecy::SecretString;
//! use olakai::{MonitorOptions, OlakaiConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! olakai::initialize(OlakaiConfig::new(SecretString::new("key".to_string())))?;
//!
//! let summarize = olakai::wrap_function(
//!     |text: String| async move { Ok::<_, std::io::Error>(text.len()) },
//!     MonitorOptions::new().with_task("summarize"),
//! );
//! let _length = summarize.call("hello".to_string()).await?;
//!
//! olakai::shutdown(std::time::Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```
mod client;
mod error;
mod event;
mod global;

pub use client::Olakai;
pub use error::OlakaiError;
pub use event::ReportEvent;
pub use global::{
    drain, get, initialize, is_initialized, report_direct, report_event, shutdown, wrap_client,
    wrap_function, wrap_sync_function,
};

pub use olakai_core::{
    mask_api_key, sanitize_text, sanitize_value, ConfigError, ExecutionBlocked, Identifier,
    IdentifierError, LlmMetadata, MonitoringResponse, OlakaiConfig, Sanitizer, Timing, TokenUsage,
};
pub use olakai_delivery::{BreakerState, DeliveryError};
pub use olakai_llm::{ChunkStream, Instrument, MetadataNormalizer, ProviderStream, WrapperConfig};
pub use olakai_monitor::{
    DrainError, Monitor, MonitorError, MonitorOptions, MonitoredFn, MonitoredStream,
};

#[cfg(feature = "anthropic")]
pub use olakai_llm::anthropic;
#[cfg(feature = "google")]
pub use olakai_llm::google;
#[cfg(feature = "openai")]
pub use olakai_llm::openai;
#[cfg(feature = "vercel")]
pub use olakai_llm::vercel;
