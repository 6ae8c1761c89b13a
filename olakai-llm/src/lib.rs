//! Provider adapters for the Olakai monitor.
//!
//! Each provider module defines the minimal client trait that gets
//! intercepted, a normalizer that maps its raw JSON onto the canonical
//! metadata envelope, and a `Monitored*` wrapper implementing the same trait
//! by delegating to the real client.

mod instrument;
mod normalizer;
mod stream;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "vercel")]
pub mod vercel;

pub use instrument::{Instrument, WrapperConfig};
pub use normalizer::MetadataNormalizer;
pub use stream::{Assembler, ChunkStream, ProviderStream};

#[cfg(feature = "anthropic")]
pub use anthropic::{Anthropic, AnthropicMessages, AnthropicNormalizer, MonitoredAnthropic};
#[cfg(feature = "google")]
pub use google::{
    Google, GoogleGenerativeModel, GoogleNormalizer, GoogleStreamResult, MonitoredGoogle,
    MonitoredGoogleStream,
};
#[cfg(feature = "openai")]
pub use openai::{MonitoredOpenAi, OpenAi, OpenAiChat, OpenAiNormalizer};
#[cfg(feature = "vercel")]
pub use vercel::{EventListener, MonitoredVercelAi, VercelAi, VercelAiModel, VercelNormalizer};
