//! Call interception for the Olakai SDK.
//!
//! A [`Monitor`] runs the per-call state machine: identify the caller,
//! optionally ask the control endpoint for permission, run the wrapped
//! callable, then report the outcome without holding up the caller.
//! Streaming results go through a [`StreamTap`], which reports once no
//! matter how the consumer finishes with the stream.
mod error;
mod monitor;
mod options;
mod reporter;
pub mod stream;
mod wrapper;

pub use error::{DrainError, MonitorError};
pub use monitor::{CallContext, Monitor, Outcome, ResponseSummary};
pub use options::MonitorOptions;
pub use reporter::Reporter;
pub use stream::{
    ChunkDecoder, DecodedChunk, MonitoredStream, StreamAccumulator, StreamCompletion,
    StreamSurface, StreamTap, Termination,
};
pub use wrapper::{sync_callable, MonitorBinding, MonitoredFn};
