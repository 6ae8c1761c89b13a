//! Stream accumulation.
//!
//! Providers hand back streaming results in three shapes: a pull stream, a
//! future resolving to the final aggregate, and an event subscription. A
//! [`StreamTap`] adapts each of them onto one [`StreamAccumulator`] so that
//! one completion is reported however the consumer finishes.
mod accumulator;
mod decoder;
mod tap;

pub use accumulator::{
    CompletionSink, StreamAccumulator, StreamCompletion, StreamSurface, Termination,
};
pub use decoder::{ChunkDecoder, DecodedChunk};
pub use tap::{MonitoredStream, StreamTap};
