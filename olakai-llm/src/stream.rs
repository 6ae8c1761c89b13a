use std::fmt::{self, Display};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;

use olakai_core::PartialMetadata;
use olakai_monitor::{MonitoredStream, StreamSurface, Termination};

/// Raw provider chunks, events or parts.
pub type ChunkStream<E> = BoxStream<'static, Result<Value, E>>;

/// Builds the provider-shaped aggregate from the accumulated text and
/// metadata.
pub type Assembler = fn(&str, &PartialMetadata) -> Value;

/// A monitored provider stream with a terminal accessor.
pub struct ProviderStream<E> {
    inner: MonitoredStream<Value, E>,
    assemble: Assembler,
}

impl<E> ProviderStream<E> {
    pub(crate) fn new(inner: MonitoredStream<Value, E>, assemble: Assembler) -> Self {
        Self { inner, assemble }
    }

    pub fn accumulated_text(&self) -> String {
        self.inner.accumulated_text()
    }

    pub fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }
}

impl<E: Display> ProviderStream<E> {
    /// Consumes the rest of the stream and returns the aggregate response.
    pub async fn final_response(mut self) -> Result<Value, E> {
        while let Some(item) = self.inner.next().await {
            item?;
        }
        let text = self.inner.accumulated_text();
        let metadata = self.inner.accumulated_metadata();
        self.inner
            .tap()
            .complete(Termination::Completed, Some(StreamSurface::PullIterator));
        Ok((self.assemble)(&text, &metadata))
    }
}

impl<E: Display> Stream for ProviderStream<E> {
    type Item = Result<Value, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl<E> fmt::Debug for ProviderStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderStream")
            .field("inner", &self.inner)
            .finish()
    }
}
