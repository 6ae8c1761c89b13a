use std::fmt::{self, Display};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use olakai_core::PartialMetadata;

use super::{
    ChunkDecoder, CompletionSink, DecodedChunk, StreamAccumulator, StreamSurface, Termination,
};

/// Completes the stream as an early exit once the last handle is gone.
struct Lifeline {
    accumulator: Arc<StreamAccumulator>,
}

impl Drop for Lifeline {
    fn drop(&mut self) {
        self.accumulator.complete(Termination::EarlyExit, None);
    }
}

/// Feeds chunks from any mix of pull, final-future and event surfaces into
/// one [`StreamAccumulator`]. Every handle handed out keeps the stream alive;
/// dropping them all without reaching a terminal record reports what was
/// accumulated so far.
pub struct StreamTap<C> {
    decoder: Arc<dyn ChunkDecoder<C>>,
    accumulator: Arc<StreamAccumulator>,
    lifeline: Arc<Lifeline>,
}

impl<C> StreamTap<C> {
    pub fn new(decoder: impl ChunkDecoder<C> + 'static, sink: CompletionSink) -> Self {
        let accumulator = Arc::new(StreamAccumulator::new(sink));
        Self {
            decoder: Arc::new(decoder),
            lifeline: Arc::new(Lifeline {
                accumulator: Arc::clone(&accumulator),
            }),
            accumulator,
        }
    }

    /// A handle on the same accumulation that reads chunks with `decoder`.
    /// Used when two surfaces carry the same records and only one of them
    /// should contribute text.
    pub fn with_decoder(&self, decoder: impl ChunkDecoder<C> + 'static) -> Self {
        Self {
            decoder: Arc::new(decoder),
            accumulator: Arc::clone(&self.accumulator),
            lifeline: Arc::clone(&self.lifeline),
        }
    }

    pub fn accumulator(&self) -> &StreamAccumulator {
        &self.accumulator
    }

    pub fn complete(&self, termination: Termination, surface: Option<StreamSurface>) -> bool {
        self.accumulator.complete(termination, surface)
    }

    /// Records one chunk. Decoder panics contribute nothing and are logged.
    pub fn observe(&self, chunk: &C, surface: StreamSurface) {
        if self.accumulator.is_complete() {
            return;
        }
        match catch_unwind(AssertUnwindSafe(|| self.decoder.decode(chunk))) {
            Ok(decoded) => self.apply(decoded, surface),
            Err(_) => tracing::warn!(?surface, "stream chunk could not be decoded"),
        }
    }

    fn observe_final(&self, result: &C) {
        let decoded = match catch_unwind(AssertUnwindSafe(|| self.decoder.decode_final(result))) {
            Ok(decoded) => decoded,
            Err(_) => {
                tracing::warn!("final stream result could not be decoded");
                DecodedChunk::default()
            }
        };
        let DecodedChunk {
            text,
            metadata,
            error,
            ..
        } = decoded;
        if let Some(text) = text.filter(|text| !text.is_empty()) {
            self.accumulator.replace_text(text);
        }
        self.apply(
            DecodedChunk {
                text: None,
                metadata,
                terminal: true,
                error,
            },
            StreamSurface::FinalFuture,
        );
    }

    fn apply(&self, decoded: DecodedChunk, surface: StreamSurface) {
        if let Some(text) = decoded.text {
            self.accumulator.push_text(&text);
        }
        self.accumulator.merge_metadata(decoded.metadata);
        if let Some(error) = decoded.error {
            self.accumulator
                .complete(Termination::Failed(error), Some(surface));
        } else if decoded.terminal {
            self.accumulator
                .complete(Termination::Completed, Some(surface));
        }
    }
}

impl<C: 'static> StreamTap<C> {
    /// Wraps a pull-based stream. Items pass through unchanged.
    pub fn pull<S, E>(&self, inner: S) -> MonitoredStream<C, E>
    where
        S: Stream<Item = Result<C, E>> + Send + 'static,
    {
        MonitoredStream {
            inner: Some(inner.boxed()),
            tap: self.clone(),
        }
    }

    /// Wraps a future resolving to the aggregate result. Its resolution is a
    /// terminal record; an error resolves the stream as failed.
    pub fn final_future<F, E>(&self, future: F) -> BoxFuture<'static, Result<C, E>>
    where
        F: Future<Output = Result<C, E>> + Send + 'static,
        C: Send,
        E: Display + Send + 'static,
    {
        let tap = self.clone();
        Box::pin(async move {
            let result = future.await;
            match &result {
                Ok(value) => tap.observe_final(value),
                Err(err) => {
                    tap.complete(
                        Termination::Failed(err.to_string()),
                        Some(StreamSurface::FinalFuture),
                    );
                }
            }
            result
        })
    }

    /// A callback to subscribe on a push-based event source.
    pub fn listener(&self) -> impl Fn(&C) + Send + Sync + 'static {
        let tap = self.clone();
        move |event: &C| tap.observe(event, StreamSurface::EventSource)
    }
}

impl<C> Clone for StreamTap<C> {
    fn clone(&self) -> Self {
        Self {
            decoder: Arc::clone(&self.decoder),
            accumulator: Arc::clone(&self.accumulator),
            lifeline: Arc::clone(&self.lifeline),
        }
    }
}

impl<C> fmt::Debug for StreamTap<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTap")
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

/// A pull stream that is item-for-item identical to the one it wraps.
pub struct MonitoredStream<C, E> {
    inner: Option<BoxStream<'static, Result<C, E>>>,
    tap: StreamTap<C>,
}

impl<C, E> MonitoredStream<C, E> {
    pub fn accumulated_text(&self) -> String {
        self.tap.accumulator.text()
    }

    pub fn accumulated_metadata(&self) -> PartialMetadata {
        self.tap.accumulator.metadata()
    }

    pub fn is_complete(&self) -> bool {
        self.tap.accumulator.is_complete()
    }

    pub fn tap(&self) -> &StreamTap<C> {
        &self.tap
    }
}

impl<C, E: Display> MonitoredStream<C, E> {
    /// Drains what is left and returns the full text. Completes the stream
    /// if draining did not already.
    pub async fn final_text(mut self) -> Result<String, E> {
        while let Some(item) = self.next().await {
            item?;
        }
        self.tap.complete(Termination::Completed, Some(StreamSurface::PullIterator));
        Ok(self.accumulated_text())
    }
}

impl<C, E: Display> Stream for MonitoredStream<C, E> {
    type Item = Result<C, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                this.tap.observe(&chunk, StreamSurface::PullIterator);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.tap.complete(
                    Termination::Failed(err.to_string()),
                    Some(StreamSurface::PullIterator),
                );
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                this.tap
                    .complete(Termination::Completed, Some(StreamSurface::PullIterator));
                Poll::Ready(None)
            }
        }
    }
}

impl<C, E> fmt::Debug for MonitoredStream<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoredStream")
            .field("exhausted", &self.inner.is_none())
            .field("tap", &self.tap)
            .finish()
    }
}
