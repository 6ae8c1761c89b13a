use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use olakai_core::PartialMetadata;

/// Receives the single completion of a stream.
pub type CompletionSink = Box<dyn FnOnce(StreamCompletion) + Send>;

/// How the consumer finished with the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// A terminal record was seen or the stream ran dry.
    Completed,
    /// Every handle was dropped before the stream finished.
    EarlyExit,
    Failed(String),
}

/// The provider-facing shape through which a completion was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamSurface {
    PullIterator,
    FinalFuture,
    EventSource,
}

#[derive(Clone, Debug)]
pub struct StreamCompletion {
    pub text: String,
    pub metadata: PartialMetadata,
    pub termination: Termination,
    /// `None` when completion came from the last handle being dropped.
    pub surface: Option<StreamSurface>,
}

#[derive(Default)]
struct Collected {
    text: String,
    metadata: PartialMetadata,
}

/// Per-call accumulation state. Text and metadata keep arriving until the
/// first completion; `completion_fired` flips exactly once and the sink runs
/// on that transition only.
pub struct StreamAccumulator {
    collected: Mutex<Collected>,
    completion_fired: AtomicBool,
    sink: Mutex<Option<CompletionSink>>,
}

impl StreamAccumulator {
    pub fn new(sink: CompletionSink) -> Self {
        Self {
            collected: Mutex::new(Collected::default()),
            completion_fired: AtomicBool::new(false),
            sink: Mutex::new(Some(sink)),
        }
    }

    pub fn push_text(&self, delta: &str) {
        if delta.is_empty() || self.is_complete() {
            return;
        }
        self.collected().text.push_str(delta);
    }

    /// Swaps in an authoritative aggregate, e.g. a provider's final result.
    pub fn replace_text(&self, text: String) {
        if self.is_complete() {
            return;
        }
        self.collected().text = text;
    }

    pub fn merge_metadata(&self, metadata: PartialMetadata) {
        if metadata.is_empty() || self.is_complete() {
            return;
        }
        self.collected().metadata.merge(metadata);
    }

    pub fn text(&self) -> String {
        self.collected().text.clone()
    }

    pub fn metadata(&self) -> PartialMetadata {
        self.collected().metadata.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.completion_fired.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that actually fired the completion.
    pub fn complete(&self, termination: Termination, surface: Option<StreamSurface>) -> bool {
        if self
            .completion_fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let completion = {
            let collected = self.collected();
            StreamCompletion {
                text: collected.text.clone(),
                metadata: collected.metadata.clone(),
                termination,
                surface,
            }
        };
        tracing::debug!(
            termination = ?completion.termination,
            surface = ?completion.surface,
            chars = completion.text.len(),
            "stream completed"
        );

        let sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sink) = sink {
            if catch_unwind(AssertUnwindSafe(|| sink(completion))).is_err() {
                tracing::warn!("stream completion handler panicked");
            }
        }
        true
    }

    fn collected(&self) -> MutexGuard<'_, Collected> {
        self.collected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for StreamAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAccumulator")
            .field("text", &self.text())
            .field("completion_fired", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn recording() -> (StreamAccumulator, Arc<Mutex<Vec<StreamCompletion>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let accumulator = StreamAccumulator::new(Box::new(move |completion: StreamCompletion| {
            sink_seen.lock().unwrap().push(completion);
        }));
        (accumulator, seen)
    }

    #[test]
    fn fires_once_with_text_so_far() {
        let (accumulator, seen) = recording();
        accumulator.push_text("a");
        accumulator.push_text("b");
        assert!(accumulator.complete(Termination::EarlyExit, None));
        assert!(!accumulator.complete(Termination::Completed, Some(StreamSurface::PullIterator)));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].text, "ab");
        assert_eq!(seen[0].termination, Termination::EarlyExit);
    }

    #[test]
    fn ignores_text_after_completion() {
        let (accumulator, _seen) = recording();
        accumulator.push_text("x");
        accumulator.complete(Termination::Completed, None);
        accumulator.push_text("y");
        accumulator.replace_text("z".into());
        assert_eq!(accumulator.text(), "x");
    }

    #[test]
    fn panicking_sink_still_marks_complete() {
        let accumulator = StreamAccumulator::new(Box::new(|_: StreamCompletion| panic!("boom")));
        assert!(accumulator.complete(Termination::Completed, None));
        assert!(accumulator.is_complete());
    }
}
