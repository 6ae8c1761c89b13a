use std::time::Duration;

use thiserror::Error;

use olakai_core::ExecutionBlocked;

/// Error returned by a monitored call. The wrapped callable's own error is
/// carried untouched in `Callable`.
#[derive(Debug, Error)]
pub enum MonitorError<E> {
    #[error(transparent)]
    Blocked(#[from] ExecutionBlocked),
    #[error("{0}")]
    Callable(E),
}

impl<E> MonitorError<E> {
    pub fn is_blocked(&self) -> bool {
        matches!(self, MonitorError::Blocked(_))
    }

    pub fn blocked(&self) -> Option<&ExecutionBlocked> {
        match self {
            MonitorError::Blocked(blocked) => Some(blocked),
            MonitorError::Callable(_) => None,
        }
    }

    pub fn into_callable(self) -> Option<E> {
        match self {
            MonitorError::Callable(err) => Some(err),
            MonitorError::Blocked(_) => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrainError {
    #[error("timed out after {waited:?} with {pending} reports in flight")]
    Timeout { waited: Duration, pending: usize },
}
