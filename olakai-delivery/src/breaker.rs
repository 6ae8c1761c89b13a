use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// How a send was let through the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    /// The single trial request allowed while half-open.
    Trial,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Consecutive-failure breaker for one endpoint. Every transition happens
/// under one lock, so only one caller can claim the half-open trial.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

/// Outcome slot for one admitted send.
///
/// Settle it with [`Permit::succeed`] or [`Permit::fail`]. A trial permit
/// dropped unsettled (the send future was cancelled) re-opens the breaker,
/// so the next caller past the cooldown can claim a fresh trial.
#[must_use = "an unsettled trial permit re-opens the breaker when dropped"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Permit<'_> {
    pub fn admission(&self) -> Admission {
        self.admission
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.admission == Admission::Trial {
            self.breaker.abandon_trial();
        }
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// `None` means fail fast.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let admission = {
            let mut inner = self.lock();
            match inner.state {
                BreakerState::Closed => Admission::Normal,
                BreakerState::Open => {
                    let cooled = inner
                        .opened_at
                        .map(|opened| opened.elapsed() >= self.cooldown)
                        .unwrap_or(true);
                    if !cooled {
                        return None;
                    }
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!("delivery circuit breaker half-open, sending trial request");
                    Admission::Trial
                }
                BreakerState::HalfOpen => {
                    if inner.trial_in_flight {
                        return None;
                    }
                    inner.trial_in_flight = true;
                    Admission::Trial
                }
            }
        };
        Some(Permit {
            breaker: self,
            admission,
            settled: false,
        })
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!("delivery circuit breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
                tracing::warn!("delivery circuit breaker re-opened after failed trial");
            }
            BreakerState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    "delivery circuit breaker opened"
                );
            }
            _ => {}
        }
    }

    /// Releases a trial claim whose outcome will never arrive.
    fn abandon_trial(&self) {
        let mut inner = self.lock();
        if inner.state == BreakerState::HalfOpen && inner.trial_in_flight {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            tracing::debug!("trial request abandoned, delivery circuit breaker re-opened");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
