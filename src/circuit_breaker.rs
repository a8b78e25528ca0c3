//! Circuit-breaker policy: a per-service state machine that stops calling a
//! failing unit until a cooldown elapses.
//!
//! Breaker state is shared process-wide, keyed by `service_id` (see
//! [`crate::registry`]): every policy value naming the same service observes
//! and mutates the same breaker. State lives in lock-free atomics; the
//! registry mutex is held only while looking the breaker up.

use crate::error::{error_in, PolicyError, ServiceError};
use crate::metrics::{CircuitBreakerMetric, MetricSet, PolicyMetric, Status};
use crate::policy::{Binding, Hook, OutcomeHook};
use crate::registry;
use crate::time_source::{ProcessClock, TimeSource};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Smallest accepted `reset_timeout`.
pub const MIN_RESET_TIMEOUT: Duration = Duration::from_millis(5);

/// Default cooldown before an open breaker probes recovery.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(1);

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Observable breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Pass-through; failures are being counted.
    Closed,
    /// Short-circuit; the unit is not executed.
    Open,
    /// Trial pass-through after the cooldown.
    HalfOpen,
}

/// Mutable breaker state shared by every policy naming one service id.
///
/// The last-error timestamp is a [`TimeSource`] reading stored as saturated
/// microseconds, so it fits an atomic and stays comparable with readings
/// taken later by other policy values.
pub(crate) struct SharedBreaker {
    state: AtomicU8,
    error_count: AtomicU32,
    last_error_micros: AtomicU64,
    time: Arc<dyn TimeSource>,
}

fn to_micros(reading: Duration) -> u64 {
    u64::try_from(reading.as_micros()).unwrap_or(u64::MAX)
}

impl SharedBreaker {
    pub(crate) fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            error_count: AtomicU32::new(0),
            last_error_micros: AtomicU64::new(0),
            time,
        }
    }

    pub(crate) fn snapshot(&self) -> (CircuitState, u32) {
        let state = match self.state.load(Ordering::Acquire) {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        };
        (state, self.error_count.load(Ordering::Acquire))
    }

    /// Open → HalfOpen once the cooldown since the last error has elapsed.
    /// Returns whether this call performed the transition.
    fn try_half_open(&self, reset_timeout: Duration) -> bool {
        if self.state.load(Ordering::Acquire) != STATE_OPEN {
            return false;
        }
        let last_error = Duration::from_micros(self.last_error_micros.load(Ordering::Acquire));
        if self.time.monotonic().saturating_sub(last_error) < reset_timeout {
            return false;
        }
        self.state
            .compare_exchange(STATE_OPEN, STATE_HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record a unit failure. Opens the breaker on an unhandled error, on
    /// reaching the threshold, or on any failure during a half-open trial;
    /// returns whether this call opened it.
    fn record_failure(&self, handled: bool, threshold: u32) -> bool {
        let was = self.state.load(Ordering::Acquire);
        let count = self.error_count.fetch_add(1, Ordering::AcqRel) + 1;
        if handled && count < threshold && was != STATE_HALF_OPEN {
            return false;
        }
        let previous = self.state.swap(STATE_OPEN, Ordering::AcqRel);
        self.last_error_micros.store(to_micros(self.time.monotonic()), Ordering::Release);
        previous != STATE_OPEN
    }

    /// Record a unit success: the count restarts, and a half-open trial
    /// closes the breaker. Returns whether this call closed it.
    fn record_success(&self) -> bool {
        let closed = self
            .state
            .compare_exchange(STATE_HALF_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.error_count.store(0, Ordering::Release);
        closed
    }
}

impl std::fmt::Debug for SharedBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (state, error_count) = self.snapshot();
        f.debug_struct("SharedBreaker")
            .field("state", &state)
            .field("error_count", &error_count)
            .finish()
    }
}

/// Gates execution of its unit through the shared breaker for its service.
///
/// `run` returns [`PolicyError::CircuitOpen`] when it short-circuits; every
/// other unit outcome, including a failure, resolves to `Ok`, with the
/// failure reflected in the metric and in the breaker's state.
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    pub service_id: String,
    /// Consecutive handled errors tolerated before the breaker opens.
    pub threshold_errors: u32,
    /// Cooldown before an open breaker lets a trial call through.
    pub reset_timeout: Duration,
    /// Errors that count toward the threshold instead of opening outright.
    pub handled_errors: Vec<ServiceError>,
    pub before: Option<Hook>,
    /// Fired after the unit executes (not on short-circuit).
    pub after: Option<OutcomeHook>,
    pub on_open: Option<Hook>,
    pub on_half_open: Option<Hook>,
    pub on_closed: Option<Hook>,
    /// Captured into the shared breaker when it is first created for this
    /// service id; an existing breaker keeps its original source.
    pub time_source: Arc<dyn TimeSource>,
    pub(crate) binding: Option<Binding>,
}

impl CircuitBreakerPolicy {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            threshold_errors: 1,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            handled_errors: Vec::new(),
            before: None,
            after: None,
            on_open: None,
            on_half_open: None,
            on_closed: None,
            time_source: Arc::new(ProcessClock),
            binding: None,
        }
    }

    fn validate_config(&self) -> Result<(), PolicyError> {
        if self.threshold_errors < 1 {
            return Err(PolicyError::InvalidThreshold);
        }
        if self.reset_timeout < MIN_RESET_TIMEOUT {
            return Err(PolicyError::InvalidResetTimeout);
        }
        Ok(())
    }

    /// Current state of this service's breaker, after applying the same
    /// open→half-open rule `run` uses. Creates the breaker if this service
    /// id has never been seen.
    pub fn state(&self) -> Result<CircuitState, PolicyError> {
        self.validate_config()?;
        let breaker = registry::breaker_for(&self.service_id, &self.time_source);
        self.probe_half_open(&breaker);
        Ok(breaker.snapshot().0)
    }

    fn probe_half_open(&self, breaker: &SharedBreaker) {
        if breaker.try_half_open(self.reset_timeout) {
            tracing::info!(service_id = %self.service_id, "circuit breaker half-open");
            if let Some(hook) = &self.on_half_open {
                (hook)();
            }
        }
    }

    pub(crate) async fn run(&self, metrics: &mut MetricSet) -> Result<(), PolicyError> {
        self.validate_config()?;
        let binding = self.binding.as_ref().ok_or(PolicyError::CommandRequired)?;
        let breaker = registry::breaker_for(&self.service_id, &self.time_source);

        if let Some(hook) = &self.before {
            (hook)();
        }

        let started_at = Instant::now();
        self.probe_half_open(&breaker);

        let (state, error_count) = breaker.snapshot();
        if state == CircuitState::Open {
            metrics.insert(PolicyMetric::CircuitBreaker(CircuitBreakerMetric {
                service_id: self.service_id.clone(),
                status: Status::Failure,
                started_at,
                finished_at: Instant::now(),
                error: Some(Arc::new(PolicyError::CircuitOpen) as ServiceError),
                state,
                error_count,
            }));
            return Err(PolicyError::CircuitOpen);
        }

        let unit_result = binding.execute(metrics).await;

        let (status, error) = match &unit_result {
            Ok(()) => {
                if breaker.record_success() {
                    tracing::info!(service_id = %self.service_id, "circuit breaker closed");
                    if let Some(hook) = &self.on_closed {
                        (hook)();
                    }
                }
                (Status::Success, None)
            }
            Err(err) => {
                let handled = error_in(&self.handled_errors, err);
                if breaker.record_failure(handled, self.threshold_errors) {
                    let (_, count) = breaker.snapshot();
                    tracing::warn!(
                        service_id = %self.service_id,
                        error_count = count,
                        handled,
                        "circuit breaker opened"
                    );
                    if let Some(hook) = &self.on_open {
                        (hook)();
                    }
                }
                (Status::Failure, Some(err.clone()))
            }
        };

        let (state, error_count) = breaker.snapshot();
        if let Some(hook) = &self.after {
            (hook)(unit_result.as_ref().err());
        }

        metrics.insert(PolicyMetric::CircuitBreaker(CircuitBreakerMetric {
            service_id: self.service_id.clone(),
            status,
            started_at,
            finished_at: Instant::now(),
            error,
            state,
            error_count,
        }));

        Ok(())
    }
}

impl std::fmt::Debug for CircuitBreakerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerPolicy")
            .field("service_id", &self.service_id)
            .field("threshold_errors", &self.threshold_errors)
            .field("reset_timeout", &self.reset_timeout)
            .field("handled_errors", &self.handled_errors.len())
            .field("bound", &self.binding.is_some())
            .finish()
    }
}
