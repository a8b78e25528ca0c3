//! Retry policy: bounded re-execution with a fixed inter-attempt delay.
//!
//! Error classification follows sentinel identity (see [`crate::error`]):
//! only errors matching the `handled_errors` list are worth another attempt.
//! An empty list means every failure is unexpected, so the first one ends
//! the loop with [`PolicyError::Unhandled`].

use crate::error::{error_in, PolicyError, ServiceError};
use crate::metrics::{AttemptMetric, MetricSet, PolicyMetric, RetryMetric, Status};
use crate::policy::{Binding, TryHook, TryOutcomeHook};
use crate::waiter::{TimerWaiter, Waiter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Re-executes its unit up to `tries` times, pausing `delay` between
/// attempts, stopping at the first success or the first unhandled error.
#[derive(Clone)]
pub struct RetryPolicy {
    pub service_id: String,
    /// Maximum number of attempts; must be at least 1.
    pub tries: u32,
    /// Pause between attempts. No pause follows the final attempt.
    pub delay: Duration,
    /// Errors worth retrying. Empty means none are.
    pub handled_errors: Vec<ServiceError>,
    /// Fired before each attempt with its 1-indexed number.
    pub before_try: Option<TryHook>,
    /// Fired after each attempt with its number and outcome.
    pub after_try: Option<TryOutcomeHook>,
    /// Waits out `delay` between attempts; swap for a
    /// [`StubWaiter`](crate::waiter::StubWaiter) in tests.
    pub waiter: Arc<dyn Waiter>,
    pub(crate) binding: Option<Binding>,
}

impl RetryPolicy {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            tries: 1,
            delay: Duration::ZERO,
            handled_errors: Vec::new(),
            before_try: None,
            after_try: None,
            waiter: Arc::new(TimerWaiter),
            binding: None,
        }
    }

    pub(crate) async fn run(&self, metrics: &mut MetricSet) -> Result<(), PolicyError> {
        if self.tries < 1 {
            return Err(PolicyError::InvalidTries);
        }
        let binding = self.binding.as_ref().ok_or(PolicyError::CommandRequired)?;

        let started_at = Instant::now();
        let mut attempts = Vec::with_capacity(self.tries as usize);
        let mut outcome: Result<(), PolicyError> = Err(PolicyError::MaxTriesExceeded);

        for turn in 1..=self.tries {
            if let Some(hook) = &self.before_try {
                (hook)(turn);
            }

            let attempt_started = Instant::now();
            let error = binding.execute(metrics).await.err();
            let attempt_finished = Instant::now();

            attempts.push(AttemptMetric {
                iteration: turn,
                started_at: attempt_started,
                finished_at: attempt_finished,
                duration: attempt_finished.saturating_duration_since(attempt_started),
                error: error.clone(),
            });

            if let Some(hook) = &self.after_try {
                (hook)(turn, error.as_ref());
            }

            match error {
                None => {
                    outcome = Ok(());
                    break;
                }
                Some(err) => {
                    if !error_in(&self.handled_errors, &err) {
                        outcome = Err(PolicyError::Unhandled);
                        break;
                    }
                    if turn < self.tries {
                        self.waiter.wait(self.delay).await;
                    }
                }
            }
        }

        let finished_at = Instant::now();
        let (status, error) = match &outcome {
            Ok(()) => (Status::Success, None),
            Err(kind) => (Status::Failure, Some(Arc::new(*kind) as ServiceError)),
        };
        let tries = attempts.len() as u32;
        metrics.insert(PolicyMetric::Retry(RetryMetric {
            service_id: self.service_id.clone(),
            status,
            started_at,
            finished_at,
            error,
            tries,
            attempts,
        }));

        outcome
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("service_id", &self.service_id)
            .field("tries", &self.tries)
            .field("delay", &self.delay)
            .field("handled_errors", &self.handled_errors.len())
            .field("bound", &self.binding.is_some())
            .finish()
    }
}
