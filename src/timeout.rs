//! Timeout policy: bound the unit's wall-clock execution time.

use crate::error::{PolicyError, ServiceError};
use crate::metrics::{MetricSet, PolicyMetric, Status, TimeoutMetric};
use crate::policy::{Binding, Hook, OutcomeHook};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Executes its unit and fails with [`PolicyError::TimedOut`] when the timer
/// fires first. On expiry the unit's future is dropped, cancelling it at its
/// next suspension point; its result is discarded and nested layers record
/// no metrics.
///
/// A unit error that arrives in time is not this layer's failure: it is
/// adopted into the metric's `error` field and `run` still returns `Ok`.
#[derive(Clone)]
pub struct TimeoutPolicy {
    pub service_id: String,
    /// Upper bound on the unit's execution. Zero expires unless the unit is
    /// ready on first poll.
    pub timeout: Duration,
    /// Fired before the unit starts.
    pub before: Option<Hook>,
    /// Fired once the race resolves, with the unit's error (`None` both on
    /// success and on expiry, since an expired unit never reported back).
    pub after: Option<OutcomeHook>,
    pub(crate) binding: Option<Binding>,
}

impl TimeoutPolicy {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            timeout: Duration::ZERO,
            before: None,
            after: None,
            binding: None,
        }
    }

    pub(crate) async fn run(&self, metrics: &mut MetricSet) -> Result<(), PolicyError> {
        let binding = self.binding.as_ref().ok_or(PolicyError::CommandRequired)?;

        if let Some(hook) = &self.before {
            (hook)();
        }

        let started_at = Instant::now();
        let raced = tokio::time::timeout(self.timeout, binding.execute(metrics)).await;
        let finished_at = Instant::now();

        match raced {
            Ok(unit_result) => {
                let error = unit_result.err();
                if let Some(hook) = &self.after {
                    (hook)(error.as_ref());
                }
                metrics.insert(PolicyMetric::Timeout(TimeoutMetric {
                    service_id: self.service_id.clone(),
                    status: Status::Success,
                    started_at,
                    finished_at,
                    error,
                }));
                Ok(())
            }
            Err(_) => {
                if let Some(hook) = &self.after {
                    (hook)(None);
                }
                metrics.insert(PolicyMetric::Timeout(TimeoutMetric {
                    service_id: self.service_id.clone(),
                    status: Status::Failure,
                    started_at,
                    finished_at,
                    error: Some(Arc::new(PolicyError::TimedOut) as ServiceError),
                }));
                Err(PolicyError::TimedOut)
            }
        }
    }
}

impl std::fmt::Debug for TimeoutPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutPolicy")
            .field("service_id", &self.service_id)
            .field("timeout", &self.timeout)
            .field("bound", &self.binding.is_some())
            .finish()
    }
}
