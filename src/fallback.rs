//! Fallback policy: delegate handled failures to a caller-supplied handler.

use crate::error::{error_in, PolicyError, ServiceError};
use crate::metrics::{FallbackMetric, MetricSet, PolicyMetric, Status};
use crate::policy::{Binding, Hook, OutcomeHook};
use std::sync::Arc;
use std::time::Instant;

/// Called with the unit's error when it matched `handled_errors`.
pub type FallbackHandler = Arc<dyn Fn(&ServiceError) + Send + Sync>;

/// Executes its unit and, when the unit fails with a handled error, invokes
/// the fallback handler and reports success. Unhandled failures surface as
/// [`PolicyError::Unhandled`].
#[derive(Clone)]
pub struct FallbackPolicy {
    pub service_id: String,
    /// Required; running without one fails with
    /// [`PolicyError::NoFallbackHandler`].
    pub handler: Option<FallbackHandler>,
    /// Errors the handler is prepared to absorb. Empty absorbs nothing.
    pub handled_errors: Vec<ServiceError>,
    pub before: Option<Hook>,
    /// Fired with the unit's outcome, before the handler runs.
    pub after: Option<OutcomeHook>,
    pub(crate) binding: Option<Binding>,
}

impl FallbackPolicy {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            handler: None,
            handled_errors: Vec::new(),
            before: None,
            after: None,
            binding: None,
        }
    }

    pub(crate) async fn run(&self, metrics: &mut MetricSet) -> Result<(), PolicyError> {
        let handler = self.handler.as_ref().ok_or(PolicyError::NoFallbackHandler)?;
        let binding = self.binding.as_ref().ok_or(PolicyError::CommandRequired)?;

        let started_at = Instant::now();
        if let Some(hook) = &self.before {
            (hook)();
        }

        let unit_result = binding.execute(metrics).await;

        if let Some(hook) = &self.after {
            (hook)(unit_result.as_ref().err());
        }
        let finished_at = Instant::now();

        let mut metric = FallbackMetric {
            service_id: self.service_id.clone(),
            status: Status::Success,
            started_at,
            finished_at,
            error: None,
        };

        match unit_result {
            Ok(()) => {
                metrics.insert(PolicyMetric::Fallback(metric));
                Ok(())
            }
            Err(err) if error_in(&self.handled_errors, &err) => {
                (handler)(&err);
                metrics.insert(PolicyMetric::Fallback(metric));
                Ok(())
            }
            Err(_) => {
                metric.status = Status::Failure;
                metric.error = Some(Arc::new(PolicyError::Unhandled) as ServiceError);
                metrics.insert(PolicyMetric::Fallback(metric));
                Err(PolicyError::Unhandled)
            }
        }
    }
}

impl std::fmt::Debug for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackPolicy")
            .field("service_id", &self.service_id)
            .field("has_handler", &self.handler.is_some())
            .field("handled_errors", &self.handled_errors.len())
            .field("bound", &self.binding.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricRecorder;
    use crate::policy::Policy;
    use crate::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    #[error("quota exhausted")]
    struct QuotaExhausted;

    fn bound(mut policy: FallbackPolicy, command: Command) -> Policy {
        policy.binding = Some(Binding::Command(command));
        Policy::Fallback(policy)
    }

    #[tokio::test]
    async fn missing_handler_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = bound(
            FallbackPolicy::new("svc"),
            Command::new(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let mut metrics = MetricSet::new();
        assert_eq!(policy.run(&mut metrics).await.unwrap_err(), PolicyError::NoFallbackHandler);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn success_skips_the_handler() {
        let handled = Arc::new(AtomicUsize::new(0));
        let handler_calls = handled.clone();
        let mut policy = FallbackPolicy::new("svc");
        policy.handler = Some(Arc::new(move |_| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
        }));
        let policy = bound(policy, Command::new(|| async { Ok(()) }));

        let mut metrics = MetricSet::new();
        assert!(policy.run(&mut metrics).await.is_ok());
        assert_eq!(handled.load(Ordering::SeqCst), 0);

        let metric = metrics.fallback().unwrap();
        assert!(metric.success());
        assert!(metric.error.is_none());
    }

    #[tokio::test]
    async fn handled_error_invokes_the_handler_and_succeeds() {
        let sentinel: ServiceError = Arc::new(QuotaExhausted);
        let observed = Arc::new(std::sync::Mutex::new(None));
        let handler_observed = observed.clone();
        let mut policy = FallbackPolicy::new("svc");
        policy.handled_errors = vec![sentinel.clone()];
        policy.handler = Some(Arc::new(move |err| {
            *handler_observed.lock().unwrap() = Some(err.clone());
        }));

        let cause = sentinel.clone();
        let policy = bound(
            policy,
            Command::new(move || {
                let cause = cause.clone();
                async move { Err(cause) }
            }),
        );

        let mut metrics = MetricSet::new();
        assert!(policy.run(&mut metrics).await.is_ok());

        let seen = observed.lock().unwrap().clone().expect("handler should run");
        assert!(Arc::ptr_eq(&seen, &sentinel));
        assert!(metrics.fallback().unwrap().success());
    }

    #[tokio::test]
    async fn unhandled_error_surfaces() {
        let handled = Arc::new(AtomicUsize::new(0));
        let handler_calls = handled.clone();
        let mut policy = FallbackPolicy::new("svc");
        policy.handler = Some(Arc::new(move |_| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
        }));

        let policy = bound(
            policy,
            Command::new(|| async { Err(Arc::new(QuotaExhausted) as ServiceError) }),
        );

        let mut metrics = MetricSet::new();
        assert_eq!(policy.run(&mut metrics).await.unwrap_err(), PolicyError::Unhandled);
        assert_eq!(handled.load(Ordering::SeqCst), 0);

        let metric = metrics.fallback().unwrap();
        assert!(!metric.success());
        assert_eq!(
            metric.error.as_ref().unwrap().downcast_ref::<PolicyError>(),
            Some(&PolicyError::Unhandled)
        );
    }

    #[tokio::test]
    async fn after_hook_sees_the_unit_error_before_the_handler() {
        let sentinel: ServiceError = Arc::new(QuotaExhausted);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut policy = FallbackPolicy::new("svc");
        policy.handled_errors = vec![sentinel.clone()];
        let after_log = order.clone();
        policy.after = Some(Arc::new(move |err| {
            assert!(err.is_some());
            after_log.lock().unwrap().push("after");
        }));
        let handler_log = order.clone();
        policy.handler = Some(Arc::new(move |_| handler_log.lock().unwrap().push("handler")));

        let cause = sentinel.clone();
        let policy = bound(
            policy,
            Command::new(move || {
                let cause = cause.clone();
                async move { Err(cause) }
            }),
        );

        let mut metrics = MetricSet::new();
        policy.run(&mut metrics).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["after", "handler"]);
    }
}
