//! The uniform policy contract: every variant can run a terminal command or
//! wrap another policy, so pipelines nest to arbitrary depth.

use crate::circuit_breaker::CircuitBreakerPolicy;
use crate::command::Command;
use crate::error::{PolicyError, ServiceError};
use crate::fallback::FallbackPolicy;
use crate::metrics::{MetricSet, PolicyKind};
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutPolicy;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Hook fired around a policy's execution.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Hook fired with the unit's outcome (`None` on success).
pub type OutcomeHook = Arc<dyn Fn(Option<&ServiceError>) + Send + Sync>;

/// Hook fired before a retry attempt, with the 1-indexed attempt number.
pub type TryHook = Arc<dyn Fn(u32) + Send + Sync>;

/// Hook fired after a retry attempt, with the attempt number and outcome.
pub type TryOutcomeHook = Arc<dyn Fn(u32, Option<&ServiceError>) + Send + Sync>;

/// What a policy executes: a terminal command or a wrapped inner policy.
///
/// Being a sum type, "both bound at once" cannot be expressed;
/// [`Policy::with_command`] and [`Policy::with_policy`] replace whatever was
/// bound before. An unbound policy fails at run time with
/// [`PolicyError::CommandRequired`].
#[derive(Debug, Clone)]
pub enum Binding {
    Command(Command),
    Inner(Box<Policy>),
}

impl Binding {
    /// Run the bound unit, forwarding the metric set to nested layers.
    ///
    /// Inner-policy failures come back type-erased so outer layers classify
    /// them with the same rules as command errors.
    pub(crate) async fn execute(&self, metrics: &mut MetricSet) -> Result<(), ServiceError> {
        match self {
            Binding::Command(command) => command.invoke().await,
            Binding::Inner(policy) => policy
                .run_nested(metrics)
                .await
                .map_err(|err| Arc::new(err) as ServiceError),
        }
    }
}

/// One resilience policy plus its bound unit.
#[derive(Debug, Clone)]
pub enum Policy {
    Timeout(TimeoutPolicy),
    Retry(RetryPolicy),
    CircuitBreaker(CircuitBreakerPolicy),
    Fallback(FallbackPolicy),
}

impl Policy {
    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::Timeout(_) => PolicyKind::Timeout,
            Policy::Retry(_) => PolicyKind::Retry,
            Policy::CircuitBreaker(_) => PolicyKind::CircuitBreaker,
            Policy::Fallback(_) => PolicyKind::Fallback,
        }
    }

    pub fn service_id(&self) -> &str {
        match self {
            Policy::Timeout(p) => &p.service_id,
            Policy::Retry(p) => &p.service_id,
            Policy::CircuitBreaker(p) => &p.service_id,
            Policy::Fallback(p) => &p.service_id,
        }
    }

    /// Rebind to a terminal command, clearing any wrapped policy.
    pub fn with_command(mut self, command: Command) -> Policy {
        *self.binding_mut() = Some(Binding::Command(command));
        self
    }

    /// Rebind to a wrapped inner policy, clearing any command.
    pub fn with_policy(mut self, inner: Policy) -> Policy {
        *self.binding_mut() = Some(Binding::Inner(Box::new(inner)));
        self
    }

    /// The currently bound unit, if any.
    pub fn binding(&self) -> Option<&Binding> {
        match self {
            Policy::Timeout(p) => p.binding.as_ref(),
            Policy::Retry(p) => p.binding.as_ref(),
            Policy::CircuitBreaker(p) => p.binding.as_ref(),
            Policy::Fallback(p) => p.binding.as_ref(),
        }
    }

    fn binding_mut(&mut self) -> &mut Option<Binding> {
        match self {
            Policy::Timeout(p) => &mut p.binding,
            Policy::Retry(p) => &mut p.binding,
            Policy::CircuitBreaker(p) => &mut p.binding,
            Policy::Fallback(p) => &mut p.binding,
        }
    }

    /// Execute this policy, recording its metric (and those of any nested
    /// layers) into `metrics`.
    ///
    /// Validation failures return without touching the set; runtime failures
    /// record the reporting layer's metric first and then propagate.
    pub async fn run(&self, metrics: &mut MetricSet) -> Result<(), PolicyError> {
        self.run_nested(metrics).await
    }

    // Boxed so the async call graph can recurse through nested policies.
    pub(crate) fn run_nested<'a>(
        &'a self,
        metrics: &'a mut MetricSet,
    ) -> BoxFuture<'a, Result<(), PolicyError>> {
        match self {
            Policy::Timeout(p) => Box::pin(p.run(metrics)),
            Policy::Retry(p) => Box::pin(p.run(metrics)),
            Policy::CircuitBreaker(p) => Box::pin(p.run(metrics)),
            Policy::Fallback(p) => Box::pin(p.run(metrics)),
        }
    }
}

impl From<TimeoutPolicy> for Policy {
    fn from(policy: TimeoutPolicy) -> Self {
        Policy::Timeout(policy)
    }
}

impl From<RetryPolicy> for Policy {
    fn from(policy: RetryPolicy) -> Self {
        Policy::Retry(policy)
    }
}

impl From<CircuitBreakerPolicy> for Policy {
    fn from(policy: CircuitBreakerPolicy) -> Self {
        Policy::CircuitBreaker(policy)
    }
}

impl From<FallbackPolicy> for Policy {
    fn from(policy: FallbackPolicy) -> Self {
        Policy::Fallback(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_command() -> Command {
        Command::new(|| async { Ok(()) })
    }

    #[test]
    fn with_command_replaces_a_wrapped_policy() {
        let inner: Policy = RetryPolicy::new("inner").into();
        let policy: Policy = TimeoutPolicy::new("outer").into();
        let policy = policy.with_policy(inner).with_command(noop_command());
        assert!(matches!(policy.binding(), Some(Binding::Command(_))));
    }

    #[test]
    fn with_policy_replaces_a_command() {
        let inner: Policy = RetryPolicy::new("inner").into();
        let policy: Policy = TimeoutPolicy::new("outer").into();
        let policy = policy.with_command(noop_command()).with_policy(inner);
        match policy.binding() {
            Some(Binding::Inner(wrapped)) => assert_eq!(wrapped.service_id(), "inner"),
            other => panic!("expected wrapped policy, got {other:?}"),
        }
    }

    #[test]
    fn fresh_policies_are_unbound() {
        let policy: Policy = FallbackPolicy::new("svc").into();
        assert!(policy.binding().is_none());
    }

    #[tokio::test]
    async fn running_unbound_policy_requires_a_command() {
        let policy: Policy = RetryPolicy::new("svc").into();
        let mut metrics = MetricSet::new();
        let err = policy.run(&mut metrics).await.unwrap_err();
        assert_eq!(err, PolicyError::CommandRequired);
        assert!(metrics.is_empty());
    }

    #[test]
    fn kinds_and_service_ids_delegate_to_variants() {
        let policy: Policy = CircuitBreakerPolicy::new("payments").into();
        assert_eq!(policy.kind(), PolicyKind::CircuitBreaker);
        assert_eq!(policy.service_id(), "payments");
    }
}
