//! Decorator composer: canonical-order pipelines from per-kind policies.
//!
//! However the `with_*` calls are ordered, execution always layers
//! fallback → circuit breaker → retry → timeout → command. Retries happen
//! inside the breaker's failure counting, the breaker sees only the retry
//! outcome, and the fallback catches whatever bubbles up.

use crate::chain::{chain, ExecutionError};
use crate::circuit_breaker::CircuitBreakerPolicy;
use crate::command::Command;
use crate::error::PolicyError;
use crate::fallback::FallbackPolicy;
use crate::metrics::MetricSet;
use crate::policy::Policy;
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutPolicy;

/// A command plus up to one policy of each kind.
///
/// The policies are taken unbound; binding happens at `execute`, which is
/// why a decorator slot cannot carry a nested pipeline of its own.
#[derive(Debug, Clone)]
pub struct Decorator {
    command: Command,
    timeout: Option<TimeoutPolicy>,
    retry: Option<RetryPolicy>,
    circuit_breaker: Option<CircuitBreakerPolicy>,
    fallback: Option<FallbackPolicy>,
}

/// Start decorating `command` with policies.
pub fn decorate(command: Command) -> Decorator {
    Decorator {
        command,
        timeout: None,
        retry: None,
        circuit_breaker: None,
        fallback: None,
    }
}

impl Decorator {
    pub fn with_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = Some(policy);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.circuit_breaker = Some(policy);
        self
    }

    pub fn with_fallback(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = Some(policy);
        self
    }

    /// Assemble the canonical pipeline and run it.
    pub async fn execute(self) -> Result<MetricSet, ExecutionError> {
        let Decorator { command, timeout, retry, circuit_breaker, fallback } = self;

        let mut ordered: Vec<Policy> = Vec::with_capacity(4);
        if let Some(policy) = fallback {
            ordered.push(policy.into());
        }
        if let Some(policy) = circuit_breaker {
            ordered.push(policy.into());
        }
        if let Some(policy) = retry {
            ordered.push(policy.into());
        }
        if let Some(policy) = timeout {
            ordered.push(policy.into());
        }

        if ordered.is_empty() {
            return Err(ExecutionError::bare(PolicyError::PolicyRequired));
        }

        chain(ordered).execute(command).await
    }
}
