//! Convenient re-exports for common palisade types.

pub use crate::{
    chain, decorate,
    chain::{Chain, ExecutionError},
    circuit_breaker::{CircuitBreakerPolicy, CircuitState},
    command::Command,
    decorator::Decorator,
    error::{error_in, error_is, PolicyError, ServiceError},
    fallback::{FallbackHandler, FallbackPolicy},
    metrics::{MetricRecorder, MetricSet, PolicyKind, PolicyMetric, Status},
    policy::{Binding, Policy},
    retry::RetryPolicy,
    time_source::{ProcessClock, TimeSource},
    timeout::TimeoutPolicy,
    waiter::{StubWaiter, TimerWaiter, Waiter},
};
