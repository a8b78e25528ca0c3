#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Palisade
//!
//! Composable fault-tolerance policies for async operations: **retry**,
//! **timeout**, **circuit breaker**, and **fallback**, with a structured
//! metric for every layer of every invocation.
//!
//! ## How it fits together
//!
//! - A [`Command`] wraps the operation you want to protect.
//! - Each policy either runs a command directly or wraps another policy, so
//!   pipelines nest to arbitrary depth.
//! - [`chain`] composes policies in the order you give; [`decorate`] builds
//!   the canonical order (fallback → circuit breaker → retry → timeout).
//! - Executing a pipeline yields a [`MetricSet`] describing what every
//!   layer observed: timings, per-attempt errors, breaker state.
//!
//! Circuit-breaker state is shared process-wide per service id, so every
//! pipeline guarding `"billing"` trips and recovers together. See
//! [`registry::reset`] for the test hook.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use palisade::{chain, Command, RetryPolicy, ServiceError};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("connection refused")]
//! struct ConnectionRefused;
//!
//! #[tokio::main]
//! async fn main() {
//!     let refused: ServiceError = Arc::new(ConnectionRefused);
//!
//!     let mut retry = RetryPolicy::new("billing");
//!     retry.tries = 3;
//!     retry.delay = Duration::from_millis(50);
//!     retry.handled_errors = vec![refused.clone()];
//!
//!     let attempts = Arc::new(AtomicUsize::new(0));
//!     let counter = attempts.clone();
//!     let command = Command::new(move || {
//!         let counter = counter.clone();
//!         let refused = refused.clone();
//!         async move {
//!             if counter.fetch_add(1, Ordering::SeqCst) < 2 {
//!                 Err(refused)
//!             } else {
//!                 Ok(())
//!             }
//!         }
//!     });
//!
//!     let metrics = chain(vec![retry.into()]).execute(command).await.unwrap();
//!     assert_eq!(metrics.retry().unwrap().tries, 3);
//! }
//! ```
//!
//! ## Error classification
//!
//! Policies decide whether a failure is "handled" by sentinel identity: an
//! error matches a `handled_errors` entry when it is the same shared
//! [`ServiceError`], the same engine [`PolicyError`] kind, or caused by
//! either along its `source()` chain. An empty list handles nothing.

pub mod chain;
pub mod circuit_breaker;
pub mod command;
pub mod decorator;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod registry;
pub mod retry;
pub mod time_source;
pub mod timeout;
pub mod waiter;

// Re-exports
pub use chain::{chain, Chain, ExecutionError};
pub use circuit_breaker::{CircuitBreakerPolicy, CircuitState, MIN_RESET_TIMEOUT};
pub use command::Command;
pub use decorator::{decorate, Decorator};
pub use error::{error_in, error_is, PolicyError, ServiceError};
pub use fallback::{FallbackHandler, FallbackPolicy};
pub use metrics::{
    AttemptMetric, CircuitBreakerMetric, FallbackMetric, MetricRecorder, MetricSet, PolicyKind,
    PolicyMetric, RetryMetric, Status, TimeoutMetric,
};
pub use policy::{Binding, Hook, OutcomeHook, Policy, TryHook, TryOutcomeHook};
pub use retry::RetryPolicy;
/// Timing seams: breaker cooldowns read a `TimeSource`, retry pauses go
/// through a `Waiter`; both have deterministic test doubles.
pub use time_source::{ProcessClock, TimeSource};
pub use timeout::TimeoutPolicy;
pub use waiter::{StubWaiter, TimerWaiter, Waiter};
