//! Error kinds signalled by the engine, and the classification rules that
//! decide whether a unit's failure counts as "handled" for a policy.
//!
//! Two error currencies flow through a pipeline:
//!
//! - [`ServiceError`] is the type-erased error a command (or an inner layer)
//!   produced. It is recorded into metrics and matched against a policy's
//!   `handled_errors` list.
//! - [`PolicyError`] is what `run` itself returns: composition and
//!   configuration rejections, plus the runtime failures a layer raises on
//!   its own behalf (`CircuitOpen`, `TimedOut`, `MaxTriesExceeded`,
//!   `Unhandled`).
//!
//! `PolicyError` variants carry no payload so they can double as sentinels
//! inside `handled_errors` lists and be compared by value; the detail a
//! payload would hold (elapsed time, counts, observed state) lives in the
//! metrics instead.

use std::error::Error;
use std::sync::Arc;

/// Type-erased domain error produced by a command.
///
/// Sharing the same `Arc` is what makes two errors "the same" for
/// classification, mirroring sentinel-error identity.
pub type ServiceError = Arc<dyn Error + Send + Sync + 'static>;

/// Failures signalled by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// A composer was given no policies at all.
    #[error("at least one policy is required")]
    PolicyRequired,
    /// A policy ran without a command or a wrapped policy bound.
    #[error("policy requires a command or a wrapped policy")]
    CommandRequired,
    /// Circuit breaker configured with a zero error threshold.
    #[error("threshold must be at least one error")]
    InvalidThreshold,
    /// Circuit breaker configured with a reset timeout below the floor.
    #[error("reset timeout must be at least 5ms")]
    InvalidResetTimeout,
    /// Retry configured with zero tries.
    #[error("tries must be at least 1")]
    InvalidTries,
    /// Fallback has no handler to delegate to.
    #[error("no fallback handler set")]
    NoFallbackHandler,
    /// The breaker short-circuited; the unit was not executed.
    #[error("circuit is open")]
    CircuitOpen,
    /// The timer fired before the unit completed.
    #[error("execution timed out")]
    TimedOut,
    /// Every retry attempt was consumed without a success.
    #[error("max tries exceeded")]
    MaxTriesExceeded,
    /// The unit failed with an error outside the policy's handled set.
    #[error("unhandled error")]
    Unhandled,
}

impl PolicyError {
    /// Wrap this kind as a [`ServiceError`], e.g. for a `handled_errors`
    /// entry that should match a failure raised by an inner layer.
    pub fn into_service_error(self) -> ServiceError {
        Arc::new(self)
    }
}

/// Whether `err` matches `target`: same `Arc`, the same engine kind, or
/// caused by either of those anywhere along its `source()` chain.
pub fn error_is(err: &ServiceError, target: &ServiceError) -> bool {
    if Arc::ptr_eq(err, target) {
        return true;
    }
    let target_ptr = Arc::as_ptr(target) as *const ();
    let target_kind = target.downcast_ref::<PolicyError>();
    if let (Some(kind), Some(target_kind)) = (err.downcast_ref::<PolicyError>(), target_kind) {
        if kind == target_kind {
            return true;
        }
    }
    let mut cause = err.source();
    while let Some(current) = cause {
        if std::ptr::eq(current as *const dyn Error as *const (), target_ptr) {
            return true;
        }
        if let (Some(kind), Some(target_kind)) = (current.downcast_ref::<PolicyError>(), target_kind)
        {
            if kind == target_kind {
                return true;
            }
        }
        cause = current.source();
    }
    false
}

/// Whether `err` matches any entry of `handled`.
///
/// An empty list handles nothing.
pub fn error_in(handled: &[ServiceError], err: &ServiceError) -> bool {
    handled.iter().any(|candidate| error_is(err, candidate))
}
