//! Per-policy execution metrics and the aggregate set a pipeline fills in.
//!
//! Every layer of a pipeline records exactly one metric per invocation,
//! keyed by its [`PolicyKind`]. Running the same kind twice in one chain
//! overwrites the earlier entry; the type of [`MetricSet`] makes that
//! explicit rather than silent.

use crate::error::ServiceError;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The four policy variants, used as metric keys and stable tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Timeout,
    Retry,
    CircuitBreaker,
    Fallback,
}

impl PolicyKind {
    /// Stable string tag for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            PolicyKind::Timeout => "timeout",
            PolicyKind::Retry => "retry",
            PolicyKind::CircuitBreaker => "circuit_breaker",
            PolicyKind::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Outcome of one policy layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    /// Wire value: 0 for success, 1 for failure.
    pub fn code(&self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Failure => 1,
        }
    }
}

/// Common read surface shared by every metric and by the aggregate set.
pub trait MetricRecorder {
    fn service_id(&self) -> &str;
    fn policy_duration(&self) -> Duration;
    fn success(&self) -> bool;
}

macro_rules! recorder_over_span {
    ($metric:ty) => {
        impl MetricRecorder for $metric {
            fn service_id(&self) -> &str {
                &self.service_id
            }

            fn policy_duration(&self) -> Duration {
                self.finished_at.saturating_duration_since(self.started_at)
            }

            fn success(&self) -> bool {
                self.status.is_success()
            }
        }
    };
}

/// Metric recorded by a timeout layer.
///
/// `error` carries the unit's error when the unit completed in time; the
/// layer still reports success in that case. On expiry `status` is failure
/// and `error` is the timeout itself.
#[derive(Debug, Clone)]
pub struct TimeoutMetric {
    pub service_id: String,
    pub status: Status,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub error: Option<ServiceError>,
}

recorder_over_span!(TimeoutMetric);

/// One retry attempt.
#[derive(Debug, Clone)]
pub struct AttemptMetric {
    /// 1-indexed attempt number.
    pub iteration: u32,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub duration: Duration,
    pub error: Option<ServiceError>,
}

/// Metric recorded by a retry layer, including every attempt in order.
#[derive(Debug, Clone)]
pub struct RetryMetric {
    pub service_id: String,
    pub status: Status,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub error: Option<ServiceError>,
    /// Attempts actually made, which may be fewer than configured.
    pub tries: u32,
    pub attempts: Vec<AttemptMetric>,
}

recorder_over_span!(RetryMetric);

/// Metric recorded by a circuit-breaker layer.
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetric {
    pub service_id: String,
    pub status: Status,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub error: Option<ServiceError>,
    /// Breaker state observed at the end of the invocation.
    pub state: crate::circuit_breaker::CircuitState,
    pub error_count: u32,
}

recorder_over_span!(CircuitBreakerMetric);

/// Metric recorded by a fallback layer.
#[derive(Debug, Clone)]
pub struct FallbackMetric {
    pub service_id: String,
    pub status: Status,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub error: Option<ServiceError>,
}

recorder_over_span!(FallbackMetric);

/// A metric from any policy layer.
#[derive(Debug, Clone)]
pub enum PolicyMetric {
    Timeout(TimeoutMetric),
    Retry(RetryMetric),
    CircuitBreaker(CircuitBreakerMetric),
    Fallback(FallbackMetric),
}

impl PolicyMetric {
    pub fn kind(&self) -> PolicyKind {
        match self {
            PolicyMetric::Timeout(_) => PolicyKind::Timeout,
            PolicyMetric::Retry(_) => PolicyKind::Retry,
            PolicyMetric::CircuitBreaker(_) => PolicyKind::CircuitBreaker,
            PolicyMetric::Fallback(_) => PolicyKind::Fallback,
        }
    }

    fn recorder(&self) -> &dyn MetricRecorder {
        match self {
            PolicyMetric::Timeout(m) => m,
            PolicyMetric::Retry(m) => m,
            PolicyMetric::CircuitBreaker(m) => m,
            PolicyMetric::Fallback(m) => m,
        }
    }
}

impl MetricRecorder for PolicyMetric {
    fn service_id(&self) -> &str {
        self.recorder().service_id()
    }

    fn policy_duration(&self) -> Duration {
        self.recorder().policy_duration()
    }

    fn success(&self) -> bool {
        self.recorder().success()
    }
}

/// Metrics collected across one top-level invocation, one entry per policy
/// kind present in the pipeline.
#[derive(Debug, Clone, Default)]
pub struct MetricSet {
    entries: HashMap<PolicyKind, PolicyMetric>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a layer's metric, replacing any earlier entry of the same
    /// kind.
    pub fn insert(&mut self, metric: PolicyMetric) {
        self.entries.insert(metric.kind(), metric);
    }

    pub fn get(&self, kind: PolicyKind) -> Option<&PolicyMetric> {
        self.entries.get(&kind)
    }

    pub fn timeout(&self) -> Option<&TimeoutMetric> {
        match self.entries.get(&PolicyKind::Timeout) {
            Some(PolicyMetric::Timeout(m)) => Some(m),
            _ => None,
        }
    }

    pub fn retry(&self) -> Option<&RetryMetric> {
        match self.entries.get(&PolicyKind::Retry) {
            Some(PolicyMetric::Retry(m)) => Some(m),
            _ => None,
        }
    }

    pub fn circuit_breaker(&self) -> Option<&CircuitBreakerMetric> {
        match self.entries.get(&PolicyKind::CircuitBreaker) {
            Some(PolicyMetric::CircuitBreaker(m)) => Some(m),
            _ => None,
        }
    }

    pub fn fallback(&self) -> Option<&FallbackMetric> {
        match self.entries.get(&PolicyKind::Fallback) {
            Some(PolicyMetric::Fallback(m)) => Some(m),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PolicyKind, &PolicyMetric)> {
        self.entries.iter().map(|(kind, metric)| (*kind, metric))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetricRecorder for MetricSet {
    /// The aggregate is not tied to any one service.
    fn service_id(&self) -> &str {
        "policy-chain"
    }

    /// Sum of the children's durations. Outer layers span their inner
    /// layers, so this is at least any single child's duration.
    fn policy_duration(&self) -> Duration {
        self.entries.values().map(MetricRecorder::policy_duration).sum()
    }

    /// True only when every recorded layer succeeded.
    fn success(&self) -> bool {
        self.entries.values().all(MetricRecorder::success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;

    fn span(millis: u64) -> (Instant, Instant) {
        let start = Instant::now();
        (start, start + Duration::from_millis(millis))
    }

    fn retry_metric(status: Status, millis: u64) -> PolicyMetric {
        let (started_at, finished_at) = span(millis);
        PolicyMetric::Retry(RetryMetric {
            service_id: "svc".into(),
            status,
            started_at,
            finished_at,
            error: None,
            tries: 1,
            attempts: vec![],
        })
    }

    fn fallback_metric(status: Status, millis: u64) -> PolicyMetric {
        let (started_at, finished_at) = span(millis);
        PolicyMetric::Fallback(FallbackMetric {
            service_id: "svc".into(),
            status,
            started_at,
            finished_at,
            error: None,
        })
    }

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(PolicyKind::Timeout.tag(), "timeout");
        assert_eq!(PolicyKind::Retry.tag(), "retry");
        assert_eq!(PolicyKind::CircuitBreaker.tag(), "circuit_breaker");
        assert_eq!(PolicyKind::Fallback.tag(), "fallback");
    }

    #[test]
    fn new_set_is_empty_and_successful() {
        let set = MetricSet::new();
        assert!(set.is_empty());
        assert!(set.success());
        assert_eq!(set.policy_duration(), Duration::ZERO);
        assert_eq!(set.service_id(), "policy-chain");
    }

    #[test]
    fn same_kind_overwrites_earlier_entry() {
        let mut set = MetricSet::new();
        set.insert(retry_metric(Status::Failure, 5));
        set.insert(retry_metric(Status::Success, 7));
        assert_eq!(set.len(), 1);
        assert!(set.retry().unwrap().status.is_success());
    }

    #[test]
    fn duration_sums_children() {
        let mut set = MetricSet::new();
        set.insert(retry_metric(Status::Success, 5));
        set.insert(fallback_metric(Status::Success, 7));
        assert_eq!(set.policy_duration(), Duration::from_millis(12));
    }

    #[test]
    fn one_failing_child_fails_the_set() {
        let mut set = MetricSet::new();
        set.insert(retry_metric(Status::Success, 1));
        assert!(set.success());
        set.insert(fallback_metric(Status::Failure, 1));
        assert!(!set.success());
    }

    #[test]
    fn typed_accessors_match_kinds() {
        let mut set = MetricSet::new();
        let (started_at, finished_at) = span(1);
        set.insert(PolicyMetric::CircuitBreaker(CircuitBreakerMetric {
            service_id: "svc".into(),
            status: Status::Success,
            started_at,
            finished_at,
            error: None,
            state: CircuitState::Closed,
            error_count: 0,
        }));
        assert!(set.circuit_breaker().is_some());
        assert!(set.retry().is_none());
        assert!(set.get(PolicyKind::CircuitBreaker).is_some());
    }

    #[test]
    fn status_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::Failure.code(), 1);
        assert!(Status::Success.is_success());
        assert!(!Status::Failure.is_success());
    }
}
