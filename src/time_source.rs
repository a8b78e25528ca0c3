//! Monotonic time readings for aging circuit-breaker cooldowns.
//!
//! Breaker state is shared process-wide (see [`crate::registry`]), so the
//! readings that decide whether a cooldown elapsed must stay comparable no
//! matter which policy value produced them. A [`TimeSource`] therefore
//! reports time as a duration since one fixed origin rather than handing
//! out raw instants, and the production source pins that origin once for
//! the whole process.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Monotonic reading, expressed as time elapsed since a fixed origin.
///
/// Readings must never decrease and must be safe to take concurrently: a
/// breaker compares a reading stored by one caller against a reading taken
/// later by another.
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    fn monotonic(&self) -> Duration;
}

/// Production time source.
///
/// Every `ProcessClock` value measures from the same origin, captured
/// lazily at the first reading anywhere in the process. A shared breaker
/// outlives each policy value that touches it, and each of those values may
/// carry its own `ProcessClock`; a per-value origin would make their stored
/// cooldown timestamps disagree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessClock;

impl TimeSource for ProcessClock {
    fn monotonic(&self) -> Duration {
        origin().elapsed()
    }
}

fn origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}
