//! How a retry policy waits out the pause between attempts.
//!
//! Retry never touches the timer directly; it asks a [`Waiter`]. That keeps
//! an N-attempt test from costing N real pauses, and lets a test assert on
//! exactly the pauses a policy requested.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Waits out one inter-attempt pause.
pub trait Waiter: Send + Sync + std::fmt::Debug {
    fn wait(&self, period: Duration) -> BoxFuture<'static, ()>;
}

/// Production waiter riding the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerWaiter;

impl Waiter for TimerWaiter {
    fn wait(&self, period: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(period))
    }
}

/// Test waiter: completes immediately and logs every requested period.
///
/// The log rides an `Arc`, and composers clone policies when binding a
/// pipeline, so the handle a test keeps observes the pauses the running
/// copy requests.
#[derive(Debug, Clone, Default)]
pub struct StubWaiter {
    log: Arc<Mutex<Vec<Duration>>>,
}

impl StubWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Periods requested so far, in request order.
    pub fn requests(&self) -> Vec<Duration> {
        self.log.lock().unwrap().clone()
    }
}

impl Waiter for StubWaiter {
    fn wait(&self, period: Duration) -> BoxFuture<'static, ()> {
        self.log.lock().unwrap().push(period);
        Box::pin(std::future::ready(()))
    }
}
