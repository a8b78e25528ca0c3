//! Process-wide circuit-breaker registry, keyed by service id.
//!
//! Breakers are created lazily the first time a service id is seen and live
//! for the rest of the process. The registry mutex is held only across
//! lookup-or-create; breaker mutation happens on the shared handle outside
//! the lock, so no invocation blocks another service's traffic.

use crate::circuit_breaker::SharedBreaker;
use crate::time_source::TimeSource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Default)]
pub(crate) struct BreakerRegistry {
    inner: Mutex<HashMap<String, Arc<SharedBreaker>>>,
}

impl BreakerRegistry {
    /// Shared breaker for `service_id`, created with `time` on first use.
    /// A breaker that already exists keeps the source it was created with.
    pub(crate) fn lookup_or_create(
        &self,
        service_id: &str,
        time: &Arc<dyn TimeSource>,
    ) -> Arc<SharedBreaker> {
        let mut map = self.inner.lock().unwrap();
        map.entry(service_id.to_owned())
            .or_insert_with(|| Arc::new(SharedBreaker::new(time.clone())))
            .clone()
    }

    pub(crate) fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

fn global() -> &'static BreakerRegistry {
    static REGISTRY: OnceLock<BreakerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BreakerRegistry::default)
}

pub(crate) fn breaker_for(service_id: &str, time: &Arc<dyn TimeSource>) -> Arc<SharedBreaker> {
    global().lookup_or_create(service_id, time)
}

/// Drop every breaker, so the next invocation per service id starts from a
/// fresh closed state. Intended for tests; in a process with in-flight
/// pipelines this discards live breaker state.
pub fn reset() {
    global().clear();
}
