//! `registry::reset` lives in its own binary: it clears every breaker in
//! the process, so it must not race other breaker tests.

use palisade::{chain, registry, CircuitBreakerPolicy, CircuitState, Command, ServiceError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("storage offline")]
struct StorageOffline;

#[tokio::test]
async fn reset_returns_breakers_to_a_fresh_closed_state() {
    let mut breaker = CircuitBreakerPolicy::new("reset-target");
    breaker.reset_timeout = Duration::from_secs(30);

    chain(vec![breaker.clone().into()])
        .execute(Command::new(|| async {
            Err(Arc::new(StorageOffline) as ServiceError)
        }))
        .await
        .unwrap();
    assert_eq!(breaker.state().unwrap(), CircuitState::Open);

    registry::reset();
    assert_eq!(breaker.state().unwrap(), CircuitState::Closed);

    // And the recreated breaker passes traffic again.
    let metrics = chain(vec![breaker.clone().into()])
        .execute(Command::new(|| async { Ok(()) }))
        .await
        .unwrap();
    assert_eq!(metrics.circuit_breaker().unwrap().state, CircuitState::Closed);
    assert_eq!(metrics.circuit_breaker().unwrap().error_count, 0);
}
