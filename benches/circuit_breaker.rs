use criterion::{black_box, criterion_group, criterion_main, Criterion};
use palisade::{chain, Chain, CircuitBreakerPolicy, Command, ServiceError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bench failure")]
struct BenchFailure;

fn ok_command() -> Command {
    Command::new(|| async { Ok(()) })
}

fn pipeline(service_id: &str, threshold: u32) -> Chain {
    let mut breaker = CircuitBreakerPolicy::new(service_id);
    breaker.threshold_errors = threshold;
    breaker.reset_timeout = Duration::from_secs(30);
    chain(vec![breaker.into()])
}

fn closed_pass_through(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pipeline = pipeline("bench-closed", 10);

    c.bench_function("circuit_breaker_closed_pass_through", |b| {
        b.to_async(&rt).iter(|| {
            let pipeline = pipeline.clone();
            async move {
                let _ = black_box(pipeline.execute(ok_command()).await);
            }
        });
    });
}

fn open_short_circuit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let pipeline = pipeline("bench-open", 1);

    // Trip the breaker once so every measured call short-circuits.
    rt.block_on(async {
        let _ = pipeline
            .execute(Command::new(|| async {
                Err(Arc::new(BenchFailure) as ServiceError)
            }))
            .await;
    });

    c.bench_function("circuit_breaker_open_short_circuit", |b| {
        b.to_async(&rt).iter(|| {
            let pipeline = pipeline.clone();
            async move {
                let _ = black_box(pipeline.execute(ok_command()).await);
            }
        });
    });
}

criterion_group!(benches, closed_pass_through, open_short_circuit);
criterion_main!(benches);
