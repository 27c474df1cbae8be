use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keyed_breaker::{CircuitBreaker, CircuitBreakerRegistry};
use std::error::Error;
use std::fmt;
use std::time::Duration;

// Custom error type that implements Error trait
#[derive(Debug)]
struct BenchError(String);

impl BenchError {
    fn new(msg: &str) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Benchmark error: {}", self.0)
    }
}

impl Error for BenchError {}

fn successful_operation() -> Result<(), BenchError> {
    Ok(())
}

fn failing_operation() -> Result<(), BenchError> {
    Err(BenchError::new("Simulated failure"))
}

fn bench_circuit_breaker_closed(c: &mut Criterion) {
    let breaker = CircuitBreaker::<(), BenchError>::builder()
        .failure_threshold(5)
        .recovery_timeout(Duration::from_secs(30))
        .build();

    c.bench_function("circuit_breaker_closed_success", |b| {
        b.iter(|| black_box(breaker.execute(successful_operation)));
    });
}

fn bench_circuit_breaker_open_fallback(c: &mut Criterion) {
    let breaker = CircuitBreaker::<(), BenchError>::builder()
        .failure_threshold(1)
        .recovery_timeout(Duration::from_secs(3600))
        .fallback_value(())
        .build();
    let _ = breaker.execute(failing_operation);

    c.bench_function("circuit_breaker_open_fallback", |b| {
        b.iter(|| black_box(breaker.execute(successful_operation)));
    });
}

fn bench_circuit_breaker_transition(c: &mut Criterion) {
    let breaker = CircuitBreaker::<(), BenchError>::builder()
        .failure_threshold(5)
        .recovery_timeout(Duration::from_secs(30))
        .build();

    c.bench_function("circuit_breaker_transition", |b| {
        b.iter_custom(|iters| {
            let start = std::time::Instant::now();

            for _ in 0..iters {
                // Reset to ensure consistent starting point
                breaker.reset();

                // Make 5 failing calls to trip the breaker
                for _ in 0..5 {
                    let _ = black_box(breaker.execute(failing_operation));
                }

                // One open-circuit rejection
                let _ = black_box(breaker.execute(successful_operation));
            }

            start.elapsed()
        });
    });
}

fn bench_circuit_breaker_concurrent(c: &mut Criterion) {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let breaker = CircuitBreaker::<(), BenchError>::builder()
        .failure_threshold(100) // High to avoid tripping
        .recovery_timeout(Duration::from_secs(30))
        .build();

    const THREAD_COUNT: usize = 4;
    const ITERATIONS_PER_THREAD: usize = 1000;

    c.bench_function("circuit_breaker_concurrent", |b| {
        b.iter(|| {
            let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
            let mut handles = Vec::with_capacity(THREAD_COUNT);

            for _ in 0..THREAD_COUNT {
                let thread_breaker = breaker.clone();
                let thread_barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    thread_barrier.wait();
                    for _ in 0..ITERATIONS_PER_THREAD {
                        let _ = black_box(thread_breaker.execute(successful_operation));
                    }
                }));
            }

            // Start all threads simultaneously
            barrier.wait();

            // Wait for all threads to complete
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = CircuitBreakerRegistry::<(), BenchError>::new();
    let keys: Vec<String> = (0..64).map(|i| format!("endpoint-{}", i)).collect();
    for key in &keys {
        registry.get_or_create(key, || CircuitBreaker::builder().build());
    }

    c.bench_function("registry_get_or_create_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(registry.get_or_create(&keys[i], || CircuitBreaker::builder().build()))
        });
    });
}

criterion_group!(
    benches,
    bench_circuit_breaker_closed,
    bench_circuit_breaker_open_fallback,
    bench_circuit_breaker_transition,
    bench_circuit_breaker_concurrent,
    bench_registry_lookup
);
criterion_main!(benches);
