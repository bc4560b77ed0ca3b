//! Benchmarks to measure the overhead of `wiretap` logic itself.
//!
//! The instrumented functions do no meaningful work, so the measurements are dominated by
//! the cost of the handler chain and of starting and stopping profile sessions.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use wiretap::{Handler, ProfileHandler, Registry};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("wiretap_overhead");

    let registry = Registry::builder()
        .instrumentation(true)
        .profiling(true)
        .build();

    // Baseline measurement - calling the function directly.
    let plain = |x: u64| x.wrapping_add(1);
    group.bench_function("baseline_direct_call", |b| {
        b.iter(|| black_box(plain(black_box(1))));
    });

    let passthrough_registry = Registry::builder().instrumentation(false).build();
    let passthrough = passthrough_registry.instrument("bench_passthrough", plain);
    group.bench_function("passthrough", |b| {
        b.iter(|| black_box(passthrough.call(black_box(1))));
    });

    // No handlers attached - the fast path.
    let unobserved = registry.instrument("bench_unobserved", plain);
    group.bench_function("no_handlers", |b| {
        b.iter(|| black_box(unobserved.call(black_box(1))));
    });

    let one_instance = registry.instrument("bench_one_instance", plain);
    one_instance.attach_handler(Handler::new(|_, proceed| proceed.proceed()));
    group.bench_function("one_instance_handler", |b| {
        b.iter(|| black_box(one_instance.call(black_box(1))));
    });

    let chained = registry.instrument("bench_chained", plain);
    for _ in 0..4 {
        registry.attach_aggregate_handler(
            "bench_chained",
            Handler::new(|_, proceed| proceed.proceed()),
        );
        chained.attach_handler(Handler::new(|_, proceed| proceed.proceed()));
    }
    group.bench_function("four_aggregate_four_instance_handlers", |b| {
        b.iter(|| black_box(chained.call(black_box(1))));
    });

    group.bench_function("profile_noop_session", |b| {
        b.iter(|| registry.profile(black_box("bench_no_profile_handlers")).stop());
    });

    registry.attach_profile_handler("bench_profile", ProfileHandler::new(|_, _| || {}));
    registry.attach_profile_handler("bench_profile", ProfileHandler::new(|_, _| || {}));
    group.bench_function("profile_two_handlers", |b| {
        b.iter(|| registry.profile(black_box("bench_profile")).stop());
    });

    group.finish();
}
