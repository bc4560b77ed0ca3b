//! Demonstrates intercepting function calls with aggregate and instance handlers.
//!
//! Run with: `cargo run --example wiretap_basic`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use wiretap::{Handler, Registry};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    Registry::builder()
        .instrumentation(true)
        .profiling(true)
        .build_global()
        .expect("nothing has touched the global registry yet");

    let parse = wiretap::instrument("config_parse", |text: String| {
        text.lines()
            .filter(|line| line.contains('='))
            .count()
    });

    let render = wiretap::instrument("config_render", |entries: usize| {
        format!("{entries} entries")
    });

    // Measures every function instrumented under the name, wherever it is defined.
    let total_nanos = Arc::new(AtomicU64::new(0));
    wiretap::attach_aggregate_handler(
        "config_parse",
        Handler::new({
            let total_nanos = Arc::clone(&total_nanos);
            move |_, proceed| {
                let started = Instant::now();
                proceed.proceed();

                let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
                total_nanos.fetch_add(elapsed, Ordering::Relaxed);
            }
        }),
    );

    // Observes only this one function.
    let announce = Handler::new(|name, proceed| {
        println!("-> {name}");
        proceed.proceed();
        println!("<- {name}");
    });
    render.attach_handler(announce.clone());

    let entries = parse.call("a = 1\nb = 2\n# comment\nc = 3".to_string());
    println!("{}", render.call(entries));

    render.detach_handler(&announce);
    println!("{}", render.call(0));

    println!(
        "Spent {} ns parsing configuration",
        total_nanos.load(Ordering::Relaxed)
    );
}
