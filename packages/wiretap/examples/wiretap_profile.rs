//! Demonstrates profiling an operation that completes on another thread.
//!
//! Run with: `cargo run --example wiretap_profile`.

use std::thread;
use std::time::{Duration, Instant};

use wiretap::ProfileHandler;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    wiretap::set_profiling_enabled(true);

    wiretap::attach_profile_handler(
        "background_job",
        ProfileHandler::new(|name, state| {
            let name = name.to_owned();
            let job_id = state.and_then(|s| s.downcast_ref::<u32>()).copied();
            let started = Instant::now();

            println!("{name} {job_id:?} started");
            move || println!("{name} {job_id:?} finished after {:?}", started.elapsed())
        }),
    );

    let workers = (1..=3_u32)
        .map(|job_id| {
            let session = wiretap::profile_with_state("background_job", &job_id);

            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10).saturating_mul(job_id));
                session.stop();
            })
        })
        .collect::<Vec<_>>();

    for worker in workers {
        worker.join().expect("worker thread panicked");
    }

    // Nothing is attached under this name, so this session does nothing when stopped.
    wiretap::profile("unobserved_job").stop();
}
