//! Integration test for toggling profiling in the process-wide registry.
//!
//! This is in a separate integration test binary because toggling the global flag
//! would interfere with other tests that profile through the global registry.

use std::sync::{Arc, Mutex};

use wiretap::{ProfileHandler, Registry};

#[test]
fn toggling_profiling_suspends_and_restores_fan_out() {
    Registry::builder()
        .instrumentation(true)
        .profiling(true)
        .build_global()
        .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));

    wiretap::attach_profile_handler(
        "toggle",
        ProfileHandler::new({
            let log = Arc::clone(&log);
            move |_, _| {
                log.lock().unwrap().push("start");

                let log = Arc::clone(&log);
                move || log.lock().unwrap().push("stop")
            }
        }),
    );

    wiretap::set_profiling_enabled(false);
    assert!(!wiretap::is_profiling_enabled());

    let session = wiretap::profile("toggle");
    assert!(session.is_noop());
    session.stop();

    // Attaching while disabled is ignored.
    wiretap::attach_profile_handler("toggle", ProfileHandler::new(|_, _| || {}));
    assert!(log.lock().unwrap().is_empty());

    wiretap::set_profiling_enabled(true);

    let session = wiretap::profile("toggle");
    assert_eq!(session.stop_callback_count(), 1);
    session.stop();

    assert_eq!(*log.lock().unwrap(), vec!["start", "stop"]);
    assert_eq!(Registry::global().profile_handler_count("toggle"), 1);
}
