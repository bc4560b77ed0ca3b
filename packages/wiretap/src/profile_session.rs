use std::fmt;

use crate::StopCallback;

/// A profiling session started via [`Registry::profile()`][crate::Registry::profile].
///
/// Call [`stop()`][Self::stop] when the profiled operation completes. The session may be moved
/// to another thread and stopped there, e.g. from the completion callback of an asynchronous
/// operation.
///
/// If profiling was disabled or no profile handlers were attached when the session was started,
/// this is a no-op session and `stop()` does nothing, so callers never need to check.
///
/// Dropping a session without stopping it abandons the session: the stop callbacks are
/// never called.
#[must_use = "profile handlers are only notified of the end of the session when `stop()` is called"]
pub struct ProfileSession {
    // In the order they are to be called.
    stop_callbacks: Vec<StopCallback>,
}

impl ProfileSession {
    pub(crate) fn new(stop_callbacks: Vec<StopCallback>) -> Self {
        Self { stop_callbacks }
    }

    pub(crate) const fn noop() -> Self {
        Self {
            stop_callbacks: Vec::new(),
        }
    }

    /// Stops the session, calling the stop callback of every profile handler that observed
    /// its start, in the order the handlers were attached.
    ///
    /// Each call invokes all the stop callbacks again; profile handlers that care about being
    /// stopped only once must guard against this themselves.
    pub fn stop(&self) {
        for stop in &self.stop_callbacks {
            stop();
        }
    }

    /// Whether stopping this session does nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stop_callbacks.is_empty()
    }

    /// The number of stop callbacks that [`stop()`][Self::stop] calls.
    #[must_use]
    pub fn stop_callback_count(&self) -> usize {
        self.stop_callbacks.len()
    }
}

impl fmt::Debug for ProfileSession {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSession")
            .field(
                "stop_callbacks",
                &format_args!("<{} stop callbacks>", self.stop_callbacks.len()),
            )
            .finish()
    }
}
