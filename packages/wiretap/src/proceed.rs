/// One step of an in-flight handler chain.
///
/// Each call to `resume()` advances the chain by one position: either into the next handler
/// or, once all handlers have been entered, into the original function.
pub(crate) trait Continuation {
    fn resume(&mut self);
}

/// The continuation handed to a [`Handler`][crate::Handler].
///
/// Calling [`proceed()`][Self::proceed] continues the chain at the position of the handler
/// that received it: the next handler runs, or the original function if this was the last
/// handler. The call returns once everything nested inside this position has completed.
///
/// `proceed()` consumes the continuation, so a handler cannot continue the chain twice.
/// Dropping the continuation without calling `proceed()` breaks the chain, causing the
/// instrumented call to fail with [`Error::NotInvoked`][crate::Error::NotInvoked].
#[derive(derive_more::Debug)]
#[must_use = "the original function is only called if every handler calls `proceed()`"]
pub struct Proceed<'c> {
    #[debug(ignore)]
    continuation: &'c mut dyn Continuation,
}

impl<'c> Proceed<'c> {
    pub(crate) fn new(continuation: &'c mut dyn Continuation) -> Self {
        Self { continuation }
    }

    /// Continues the handler chain, returning after the original function (and any handlers
    /// nested inside this one) have completed.
    pub fn proceed(self) {
        self.continuation.resume();
    }
}
