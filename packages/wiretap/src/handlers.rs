use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::Proceed;

/// The name under which instrumented functions and profile sessions are grouped.
///
/// Typically names are `&'static str` but for rare cases when the set of names is not known
/// in advance, we also support owned strings via `Cow`.
pub type HandlerName = Cow<'static, str>;

type InvokeFn = dyn Fn(&str, Proceed<'_>) + Send + Sync;
type StartFn = dyn Fn(&str, Option<&dyn Any>) -> StopCallback + Send + Sync;

/// Ends a profiling session started by a [`ProfileHandler`].
pub(crate) type StopCallback = Box<dyn Fn() + Send + Sync>;

/// Intercepts calls to instrumented functions.
///
/// A handler receives the name of the instrumented function and a [`Proceed`] continuation.
/// It must call [`Proceed::proceed()`] exactly once, synchronously, to continue the chain
/// toward the original function. Work done before that call happens "before" the original
/// function and work done after it happens "after" it.
///
/// The same handler type is used both for aggregate handlers (attached to a name in a
/// [`Registry`][crate::Registry]) and for handlers attached to a single [`Instrumented`][1]
/// function.
///
/// Handlers are compared by identity: to detach a handler, pass a clone of the value
/// that was attached.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use wiretap::Handler;
///
/// let calls = Arc::new(AtomicUsize::new(0));
///
/// let counting = Handler::new({
///     let calls = Arc::clone(&calls);
///     move |_name, proceed| {
///         calls.fetch_add(1, Ordering::Relaxed);
///         proceed.proceed();
///     }
/// });
/// # drop(counting);
/// ```
///
/// [1]: crate::Instrumented
#[derive(Clone)]
pub struct Handler {
    invoke: Arc<InvokeFn>,
}

impl Handler {
    /// Creates a handler from a function that receives the instrumented function's name
    /// and the continuation of the chain.
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, Proceed<'_>) + Send + Sync + 'static,
    {
        Self { invoke: Arc::new(f) }
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub(crate) fn invoke(&self, name: &str, proceed: Proceed<'_>) {
        (self.invoke)(name, proceed);
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.invoke, &other.invoke)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("invoke", &format_args!("{:p}", Arc::as_ptr(&self.invoke)))
            .finish()
    }
}

/// Observes profiling sessions started via [`Registry::profile()`][1].
///
/// When a session is started, the handler is called with the session name and the optional
/// state passed to `profile_with_state()`. It returns a stop callback, which is called when
/// the session is stopped via [`ProfileSession::stop()`][2].
///
/// Handlers are compared by identity: to detach a handler, pass a clone of the value
/// that was attached.
///
/// # Example
///
/// ```
/// use std::time::Instant;
///
/// use wiretap::ProfileHandler;
///
/// let timing = ProfileHandler::new(|name, _state| {
///     let name = name.to_owned();
///     let started = Instant::now();
///
///     move || println!("{name} took {:?}", started.elapsed())
/// });
/// # drop(timing);
/// ```
///
/// [1]: crate::Registry::profile
/// [2]: crate::ProfileSession::stop
#[derive(Clone)]
pub struct ProfileHandler {
    start: Arc<StartFn>,
}

impl ProfileHandler {
    /// Creates a profile handler from a function that starts observing a session and
    /// returns the callback that stops observing it.
    #[must_use]
    pub fn new<F, S>(start: F) -> Self
    where
        F: Fn(&str, Option<&dyn Any>) -> S + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        let start = move |name: &str, state: Option<&dyn Any>| -> StopCallback {
            Box::new(start(name, state))
        };

        Self {
            start: Arc::new(start),
        }
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub(crate) fn start(&self, name: &str, state: Option<&dyn Any>) -> StopCallback {
        (self.start)(name, state)
    }
}

impl PartialEq for ProfileHandler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.start, &other.start)
    }
}

impl Eq for ProfileHandler {}

impl fmt::Debug for ProfileHandler {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileHandler")
            .field("start", &format_args!("{:p}", Arc::as_ptr(&self.start)))
            .finish()
    }
}
