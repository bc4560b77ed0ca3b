//! Free functions that operate on the process-wide registry.

use std::any::Any;

use crate::{
    Handler, HandlerName, Instrumented, MethodTable, ProfileHandler, ProfileSession, Registry,
    Result,
};

/// Enables or disables profiling in the process-wide registry.
///
/// See [`Registry::set_profiling_enabled()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn set_profiling_enabled(enabled: bool) {
    Registry::global().set_profiling_enabled(enabled);
}

/// Whether profiling is enabled in the process-wide registry.
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
#[must_use]
pub fn is_profiling_enabled() -> bool {
    Registry::global().is_profiling_enabled()
}

/// Wraps a function so that handlers can intercept its invocations.
///
/// See [`Registry::instrument()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
#[must_use]
pub fn instrument<A, R, F>(name: impl Into<HandlerName>, original: F) -> Instrumented<A, R>
where
    A: 'static,
    R: 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    Registry::global().instrument(name, original)
}

/// Wraps a method-like function that is invoked with a receiver of type `T`.
///
/// See [`Registry::instrument_method()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
#[must_use]
pub fn instrument_method<A, R, T, F>(
    name: impl Into<HandlerName>,
    original: F,
) -> Instrumented<A, R, T>
where
    A: 'static,
    R: 'static,
    T: ?Sized + 'static,
    F: Fn(&T, A) -> R + Send + Sync + 'static,
{
    Registry::global().instrument_method(name, original)
}

/// Instruments many methods of a method table at once.
///
/// See [`Registry::instrument_methods()`].
///
/// # Errors
///
/// Returns [`Error::UnknownMethod`][crate::Error::UnknownMethod] if the mapping names a key
/// that is not in the table.
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn instrument_methods<A, R, T, K, N>(
    table: &mut MethodTable<A, R, T>,
    mapping: impl IntoIterator<Item = (K, N)>,
) -> Result<()>
where
    A: 'static,
    R: 'static,
    T: ?Sized + 'static,
    K: Into<String>,
    N: Into<HandlerName>,
{
    Registry::global().instrument_methods(table, mapping)
}

/// Attaches a handler that intercepts every function instrumented under `name`.
///
/// See [`Registry::attach_aggregate_handler()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn attach_aggregate_handler(name: impl Into<HandlerName>, handler: Handler) {
    Registry::global().attach_aggregate_handler(name, handler);
}

/// Detaches a previously attached aggregate handler.
///
/// See [`Registry::detach_aggregate_handler()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn detach_aggregate_handler(name: &str, handler: &Handler) {
    Registry::global().detach_aggregate_handler(name, handler);
}

/// Starts a profiling session.
///
/// See [`Registry::profile()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn profile(name: &str) -> ProfileSession {
    Registry::global().profile(name)
}

/// Starts a profiling session, passing `state` to every profile handler.
///
/// See [`Registry::profile_with_state()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn profile_with_state<S>(name: &str, state: &S) -> ProfileSession
where
    S: Any,
{
    Registry::global().profile_with_state(name, state)
}

/// Attaches a handler that observes every profiling session started under `name`.
///
/// See [`Registry::attach_profile_handler()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn attach_profile_handler(name: impl Into<HandlerName>, handler: ProfileHandler) {
    Registry::global().attach_profile_handler(name, handler);
}

/// Detaches a previously attached profile handler.
///
/// See [`Registry::detach_profile_handler()`].
#[cfg_attr(test, mutants::skip)] // Trivial forwarder.
pub fn detach_profile_handler(name: &str, handler: &ProfileHandler) {
    Registry::global().detach_profile_handler(name, handler);
}
