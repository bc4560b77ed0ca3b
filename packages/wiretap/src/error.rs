use thiserror::Error;

use crate::HandlerName;

/// Errors that can occur when invoking or configuring instrumented functions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The handler chain of an instrumented function completed without the original function
    /// being called. This means some handler in the chain did not call [`Proceed::proceed()`][1].
    ///
    /// This is always a defect in a handler, never a condition that can be repaired at runtime.
    ///
    /// [1]: crate::Proceed::proceed
    #[error("a handler of instrumented function '{name}' did not invoke the original function")]
    NotInvoked {
        /// Name of the instrumented function whose chain was broken.
        name: HandlerName,
    },

    /// Bulk instrumentation referenced a method that does not exist in the method table.
    #[error("cannot instrument method '{key}' because the method table does not contain it")]
    UnknownMethod {
        /// The method key that was not found.
        key: String,
    },

    /// The process-wide registry was already initialized when an attempt was made
    /// to install a custom configuration for it.
    #[error("the global registry has already been initialized")]
    GlobalAlreadyInitialized,
}

/// A specialized `Result` type for wiretap operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
