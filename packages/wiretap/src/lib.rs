#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! # wiretap
//!
//! Lets functions be wrapped so that external observers ("handlers") can measure or intercept
//! their execution, and lets operations that are not shaped like a single function call be
//! profiled by name via explicit start/stop calls.
//!
//! There are two independent mechanisms:
//!
//! * **Instrumented functions** - [`instrument()`] wraps a function in an [`Instrumented`].
//!   Every invocation passes through a chain of [`Handler`]s before reaching the original
//!   function: first the aggregate handlers attached under the function's name, then the
//!   handlers attached to the wrapper itself.
//! * **Profile sessions** - [`profile()`] starts a [`ProfileSession`] under a name, notifying
//!   every [`ProfileHandler`] attached under that name. Each handler returns a stop callback
//!   that is called when the session is stopped.
//!
//! # Intercepting function calls
//!
//! ```
//! use std::time::Instant;
//!
//! use wiretap::{Handler, Registry};
//!
//! let registry = Registry::builder().instrumentation(true).build();
//!
//! let checksum = registry.instrument("payload_checksum", |bytes: Vec<u8>| {
//!     bytes.iter().map(|b| u32::from(*b)).sum::<u32>()
//! });
//!
//! // Aggregate handlers apply to every function instrumented under the same name.
//! registry.attach_aggregate_handler(
//!     "payload_checksum",
//!     Handler::new(|name, proceed| {
//!         let started = Instant::now();
//!         proceed.proceed();
//!         println!("{name} took {:?}", started.elapsed());
//!     }),
//! );
//!
//! // Instance handlers apply only to one wrapper and run inside the aggregate handlers.
//! checksum.attach_handler(Handler::new(|name, proceed| {
//!     println!("calling {name}");
//!     proceed.proceed();
//! }));
//!
//! assert_eq!(checksum.call(vec![1, 2, 3]), 6);
//! ```
//!
//! Every handler must call [`Proceed::proceed()`] exactly once to continue the chain. If a
//! handler does not, the original function is never called and the invocation fails with
//! [`Error::NotInvoked`] ([`Instrumented::try_call()`]) or panics ([`Instrumented::call()`]).
//!
//! # Profiling operations
//!
//! ```
//! use std::time::Instant;
//!
//! use wiretap::{ProfileHandler, Registry};
//!
//! let registry = Registry::builder().profiling(true).build();
//!
//! registry.attach_profile_handler(
//!     "upload",
//!     ProfileHandler::new(|name, state| {
//!         let name = name.to_owned();
//!         let bytes = state.and_then(|s| s.downcast_ref::<usize>()).copied();
//!         let started = Instant::now();
//!
//!         move || println!("{name} ({bytes:?} bytes) took {:?}", started.elapsed())
//!     }),
//! );
//!
//! let session = registry.profile_with_state("upload", &4096_usize);
//! // ... the upload completes later, possibly on another thread ...
//! session.stop();
//! ```
//!
//! Profile handlers are started in reverse attachment order and stopped in attachment order.
//! If profiling is disabled or no handlers are attached, `profile()` returns a session that
//! does nothing when stopped, so callers never need to check.
//!
//! # Configuration
//!
//! The free functions of this crate use a process-wide [`Registry`]. Its configuration can be
//! set once, before first use, via [`RegistryBuilder::build_global()`]:
//!
//! ```
//! wiretap::Registry::builder()
//!     .instrumentation(true)
//!     .profiling(false)
//!     .build_global()
//!     .unwrap();
//!
//! // Profiling can still be toggled at runtime.
//! wiretap::set_profiling_enabled(true);
//! assert!(wiretap::is_profiling_enabled());
//! ```
//!
//! Both instrumentation and profiling default to enabled in builds with debug assertions and
//! to disabled otherwise. Instrumentation is fixed when the registry is created: functions
//! instrumented through a registry with instrumentation disabled call the original function
//! directly and ignore handlers, so call sites do not need to care about the build mode.
//!
//! # Logging
//!
//! Attaching and detaching handlers is logged at `trace` level via the `tracing` crate;
//! configuration changes and broken handler chains at `debug` level. Nothing is logged on the
//! invocation path of an instrumented function.
//!
//! # Panic policy
//!
//! Handlers are never invoked while an internal lock is held, so handlers may freely attach
//! and detach handlers and invoke instrumented functions. Panics in handlers propagate to the
//! caller of the instrumented function or of `profile()`.

mod constants;
mod error;
mod global;
mod handlers;
mod instrumented;
mod methods;
mod proceed;
mod profile_session;
mod registry;
mod registry_builder;

pub(crate) use constants::*;
pub use error::*;
pub use global::*;
pub use handlers::*;
pub use instrumented::*;
pub use methods::*;
pub use proceed::*;
pub use profile_session::*;
pub use registry::*;
pub use registry_builder::*;
