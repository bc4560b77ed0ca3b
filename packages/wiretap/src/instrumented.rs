use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::{Continuation, Error, Handler, HandlerName, Proceed, Registry, Result};

/// The signature of a function that can be instrumented: it receives a receiver of type `T`
/// (`()` for free functions) and arguments of type `A`, returning `R`.
pub type OriginalFn<A, R, T = ()> = dyn Fn(&T, A) -> R + Send + Sync;

/// A function wrapped so that handlers can intercept its invocations.
///
/// Created via [`Registry::instrument()`] or [`Registry::instrument_method()`] (or the
/// equivalent free functions that use the process-wide registry).
///
/// # Handler chain
///
/// Every invocation flows through the following handlers before reaching the original function:
///
/// 1. The aggregate handlers attached to the registry under this function's name, in attachment
///    order. These are looked up on every call.
/// 2. The handlers attached directly to this wrapper via [`attach_handler()`][1], in attachment
///    order.
///
/// Each handler wraps everything after it: the first aggregate handler is the outermost and the
/// last instance handler directly wraps the original function. Every handler must call
/// [`Proceed::proceed()`] to continue the chain.
///
/// If no handlers are attached, the original function is called directly.
///
/// Handlers may invoke instrumented functions (including this one) before continuing the chain;
/// every invocation tracks its own position in the chain, so nested invocations do not disturb
/// the invocation that contains them.
///
/// # Passthrough mode
///
/// If the registry was built with instrumentation disabled, the wrapper is created in passthrough
/// mode: it always calls the original function directly, and attaching or detaching handlers
/// does nothing.
///
/// # Example
///
/// ```
/// use std::time::Instant;
///
/// use wiretap::{Handler, Registry};
///
/// let registry = Registry::builder().instrumentation(true).build();
///
/// let parse = registry.instrument("config_parse", |text: String| text.lines().count());
///
/// parse.attach_handler(Handler::new(|name, proceed| {
///     let started = Instant::now();
///     proceed.proceed();
///     println!("{name} took {:?}", started.elapsed());
/// }));
///
/// assert_eq!(parse.call("a = 1\nb = 2".to_string()), 2);
/// ```
///
/// [1]: Self::attach_handler
pub struct Instrumented<A, R, T = ()>
where
    T: ?Sized,
{
    name: HandlerName,
    callee: Callee<A, R, T>,
    interception: Interception,
}

/// What an [`Instrumented`] function calls once its handler chain has been walked.
pub(crate) enum Callee<A, R, T>
where
    T: ?Sized,
{
    Plain(Box<OriginalFn<A, R, T>>),

    // Instrumenting an instrumented function again. The inner chain may fail on its own.
    Nested(Box<Instrumented<A, R, T>>),
}

impl<A, R, T> Callee<A, R, T>
where
    T: ?Sized,
{
    fn invoke(&self, receiver: &T, args: A) -> Result<R> {
        match self {
            Self::Plain(f) => Ok(f(receiver, args)),
            Self::Nested(inner) => inner.try_call_with(receiver, args),
        }
    }
}

enum Interception {
    Passthrough,
    Chained {
        registry: Registry,

        // Replaced (never mutated in place) on attach/detach, so a call can keep using
        // the list it started with.
        handlers: ArcSwap<Vec<Handler>>,
    },
}

impl<A, R, T> Instrumented<A, R, T>
where
    T: ?Sized,
{
    pub(crate) fn new(name: HandlerName, callee: Callee<A, R, T>, registry: &Registry) -> Self {
        let interception = if registry.is_instrumentation_enabled() {
            Interception::Chained {
                registry: registry.clone(),
                handlers: ArcSwap::from_pointee(Vec::new()),
            }
        } else {
            Interception::Passthrough
        };

        Self {
            name,
            callee,
            interception,
        }
    }

    /// The name under which the function was instrumented.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this wrapper ignores handlers because instrumentation was disabled
    /// when it was created.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self.interception, Interception::Passthrough)
    }

    /// The number of handlers attached directly to this function.
    ///
    /// Aggregate handlers attached to the registry are not included.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        match &self.interception {
            Interception::Passthrough => 0,
            Interception::Chained { handlers, .. } => handlers.load().len(),
        }
    }

    /// Attaches a handler that intercepts invocations of this function only.
    ///
    /// The handler runs inside all aggregate handlers and inside any handlers attached to this
    /// function earlier. Does nothing in passthrough mode.
    pub fn attach_handler(&self, handler: Handler) {
        let Interception::Chained { handlers, .. } = &self.interception else {
            return;
        };

        tracing::trace!(name = %self.name, "attaching instance handler");

        handlers.rcu(|current| {
            let mut updated = Vec::clone(current);
            updated.push(handler.clone());
            updated
        });
    }

    /// Detaches a handler previously attached to this function.
    ///
    /// Does nothing if the handler is not attached or in passthrough mode.
    pub fn detach_handler(&self, handler: &Handler) {
        let Interception::Chained { handlers, .. } = &self.interception else {
            return;
        };

        tracing::trace!(name = %self.name, "detaching instance handler");

        handlers.rcu(|current| {
            let mut updated = Vec::clone(current);

            if let Some(position) = updated.iter().position(|candidate| candidate == handler) {
                updated.remove(position);
            }

            updated
        });
    }

    /// Invokes the function with the given receiver and arguments.
    ///
    /// # Panics
    ///
    /// Panics if a handler did not continue the chain, so the original function was never
    /// called. Use [`try_call_with()`][Self::try_call_with] to receive this as an error instead.
    pub fn call_with(&self, receiver: &T, args: A) -> R {
        self.try_call_with(receiver, args)
            .unwrap_or_else(|error| panic!("{error}"))
    }

    /// Invokes the function with the given receiver and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInvoked`] if a handler did not continue the chain, so the original
    /// function was never called. This always indicates a defect in a handler.
    pub fn try_call_with(&self, receiver: &T, args: A) -> Result<R> {
        let Interception::Chained { registry, handlers } = &self.interception else {
            return self.callee.invoke(receiver, args);
        };

        let aggregate = registry.aggregate_handlers(&self.name);
        let instance = handlers.load();

        if aggregate.is_empty() && instance.is_empty() {
            return self.callee.invoke(receiver, args);
        }

        let mut context =
            InvocationContext::new(self, aggregate, Guard::into_inner(instance), receiver, args);

        Proceed::new(&mut context).proceed();

        context.result.unwrap_or_else(|| {
            tracing::debug!(
                name = %self.name,
                "handler chain completed without invoking the original function"
            );

            Err(Error::NotInvoked {
                name: self.name.clone(),
            })
        })
    }

    /// Turns the wrapper into the callee of another wrapper, so that the other wrapper's
    /// handlers run outside this one's.
    pub(crate) fn into_callee(self) -> Callee<A, R, T> {
        Callee::Nested(Box::new(self))
    }
}

impl<A, R> Instrumented<A, R, ()> {
    /// Invokes a function that has no receiver.
    ///
    /// # Panics
    ///
    /// Panics if a handler did not continue the chain, so the original function was never
    /// called. Use [`try_call()`][Self::try_call] to receive this as an error instead.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn call(&self, args: A) -> R {
        self.call_with(&(), args)
    }

    /// Invokes a function that has no receiver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInvoked`] if a handler did not continue the chain, so the original
    /// function was never called. This always indicates a defect in a handler.
    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    pub fn try_call(&self, args: A) -> Result<R> {
        self.try_call_with(&(), args)
    }
}

impl<A, R, T> fmt::Debug for Instrumented<A, R, T>
where
    T: ?Sized,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented")
            .field("name", &self.name)
            .field(
                "original",
                &format_args!(
                    "<fn(&{}, {}) -> {}>",
                    std::any::type_name::<T>(),
                    std::any::type_name::<A>(),
                    std::any::type_name::<R>()
                ),
            )
            .field("nested", &matches!(self.callee, Callee::Nested(_)))
            .field("passthrough", &self.is_passthrough())
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

/// The state of one invocation of an [`Instrumented`] function while its handler chain runs.
///
/// Lives on the stack of the invocation, so nested invocations each get their own.
struct InvocationContext<'i, A, R, T>
where
    T: ?Sized,
{
    name: &'i str,
    callee: &'i Callee<A, R, T>,

    // Snapshots taken at call entry.
    aggregate: Arc<[Handler]>,
    instance: Arc<Vec<Handler>>,

    remaining_aggregate: usize,
    remaining_instance: usize,

    receiver: &'i T,
    args: Option<A>,

    // `None` until the callee has been called. A nested callee may itself fail.
    result: Option<Result<R>>,
}

impl<'i, A, R, T> InvocationContext<'i, A, R, T>
where
    T: ?Sized,
{
    fn new(
        instrumented: &'i Instrumented<A, R, T>,
        aggregate: Arc<[Handler]>,
        instance: Arc<Vec<Handler>>,
        receiver: &'i T,
        args: A,
    ) -> Self {
        Self {
            name: &instrumented.name,
            callee: &instrumented.callee,
            remaining_aggregate: aggregate.len(),
            remaining_instance: instance.len(),
            aggregate,
            instance,
            receiver,
            args: Some(args),
            result: None,
        }
    }
}

impl<A, R, T> Continuation for InvocationContext<'_, A, R, T>
where
    T: ?Sized,
{
    fn resume(&mut self) {
        let name = self.name;

        if let Some(remaining) = self.remaining_aggregate.checked_sub(1) {
            let handlers = Arc::clone(&self.aggregate);
            let index = handlers.len().saturating_sub(self.remaining_aggregate);
            self.remaining_aggregate = remaining;

            if let Some(handler) = handlers.get(index) {
                handler.invoke(name, Proceed::new(self));
            }
        } else if let Some(remaining) = self.remaining_instance.checked_sub(1) {
            let handlers = Arc::clone(&self.instance);
            let index = handlers.len().saturating_sub(self.remaining_instance);
            self.remaining_instance = remaining;

            if let Some(handler) = handlers.get(index) {
                handler.invoke(name, Proceed::new(self));
            }
        } else if let Some(args) = self.args.take() {
            self.result = Some(self.callee.invoke(self.receiver, args));
        }
    }
}
