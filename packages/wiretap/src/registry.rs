use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use foldhash::{HashMap, HashMapExt};

use crate::{
    Callee, ERR_POISONED_LOCK, Error, Handler, HandlerName, Instrumented, Method, MethodTable,
    ProfileHandler, ProfileSession, RegistryBuilder, Result,
};

type HandlerMap<H> = HashMap<HandlerName, Arc<[H]>>;

/// Keeps track of the aggregate handlers and profile handlers attached under each name,
/// and of whether profiling is currently enabled.
///
/// Most applications use the process-wide registry through the free functions of this crate
/// (e.g. [`instrument()`][crate::instrument], [`profile()`][crate::profile]). Isolated
/// registries can be created via [`Registry::builder()`], which is mostly useful for tests
/// and for libraries that do not want to share handlers with their host application.
///
/// Cloning a `Registry` creates another handle to the same registry.
///
/// # Example
///
/// ```
/// use wiretap::{Handler, Registry};
///
/// let registry = Registry::builder().instrumentation(true).build();
///
/// let add = registry.instrument("math_add", |(a, b): (i32, i32)| a + b);
///
/// registry.attach_aggregate_handler(
///     "math_add",
///     Handler::new(|name, proceed| {
///         println!("entering {name}");
///         proceed.proceed();
///         println!("leaving {name}");
///     }),
/// );
///
/// assert_eq!(add.call((2, 3)), 5);
/// ```
#[derive(Clone, Debug)]
pub struct Registry {
    core: Arc<RegistryCore>,
}

#[derive(Debug)]
struct RegistryCore {
    // Fixed at creation. Functions instrumented while this is false never build a chain.
    instrumentation_enabled: bool,

    profiling_enabled: AtomicBool,

    // Each entry is replaced (never mutated in place) on attach/detach, so a call can take a
    // cheap snapshot of the list and run the chain without holding the lock.
    aggregate_handlers: RwLock<HandlerMap<Handler>>,
    profile_handlers: RwLock<HandlerMap<ProfileHandler>>,

    // Returned for names without aggregate handlers, so the lookup on the call path
    // never allocates.
    no_aggregate_handlers: Arc<[Handler]>,
}

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Creates a new registry builder with the default configuration.
    #[cfg_attr(test, mutants::skip)] // Gets replaced with itself by different name, bad mutation.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn new(instrumentation_enabled: bool, profiling_enabled: bool) -> Self {
        Self {
            core: Arc::new(RegistryCore {
                instrumentation_enabled,
                profiling_enabled: AtomicBool::new(profiling_enabled),
                aggregate_handlers: RwLock::new(HashMap::new()),
                profile_handlers: RwLock::new(HashMap::new()),
                no_aggregate_handlers: Arc::from(Vec::new()),
            }),
        }
    }

    /// The process-wide registry used by the free functions of this crate.
    ///
    /// If it has not been configured via [`RegistryBuilder::build_global()`], it is created
    /// with the default configuration on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        GLOBAL_REGISTRY.get_or_init(|| Self::builder().build())
    }

    pub(crate) fn install_global(registry: Self) -> std::result::Result<(), Self> {
        GLOBAL_REGISTRY.set(registry)
    }

    /// Whether functions instrumented through this registry build handler chains.
    ///
    /// This is fixed when the registry is created.
    #[must_use]
    pub fn is_instrumentation_enabled(&self) -> bool {
        self.core.instrumentation_enabled
    }

    /// Whether [`profile()`][Self::profile] currently fans out to profile handlers.
    #[must_use]
    pub fn is_profiling_enabled(&self) -> bool {
        self.core.profiling_enabled.load(Ordering::Relaxed)
    }

    /// Enables or disables profiling.
    ///
    /// Takes effect on the next call to [`profile()`][Self::profile],
    /// [`attach_profile_handler()`][Self::attach_profile_handler] or
    /// [`detach_profile_handler()`][Self::detach_profile_handler]. Sessions that have already
    /// been started are not affected and still call their stop callbacks when stopped.
    ///
    /// Disabling profiling does not detach any handlers. Enabling it again resumes fan-out
    /// to the handlers that are still registered.
    pub fn set_profiling_enabled(&self, enabled: bool) {
        let previous = self.core.profiling_enabled.swap(enabled, Ordering::Relaxed);

        if previous != enabled {
            tracing::debug!(enabled, "profiling toggled");
        }
    }

    /// Wraps a function so that handlers can intercept its invocations.
    ///
    /// The wrapper takes the function's arguments as a single value (use a tuple for multiple
    /// arguments). See [`Instrumented`] for how invocations flow through the handlers.
    #[must_use]
    pub fn instrument<A, R, F>(
        &self,
        name: impl Into<HandlerName>,
        original: F,
    ) -> Instrumented<A, R>
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.instrument_method(name, move |_receiver: &(), args: A| original(args))
    }

    /// Wraps a method-like function that is invoked with a receiver of type `T`.
    ///
    /// The receiver is supplied on every call via [`Instrumented::call_with()`].
    #[must_use]
    pub fn instrument_method<A, R, T, F>(
        &self,
        name: impl Into<HandlerName>,
        original: F,
    ) -> Instrumented<A, R, T>
    where
        A: 'static,
        R: 'static,
        T: ?Sized + 'static,
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        Instrumented::new(name.into(), Callee::Plain(Box::new(original)), self)
    }

    /// Instruments many methods of a method table at once.
    ///
    /// For each `(method_key, name)` pair in `mapping`, the method stored under `method_key`
    /// is replaced with a wrapper instrumented under `name`. Already-instrumented methods are
    /// wrapped again, with the existing wrapper acting as the original function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMethod`] if the mapping names a key that is not in the table.
    /// The mapping is validated up front, so on error the table is left unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use wiretap::{MethodTable, Registry};
    ///
    /// struct Store {
    ///     items: Vec<u32>,
    /// }
    ///
    /// let registry = Registry::builder().instrumentation(true).build();
    ///
    /// let mut methods = MethodTable::<u32, Option<u32>, Store>::new();
    /// methods.insert("first_above", |store: &Store, min: u32| {
    ///     store.items.iter().copied().find(|x| *x > min)
    /// });
    ///
    /// registry
    ///     .instrument_methods(&mut methods, [("first_above", "store_scan")])
    ///     .unwrap();
    ///
    /// let store = Store {
    ///     items: vec![1, 5, 9],
    /// };
    ///
    /// assert_eq!(methods.call_with("first_above", &store, 4), Some(Some(5)));
    /// ```
    pub fn instrument_methods<A, R, T, K, N>(
        &self,
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
        let mapping = mapping
            .into_iter()
            .map(|(key, name)| (key.into(), name.into()))
            .collect::<Vec<(String, HandlerName)>>();

        if let Some((key, _)) = mapping.iter().find(|(key, _)| !table.contains(key)) {
            return Err(Error::UnknownMethod { key: key.clone() });
        }

        for (key, name) in mapping {
            table.replace(&key, |method| {
                Method::Instrumented(Instrumented::new(name, method.into_callee(), self))
            });
        }

        Ok(())
    }

    /// Attaches a handler that intercepts every function instrumented under `name`.
    ///
    /// Aggregate handlers are looked up on every call, so this affects existing instrumented
    /// functions starting with their next invocation. Aggregate handlers run in attachment
    /// order, outside any handlers attached to individual functions.
    pub fn attach_aggregate_handler(&self, name: impl Into<HandlerName>, handler: Handler) {
        let name = name.into();
        tracing::trace!(name = %name, "attaching aggregate handler");

        attach(&self.core.aggregate_handlers, name, handler);
    }

    /// Detaches a previously attached aggregate handler.
    ///
    /// Does nothing if the handler is not attached under this name.
    pub fn detach_aggregate_handler(&self, name: &str, handler: &Handler) {
        let detached = detach(&self.core.aggregate_handlers, name, handler);
        tracing::trace!(name, detached, "detaching aggregate handler");
    }

    /// The number of aggregate handlers currently attached under `name`.
    #[must_use]
    pub fn aggregate_handler_count(&self, name: &str) -> usize {
        count(&self.core.aggregate_handlers, name)
    }

    /// A snapshot of the aggregate handlers currently attached under `name`.
    pub(crate) fn aggregate_handlers(&self, name: &str) -> Arc<[Handler]> {
        let handlers = self
            .core
            .aggregate_handlers
            .read()
            .expect(ERR_POISONED_LOCK);

        Arc::clone(
            handlers
                .get(name)
                .unwrap_or(&self.core.no_aggregate_handlers),
        )
    }

    /// Starts a profiling session.
    ///
    /// Every profile handler attached under `name` is started, most recently attached first.
    /// The returned session stops them in attachment order when [`ProfileSession::stop()`]
    /// is called.
    ///
    /// If profiling is disabled or no handlers are attached under `name`, returns a session
    /// that does nothing when stopped.
    ///
    /// # Example
    ///
    /// ```
    /// use wiretap::{ProfileHandler, Registry};
    ///
    /// let registry = Registry::builder().profiling(true).build();
    ///
    /// registry.attach_profile_handler(
    ///     "image_decode",
    ///     ProfileHandler::new(|name, _state| {
    ///         let name = name.to_owned();
    ///         move || println!("{name} finished")
    ///     }),
    /// );
    ///
    /// let session = registry.profile("image_decode");
    /// // ... the decoding happens elsewhere, e.g. on another thread ...
    /// session.stop();
    /// ```
    pub fn profile(&self, name: &str) -> ProfileSession {
        self.start_profile(name, None)
    }

    /// Starts a profiling session, passing `state` to every profile handler.
    ///
    /// Handlers receive the state as `&dyn Any` and can downcast it to `S`.
    pub fn profile_with_state<S>(&self, name: &str, state: &S) -> ProfileSession
    where
        S: Any,
    {
        self.start_profile(name, Some(state))
    }

    fn start_profile(&self, name: &str, state: Option<&dyn Any>) -> ProfileSession {
        if !self.is_profiling_enabled() {
            return ProfileSession::noop();
        }

        let handlers = {
            let map = self.core.profile_handlers.read().expect(ERR_POISONED_LOCK);

            match map.get(name) {
                Some(handlers) if !handlers.is_empty() => Arc::clone(handlers),
                _ => return ProfileSession::noop(),
            }
        };

        // Start in reverse attachment order, then flip the callbacks so they stop in
        // attachment order.
        let mut stop_callbacks = handlers
            .iter()
            .rev()
            .map(|handler| handler.start(name, state))
            .collect::<Vec<_>>();

        stop_callbacks.reverse();

        ProfileSession::new(stop_callbacks)
    }

    /// Attaches a handler that observes every profiling session started under `name`.
    ///
    /// Does nothing if profiling is disabled.
    pub fn attach_profile_handler(&self, name: impl Into<HandlerName>, handler: ProfileHandler) {
        if !self.is_profiling_enabled() {
            return;
        }

        let name = name.into();
        tracing::trace!(name = %name, "attaching profile handler");

        attach(&self.core.profile_handlers, name, handler);
    }

    /// Detaches a previously attached profile handler.
    ///
    /// Does nothing if profiling is disabled or if the handler is not attached under this name.
    pub fn detach_profile_handler(&self, name: &str, handler: &ProfileHandler) {
        if !self.is_profiling_enabled() {
            return;
        }

        let detached = detach(&self.core.profile_handlers, name, handler);
        tracing::trace!(name, detached, "detaching profile handler");
    }

    /// The number of profile handlers currently attached under `name`.
    #[must_use]
    pub fn profile_handler_count(&self, name: &str) -> usize {
        count(&self.core.profile_handlers, name)
    }
}

fn attach<H>(map: &RwLock<HandlerMap<H>>, name: HandlerName, handler: H)
where
    H: Clone,
{
    let mut map = map.write().expect(ERR_POISONED_LOCK);

    let handlers = map.entry(name).or_insert_with(|| Arc::from(Vec::new()));

    let mut updated = handlers.to_vec();
    updated.push(handler);

    *handlers = Arc::from(updated);
}

/// Removes the first handler equal to `handler`. Returns whether anything was removed.
fn detach<H>(map: &RwLock<HandlerMap<H>>, name: &str, handler: &H) -> bool
where
    H: Clone + PartialEq,
{
    let mut map = map.write().expect(ERR_POISONED_LOCK);

    let Some(handlers) = map.get_mut(name) else {
        return false;
    };

    let Some(position) = handlers.iter().position(|candidate| candidate == handler) else {
        return false;
    };

    let mut updated = handlers.to_vec();
    updated.remove(position);

    *handlers = Arc::from(updated);
    true
}

fn count<H>(map: &RwLock<HandlerMap<H>>, name: &str) -> usize {
    map.read()
        .expect(ERR_POISONED_LOCK)
        .get(name)
        .map_or(0, |handlers| handlers.len())
}
