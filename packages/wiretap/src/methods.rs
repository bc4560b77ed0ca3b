use std::fmt;

use foldhash::{HashMap, HashMapExt};

use crate::{Callee, Handler, Instrumented, OriginalFn, Result};

/// One method in a [`MethodTable`], either a plain function or an instrumented one.
#[non_exhaustive]
pub enum Method<A, R, T = ()>
where
    T: ?Sized,
{
    /// A function that has not been instrumented.
    Plain(Box<OriginalFn<A, R, T>>),

    /// A function that has been instrumented, e.g. via
    /// [`Registry::instrument_methods()`][crate::Registry::instrument_methods].
    Instrumented(Instrumented<A, R, T>),
}

impl<A, R, T> Method<A, R, T>
where
    T: ?Sized,
{
    /// Invokes the method.
    ///
    /// # Panics
    ///
    /// Panics if the method is instrumented and a handler did not continue the chain.
    pub fn call_with(&self, receiver: &T, args: A) -> R {
        match self {
            Self::Plain(f) => f(receiver, args),
            Self::Instrumented(f) => f.call_with(receiver, args),
        }
    }

    /// Invokes the method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInvoked`][crate::Error::NotInvoked] if the method is instrumented
    /// and a handler did not continue the chain.
    pub fn try_call_with(&self, receiver: &T, args: A) -> Result<R> {
        match self {
            Self::Plain(f) => Ok(f(receiver, args)),
            Self::Instrumented(f) => f.try_call_with(receiver, args),
        }
    }

    /// The instrumented function, if this method has been instrumented.
    #[must_use]
    pub fn instrumented(&self) -> Option<&Instrumented<A, R, T>> {
        match self {
            Self::Plain(_) => None,
            Self::Instrumented(f) => Some(f),
        }
    }

    /// Attaches a handler to the method. Does nothing if the method is not instrumented.
    pub fn attach_handler(&self, handler: Handler) {
        if let Self::Instrumented(f) = self {
            f.attach_handler(handler);
        }
    }

    /// Detaches a handler from the method. Does nothing if the method is not instrumented.
    pub fn detach_handler(&self, handler: &Handler) {
        if let Self::Instrumented(f) = self {
            f.detach_handler(handler);
        }
    }

    pub(crate) fn into_callee(self) -> Callee<A, R, T> {
        match self {
            Self::Plain(f) => Callee::Plain(f),
            Self::Instrumented(f) => f.into_callee(),
        }
    }
}

impl<A, R, T> fmt::Debug for Method<A, R, T>
where
    T: ?Sized,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.debug_tuple("Plain").field(&"<fn>").finish(),
            Self::Instrumented(instrumented) => {
                f.debug_tuple("Instrumented").field(instrumented).finish()
            }
        }
    }
}

/// A set of methods with a common signature, keyed by method name.
///
/// This is the target of bulk instrumentation via
/// [`Registry::instrument_methods()`][crate::Registry::instrument_methods], which replaces
/// selected methods with instrumented wrappers.
///
/// All methods take a receiver of type `T` and arguments of type `A`, returning `R`.
pub struct MethodTable<A, R, T = ()>
where
    T: ?Sized,
{
    methods: HashMap<String, Method<A, R, T>>,
}

impl<A, R, T> MethodTable<A, R, T>
where
    T: ?Sized,
{
    /// Creates an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Adds a plain method, replacing any method previously stored under the same key.
    pub fn insert<F>(&mut self, key: impl Into<String>, f: F)
    where
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        self.methods.insert(key.into(), Method::Plain(Box::new(f)));
    }

    /// Adds an already-instrumented method, replacing any method previously stored under
    /// the same key.
    pub fn insert_instrumented(&mut self, key: impl Into<String>, f: Instrumented<A, R, T>) {
        self.methods.insert(key.into(), Method::Instrumented(f));
    }

    /// The method stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Method<A, R, T>> {
        self.methods.get(key)
    }

    /// Whether a method is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.methods.contains_key(key)
    }

    /// Invokes the method stored under `key`, returning `None` if there is no such method.
    ///
    /// # Panics
    ///
    /// Panics if the method is instrumented and a handler did not continue the chain.
    pub fn call_with(&self, key: &str, receiver: &T, args: A) -> Option<R> {
        self.get(key).map(|method| method.call_with(receiver, args))
    }

    /// The number of methods in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table has no methods.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// The keys of all methods in the table, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Replaces the method stored under `key` with the result of `f`.
    /// Does nothing if there is no such method.
    pub(crate) fn replace(
        &mut self,
        key: &str,
        f: impl FnOnce(Method<A, R, T>) -> Method<A, R, T>,
    ) {
        if let Some((key, method)) = self.methods.remove_entry(key) {
            self.methods.insert(key, f(method));
        }
    }
}

impl<A, R, T> Default for MethodTable<A, R, T>
where
    T: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R, T> fmt::Debug for MethodTable<A, R, T>
where
    T: ?Sized,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::{Arc, Mutex};

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{Error, Registry};

    assert_impl_all!(MethodTable<u32, u32, String>: Send, Sync);

    struct Account {
        balance: i64,
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_handler(log: &Log, label: &'static str) -> Handler {
        let log = Arc::clone(log);

        Handler::new(move |name, proceed| {
            log.lock().unwrap().push(format!("{label}:{name}"));
            proceed.proceed();
        })
    }

    fn account_methods() -> MethodTable<i64, i64, Account> {
        let mut methods = MethodTable::new();
        methods.insert("deposit", |account: &Account, amount: i64| {
            account.balance + amount
        });
        methods.insert("withdraw", |account: &Account, amount: i64| {
            account.balance - amount
        });
        methods
    }

    fn enabled_registry() -> Registry {
        Registry::builder().instrumentation(true).build()
    }

    #[test]
    fn plain_methods_are_callable() {
        let methods = account_methods();
        let account = Account { balance: 100 };

        assert_eq!(methods.len(), 2);
        assert!(!methods.is_empty());
        assert_eq!(methods.call_with("deposit", &account, 5), Some(105));
        assert_eq!(methods.call_with("withdraw", &account, 5), Some(95));
        assert_eq!(methods.call_with("close", &account, 5), None);
    }

    #[test]
    fn instrument_methods_replaces_mapped_methods_only() {
        let registry = enabled_registry();
        let log = Log::default();
        let mut methods = account_methods();

        registry
            .instrument_methods(&mut methods, [("deposit", "account_deposit")])
            .unwrap();

        registry.attach_aggregate_handler("account_deposit", logging_handler(&log, "aggregate"));

        let deposit = methods.get("deposit").unwrap();
        assert_eq!(deposit.instrumented().map(Instrumented::name), Some("account_deposit"));
        assert!(methods.get("withdraw").unwrap().instrumented().is_none());

        let account = Account { balance: 1 };
        assert_eq!(methods.call_with("deposit", &account, 2), Some(3));
        assert_eq!(methods.call_with("withdraw", &account, 2), Some(-1));

        assert_eq!(*log.lock().unwrap(), vec!["aggregate:account_deposit"]);
    }

    #[test]
    fn instance_handlers_attach_through_method() {
        let registry = enabled_registry();
        let log = Log::default();
        let mut methods = account_methods();

        registry
            .instrument_methods(
                &mut methods,
                [("deposit", "account_deposit"), ("withdraw", "account_withdraw")],
            )
            .unwrap();

        let handler = logging_handler(&log, "instance");
        methods.get("withdraw").unwrap().attach_handler(handler.clone());

        let account = Account { balance: 10 };
        methods.call_with("deposit", &account, 1);
        methods.call_with("withdraw", &account, 1);

        methods.get("withdraw").unwrap().detach_handler(&handler);
        methods.call_with("withdraw", &account, 1);

        assert_eq!(*log.lock().unwrap(), vec!["instance:account_withdraw"]);
    }

    #[test]
    fn unknown_method_key_leaves_table_unchanged() {
        let registry = enabled_registry();
        let mut methods = account_methods();

        let result = registry.instrument_methods(
            &mut methods,
            [("deposit", "account_deposit"), ("close", "account_close")],
        );

        assert!(matches!(result, Err(Error::UnknownMethod { ref key }) if key == "close"));
        assert!(methods.get("deposit").unwrap().instrumented().is_none());
    }

    #[test]
    fn instrumenting_twice_composes_wrappers() {
        let registry = enabled_registry();
        let log = Log::default();
        let mut methods = account_methods();

        registry
            .instrument_methods(&mut methods, [("deposit", "inner")])
            .unwrap();
        methods
            .get("deposit")
            .unwrap()
            .attach_handler(logging_handler(&log, "first"));

        registry
            .instrument_methods(&mut methods, [("deposit", "outer")])
            .unwrap();
        methods
            .get("deposit")
            .unwrap()
            .attach_handler(logging_handler(&log, "second"));

        let account = Account { balance: 0 };
        assert_eq!(methods.call_with("deposit", &account, 7), Some(7));

        assert_eq!(*log.lock().unwrap(), vec!["second:outer", "first:inner"]);
    }

    #[test]
    fn instrumenting_twice_returns_inner_chain_failure_as_error() {
        let registry = enabled_registry();
        let mut methods = account_methods();

        registry
            .instrument_methods(&mut methods, [("deposit", "inner")])
            .unwrap();
        methods
            .get("deposit")
            .unwrap()
            .attach_handler(Handler::new(|_, _proceed| {}));

        registry
            .instrument_methods(&mut methods, [("deposit", "outer")])
            .unwrap();

        let deposit = methods.get("deposit").unwrap();
        let account = Account { balance: 0 };

        let result = deposit.try_call_with(&account, 7);
        assert!(matches!(result, Err(Error::NotInvoked { ref name }) if name == "inner"));

        deposit.attach_handler(logging_handler(&Log::default(), "outer"));

        let result = deposit.try_call_with(&account, 7);
        assert!(matches!(result, Err(Error::NotInvoked { ref name }) if name == "inner"));
    }

    #[test]
    fn plain_method_ignores_handlers() {
        let log = Log::default();
        let methods = account_methods();

        let withdraw = methods.get("withdraw").unwrap();
        withdraw.attach_handler(logging_handler(&log, "ignored"));

        assert_eq!(withdraw.call_with(&Account { balance: 3 }, 1), 2);
        assert!(withdraw.try_call_with(&Account { balance: 3 }, 1).is_ok());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn insert_instrumented_and_keys() {
        let registry = enabled_registry();
        let mut methods = MethodTable::<(), &'static str>::default();

        methods.insert_instrumented("greet", registry.instrument("greet", |()| "hello"));
        methods.insert("wave", |_: &(), ()| "o/");

        let mut keys = methods.keys().collect::<Vec<_>>();
        keys.sort_unstable();

        assert_eq!(keys, vec!["greet", "wave"]);
        assert!(methods.contains("greet"));
        assert!(methods.get("greet").unwrap().instrumented().is_some());
        assert_eq!(methods.call_with("greet", &(), ()), Some("hello"));
    }
}
