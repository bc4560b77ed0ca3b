use crate::{Error, Registry, Result};

/// Creates instances of [`Registry`].
///
/// Use `Registry::builder()` to create a new instance of this builder.
///
/// Both settings default to `cfg!(debug_assertions)`: development and test builds intercept
/// and profile, release builds do neither unless the embedding application opts in.
#[derive(Debug)]
#[must_use]
pub struct RegistryBuilder {
    instrumentation: bool,
    profiling: bool,
}

impl RegistryBuilder {
    pub(crate) fn new() -> Self {
        Self {
            instrumentation: cfg!(debug_assertions),
            profiling: cfg!(debug_assertions),
        }
    }

    /// Sets whether functions instrumented through the registry build handler chains.
    ///
    /// If disabled, [`Registry::instrument()`] returns passthrough wrappers that call the
    /// original function directly and ignore attached handlers. This cannot be changed after
    /// the registry is built.
    pub fn instrumentation(self, enabled: bool) -> Self {
        Self {
            instrumentation: enabled,
            ..self
        }
    }

    /// Sets the initial value of the profiling enable flag.
    ///
    /// Unlike instrumentation, profiling can be toggled at any time via
    /// [`Registry::set_profiling_enabled()`].
    pub fn profiling(self, enabled: bool) -> Self {
        Self {
            profiling: enabled,
            ..self
        }
    }

    /// Builds an isolated registry.
    ///
    /// Handlers attached to this registry only affect functions instrumented through it
    /// and sessions profiled through it.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry::new(self.instrumentation, self.profiling)
    }

    /// Installs the configuration as the process-wide registry used by the free functions
    /// of this crate (e.g. [`instrument()`][crate::instrument]).
    ///
    /// This must happen before anything touches the process-wide registry, typically
    /// as the first thing in `main()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GlobalAlreadyInitialized`] if the process-wide registry has already
    /// been initialized, either by a previous call to this method or by first use.
    pub fn build_global(self) -> Result<()> {
        let instrumentation = self.instrumentation;
        let profiling = self.profiling;

        Registry::install_global(self.build())
            .map_err(|_rejected| Error::GlobalAlreadyInitialized)?;

        tracing::debug!(
            instrumentation,
            profiling,
            "installed global wiretap registry"
        );

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_debug_assertions() {
        let builder = RegistryBuilder::new();

        assert_eq!(builder.instrumentation, cfg!(debug_assertions));
        assert_eq!(builder.profiling, cfg!(debug_assertions));
    }

    #[test]
    fn settings_are_applied() {
        let registry = Registry::builder()
            .instrumentation(false)
            .profiling(true)
            .build();

        assert!(!registry.is_instrumentation_enabled());
        assert!(registry.is_profiling_enabled());

        let registry = Registry::builder()
            .instrumentation(true)
            .profiling(false)
            .build();

        assert!(registry.is_instrumentation_enabled());
        assert!(!registry.is_profiling_enabled());
    }
}
