//! Process-wide isolator instance.
//!
//! An [`IsolatorContext`] holds at most one isolator. `get` creates it on
//! first use, `set` installs or clears it. The [`global`] context backs the
//! free functions [`get`] and [`set`]; code that prefers injection can own a
//! context of its own.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::cache::ArtifactLoader;
use crate::config::IsolatorConfig;
use crate::error::LoadError;
use crate::host::Host;
use crate::proxy::SharedIsolator;

/// Builds the instance `get` installs when none is stored.
pub type IsolatorFactory = Box<dyn Fn() -> Result<SharedIsolator, LoadError> + Send + Sync>;

pub struct IsolatorContext {
    instance: Mutex<Option<SharedIsolator>>,
    factory: IsolatorFactory,
}

impl std::fmt::Debug for IsolatorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatorContext")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl IsolatorContext {
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<SharedIsolator, LoadError> + Send + Sync + 'static,
    {
        Self {
            instance: Mutex::new(None),
            factory: Box::new(factory),
        }
    }

    /// Context whose instance is loaded from the builtin host's live
    /// inventory.
    #[must_use]
    pub fn from_config(config: IsolatorConfig) -> Self {
        Self::new(move || {
            let host = Arc::new(Host::with_builtins(&config));
            let loader = ArtifactLoader::from_config(&config);
            let proxy = loader.instantiate(&config.class_name, host)?;
            Ok(Arc::new(proxy) as SharedIsolator)
        })
    }

    /// Return `candidate` untouched when supplied; otherwise the stored
    /// instance, creating it if absent.
    pub fn get(&self, candidate: Option<SharedIsolator>) -> Result<SharedIsolator, LoadError> {
        if let Some(candidate) = candidate {
            return Ok(candidate);
        }
        let mut instance = self.instance.lock();
        if let Some(existing) = instance.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let created = (self.factory)()?;
        *instance = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Install `instance`, or clear the stored one with `None`.
    pub fn set(&self, instance: Option<SharedIsolator>) {
        *self.instance.lock() = instance;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instance.lock().is_some()
    }
}

/// The process-wide context, configured from the environment.
pub fn global() -> &'static IsolatorContext {
    static GLOBAL: OnceLock<IsolatorContext> = OnceLock::new();
    GLOBAL.get_or_init(|| IsolatorContext::from_config(IsolatorConfig::from_env()))
}

/// [`IsolatorContext::get`] on the global context.
pub fn get(candidate: Option<SharedIsolator>) -> Result<SharedIsolator, LoadError> {
    global().get(candidate)
}

/// [`IsolatorContext::set`] on the global context.
pub fn set(instance: Option<SharedIsolator>) {
    global().set(instance);
}

/// An isolator held by one object, falling back to the global instance.
#[derive(Clone, Default)]
pub struct IsolatorSlot {
    isolator: Option<SharedIsolator>,
}

impl std::fmt::Debug for IsolatorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatorSlot")
            .field("overridden", &self.isolator.is_some())
            .finish()
    }
}

impl IsolatorSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The held isolator, or the global one.
    pub fn isolator(&self) -> Result<SharedIsolator, LoadError> {
        self.isolator_in(global())
    }

    /// The held isolator, or the one stored in `context`.
    pub fn isolator_in(&self, context: &IsolatorContext) -> Result<SharedIsolator, LoadError> {
        context.get(self.isolator.clone())
    }

    pub fn set_isolator(&mut self, isolator: Option<SharedIsolator>) {
        self.isolator = isolator;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use crate::proxy::{Arg, Isolator};
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(i64);

    impl Isolator for Fixed {
        fn call(&self, _name: &str, _args: &mut [Arg<'_>]) -> Result<Value, CallError> {
            Ok(Value::Int(self.0))
        }
    }

    fn counting_context() -> (IsolatorContext, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let context = IsolatorContext::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Fixed(n as i64)) as SharedIsolator)
        });
        (context, created)
    }

    #[test]
    fn get_creates_once() {
        let (context, created) = counting_context();
        assert!(!context.is_initialized());
        let a = context.get(None).unwrap();
        let b = context.get(None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(context.is_initialized());
    }

    #[test]
    fn explicit_candidate_leaves_state_alone() {
        let (context, created) = counting_context();
        let candidate: SharedIsolator = Arc::new(Fixed(42));
        let got = context.get(Some(Arc::clone(&candidate))).unwrap();
        assert!(Arc::ptr_eq(&got, &candidate));
        assert!(!context.is_initialized());
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn set_none_resets() {
        let (context, created) = counting_context();
        context.get(None).unwrap();
        context.set(None);
        assert!(!context.is_initialized());
        context.get(None).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_installs_instance() {
        let (context, created) = counting_context();
        let installed: SharedIsolator = Arc::new(Fixed(7));
        context.set(Some(Arc::clone(&installed)));
        let got = context.get(None).unwrap();
        assert!(Arc::ptr_eq(&got, &installed));
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn slot_prefers_its_own_isolator() {
        let (context, _) = counting_context();
        let mut slot = IsolatorSlot::new();
        let mut args: [Arg<'_>; 0] = [];
        let shared = slot.isolator_in(&context).unwrap();
        assert_eq!(shared.call("x", &mut args).unwrap(), Value::Int(0));

        slot.set_isolator(Some(Arc::new(Fixed(9))));
        let own = slot.isolator_in(&context).unwrap();
        assert_eq!(own.call("x", &mut args).unwrap(), Value::Int(9));

        slot.set_isolator(None);
        let back = slot.isolator_in(&context).unwrap();
        assert!(Arc::ptr_eq(&back, &shared));
    }
}
