//! Global scopes
//!
//! A [`GlobalScope`] is one global object inside an engine instance,
//! together with its compiled-script cache and the table of host functions
//! registered on it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::cache::ScriptCache;
use crate::engine::{Engine, ValueKind};
use crate::error::{Error, HandleKind, Result};
use crate::host::HostBinding;
use crate::instance::{self, EngineInstance, InstanceCore, InstanceRef};
use crate::marshal;
use crate::path::{self, PropertyPath};

struct ScopeState<E: Engine> {
    realm: E::Realm,
    cache: RefCell<ScriptCache<E::Unbound>>,
    functions: RefCell<FxHashMap<String, Rc<HostBinding>>>,
}

/// One global environment inside an engine instance
pub struct GlobalScope<E: Engine> {
    instance: InstanceRef<E>,
    state: Option<ScopeState<E>>,
}

impl<E: Engine> GlobalScope<E> {
    /// Create a scope with a fresh global object.
    pub fn new(instance: &EngineInstance<E>) -> Result<Self> {
        let core = instance.core()?;
        let realm = core.engine()?.new_realm()?;
        tracing::debug!("scope created");

        Ok(Self {
            instance: Rc::downgrade(core),
            state: Some(ScopeState {
                realm,
                cache: RefCell::new(ScriptCache::new()),
                functions: RefCell::new(FxHashMap::default()),
            }),
        })
    }

    fn enter(&self) -> Result<(Rc<InstanceCore<E>>, &ScopeState<E>)> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::InvalidHandle(HandleKind::Scope))?;
        let core = instance::upgrade(&self.instance)?;
        Ok((core, state))
    }

    /// Compile (or reuse) and run `source`, returning the result as text.
    ///
    /// `undefined` results come back as the empty string.
    pub fn evaluate(&self, source: &str) -> Result<String> {
        let (core, state) = self.enter()?;
        let mut engine = core.engine()?;

        let cached = state.cache.borrow().get(source);
        let script = match cached {
            Some(script) => {
                tracing::debug!(len = source.len(), "script cache hit");
                script
            }
            None => {
                tracing::debug!(len = source.len(), "script cache miss");
                let script = engine.compile(Some(&state.realm), source)?;
                state.cache.borrow_mut().insert(source, script.clone());
                script
            }
        };

        let value = engine.run(&state.realm, &script)?;
        Ok(marshal::value_to_utf8(&mut *engine, &state.realm, &value))
    }

    /// Run an already compiled script and cache it under `cache_key`.
    pub(crate) fn run_compiled(&self, script: &E::Unbound, cache_key: &str) -> Result<String> {
        let (core, state) = self.enter()?;
        let mut engine = core.engine()?;

        let value = engine.run(&state.realm, script)?;
        state.cache.borrow_mut().insert(cache_key, script.clone());
        Ok(marshal::value_to_utf8(&mut *engine, &state.realm, &value))
    }

    /// Assign a string at a dotted path, creating intermediate objects.
    pub fn set_global_string(&self, path: &str, value: &str) -> Result<()> {
        self.assign(path, |engine| engine.string(value))
    }

    /// Assign a number at a dotted path, creating intermediate objects.
    pub fn set_global_number(&self, path: &str, value: f64) -> Result<()> {
        self.assign(path, |engine| engine.number(value))
    }

    fn assign(&self, path: &str, make: impl FnOnce(&mut E) -> E::Value) -> Result<()> {
        let (core, state) = self.enter()?;
        let path = PropertyPath::parse(path)?;
        let mut engine = core.engine()?;

        let target = path::resolve(&mut *engine, &state.realm, &path)?;
        let value = make(&mut *engine);
        engine.set(&state.realm, &target, path.key(), &value)?;
        Ok(())
    }

    /// Install host function `function_id` at a dotted path.
    ///
    /// A registration already at `path` is released before the new one is
    /// installed. That removal stays in effect even if the new assignment
    /// then fails.
    pub fn register_host_function(&self, path: &str, function_id: u64) -> Result<()> {
        let (core, state) = self.enter()?;
        let parsed = PropertyPath::parse(path)?;
        let mut engine = core.engine()?;

        let target = path::resolve(&mut *engine, &state.realm, &parsed)?;
        let binding = Rc::new(HostBinding::new(function_id, Rc::clone(&core.registry)));
        let function = engine.new_host_function(&state.realm, parsed.key(), Rc::downgrade(&binding))?;

        let previous = state.functions.borrow_mut().remove(path);
        if let Some(previous) = previous {
            tracing::debug!(
                path,
                old = previous.function_id(),
                new = function_id,
                "replacing host function"
            );
            previous.release();
        }

        engine.set(&state.realm, &target, parsed.key(), &function)?;
        state
            .functions
            .borrow_mut()
            .insert(path.to_string(), binding);
        tracing::debug!(path, function_id, "host function registered");
        Ok(())
    }

    /// Register a Rust closure at `path` through the instance's
    /// [`NativeRegistry`](crate::NativeRegistry). Returns the minted id.
    pub fn add_function<F>(&self, path: &str, callback: F) -> Result<u64>
    where
        F: Fn(&[String]) -> std::result::Result<Option<String>, String> + Send + Sync + 'static,
    {
        let (core, _) = self.enter()?;
        let native = core
            .registry
            .as_native()
            .ok_or_else(|| Error::Host("host registry does not accept closures".to_string()))?;

        let function_id = native.register(callback);
        if let Err(e) = self.register_host_function(path, function_id) {
            native.unregister(function_id);
            return Err(e);
        }
        Ok(function_id)
    }

    /// Call a function stored directly on the global object.
    ///
    /// `None` arguments arrive as `undefined`.
    pub fn call_function(&self, name: &str, args: &[Option<&str>]) -> Result<String> {
        let (core, state) = self.enter()?;
        let mut engine = core.engine()?;

        let global = engine.global(&state.realm);
        let function = engine
            .get(&state.realm, &global, name)
            .map_err(|_| Error::FunctionNotFound)?;
        if engine.kind(&function) != ValueKind::Function {
            return Err(Error::FunctionNotFound);
        }

        let argv: Vec<E::Value> = args
            .iter()
            .map(|arg| marshal::to_value(&mut *engine, *arg))
            .collect();
        let value = engine.call(&state.realm, &function, &global, &argv)?;
        Ok(marshal::value_to_utf8(&mut *engine, &state.realm, &value))
    }

    /// Registered `(path, function_id)` pairs, sorted by path
    pub fn registered_functions(&self) -> Vec<(String, u64)> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let mut entries: Vec<_> = state
            .functions
            .borrow()
            .iter()
            .map(|(path, binding)| (path.clone(), binding.function_id()))
            .collect();
        entries.sort();
        entries
    }

    /// Number of cached compiled scripts
    pub fn cached_scripts(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.cache.borrow().len())
    }

    /// `true` if both handles were created under the same instance
    pub(crate) fn same_instance(&self, other: &InstanceRef<E>) -> bool {
        self.instance.ptr_eq(other)
    }

    /// `false` once disposed
    pub fn is_live(&self) -> bool {
        self.state.is_some()
    }

    /// Release the cache, every registration and the global object.
    /// Idempotent.
    pub fn dispose(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };

        state.cache.borrow_mut().clear();
        let released: Vec<_> = state.functions.borrow_mut().drain().collect();
        for (_, binding) in &released {
            binding.release();
        }
        tracing::debug!(functions = released.len(), "scope disposed");
        drop(released);
        drop(state);
    }
}

impl<E: Engine> Drop for GlobalScope<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: Engine> fmt::Debug for GlobalScope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalScope")
            .field("live", &self.is_live())
            .field("cached_scripts", &self.cached_scripts())
            .field("functions", &self.registered_functions())
            .finish()
    }
}
