//! Compiled script handles

use std::fmt;

use crate::engine::Engine;
use crate::error::{Error, HandleKind, Result};
use crate::instance::{self, EngineInstance, InstanceRef};
use crate::scope::GlobalScope;

/// A script compiled once and runnable against any scope of its instance.
///
/// Holds its own reference to the compiled form, independent of any scope
/// cache. Running it also seeds the target scope's cache, so a later
/// `evaluate` of the same source in that scope skips compilation.
pub struct CompiledScript<E: Engine> {
    instance: InstanceRef<E>,
    compiled: Option<E::Unbound>,
    cache_key: String,
}

impl<E: Engine> CompiledScript<E> {
    /// Compile `source` under `instance`.
    pub fn compile(instance: &EngineInstance<E>, source: &str) -> Result<Self> {
        let core = instance.core()?;
        let compiled = core.engine()?.compile(None, source)?;
        tracing::debug!(len = source.len(), "script compiled");

        Ok(Self {
            instance: instance.downgrade()?,
            compiled: Some(compiled),
            cache_key: source.to_string(),
        })
    }

    /// Run against `scope`, returning the result as text.
    pub fn run(&self, scope: &GlobalScope<E>) -> Result<String> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or(Error::InvalidHandle(HandleKind::Script))?;
        if !scope.is_live() {
            return Err(Error::InvalidHandle(HandleKind::Scope));
        }
        instance::upgrade(&self.instance)?;
        if !scope.same_instance(&self.instance) {
            return Err(Error::CrossInstance);
        }

        scope.run_compiled(compiled, &self.cache_key)
    }

    /// Source text the script was compiled from
    pub fn source(&self) -> &str {
        &self.cache_key
    }

    /// `false` once disposed
    pub fn is_live(&self) -> bool {
        self.compiled.is_some()
    }

    /// Release the compiled form. Idempotent.
    pub fn dispose(&mut self) {
        if self.compiled.take().is_some() {
            tracing::debug!(len = self.cache_key.len(), "script disposed");
        }
    }
}

impl<E: Engine> fmt::Debug for CompiledScript<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("live", &self.is_live())
            .field("source_len", &self.cache_key.len())
            .finish()
    }
}
