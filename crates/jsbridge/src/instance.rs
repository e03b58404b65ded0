//! Engine instances
//!
//! An [`EngineInstance`] owns one engine heap and the host registry its
//! functions call into. It is the ownership root: scopes and compiled
//! scripts only keep a weak reference back, so once the instance is
//! disposed every handle created under it reports `invalid engine handle`.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::InstanceOptions;
use crate::engine::Engine;
use crate::error::{Error, HandleKind, Result};
use crate::host::HostRegistry;
use crate::native::NativeRegistry;
use crate::platform;
use crate::scope::GlobalScope;
use crate::script::CompiledScript;

/// Shared state behind an instance
pub(crate) struct InstanceCore<E: Engine> {
    engine: RefCell<E>,
    pub(crate) registry: Rc<dyn HostRegistry>,
}

impl<E: Engine> InstanceCore<E> {
    /// Exclusive engine access for the duration of one operation.
    ///
    /// Fails with [`Error::Busy`] when the engine is already executing
    /// further up the stack (a host function re-entering its own instance).
    pub(crate) fn engine(&self) -> Result<RefMut<'_, E>> {
        self.engine.try_borrow_mut().map_err(|_| Error::Busy)
    }
}

/// Weak reference held by scopes and scripts
pub(crate) type InstanceRef<E> = Weak<InstanceCore<E>>;

/// Upgrade an instance reference or report the instance as gone
pub(crate) fn upgrade<E: Engine>(instance: &InstanceRef<E>) -> Result<Rc<InstanceCore<E>>> {
    instance
        .upgrade()
        .ok_or(Error::InvalidHandle(HandleKind::Engine))
}

/// One engine heap with its allocator
pub struct EngineInstance<E: Engine> {
    core: Option<Rc<InstanceCore<E>>>,
}

impl<E: Engine> EngineInstance<E> {
    /// Create an instance whose host functions resolve through a fresh
    /// [`NativeRegistry`].
    ///
    /// Requires [`platform::initialize`] to have succeeded.
    pub fn new(options: &InstanceOptions) -> Result<Self> {
        Self::with_registry(options, Rc::new(NativeRegistry::new()))
    }

    /// Create an instance over a caller-supplied host registry.
    pub fn with_registry(options: &InstanceOptions, registry: Rc<dyn HostRegistry>) -> Result<Self> {
        if !platform::is_initialized::<E>() {
            return Err(Error::InstanceCreation(
                "engine platform is not initialized".to_string(),
            ));
        }

        let engine = E::new_instance(options).map_err(Error::InstanceCreation)?;
        tracing::debug!(?options, "engine instance created");

        Ok(Self {
            core: Some(Rc::new(InstanceCore {
                engine: RefCell::new(engine),
                registry,
            })),
        })
    }

    /// Create a global scope inside this instance.
    pub fn create_scope(&self) -> Result<GlobalScope<E>> {
        GlobalScope::new(self)
    }

    /// Compile `source` into a standalone script handle.
    pub fn compile(&self, source: &str) -> Result<CompiledScript<E>> {
        CompiledScript::compile(self, source)
    }

    /// Host registry behind this instance
    pub fn registry(&self) -> Result<Rc<dyn HostRegistry>> {
        Ok(Rc::clone(&self.core()?.registry))
    }

    /// Read access to the backend.
    pub fn with_engine<R>(&self, f: impl FnOnce(&E) -> R) -> Result<R> {
        let core = self.core()?;
        let engine = core.engine()?;
        Ok(f(&engine))
    }

    /// Release the heap. Idempotent; scopes and scripts created under this
    /// instance become invalid.
    pub fn dispose(&mut self) {
        if let Some(core) = self.core.take() {
            tracing::debug!("engine instance disposed");
            drop(core);
        }
    }

    /// `false` once disposed
    pub fn is_live(&self) -> bool {
        self.core.is_some()
    }

    pub(crate) fn core(&self) -> Result<&Rc<InstanceCore<E>>> {
        self.core
            .as_ref()
            .ok_or(Error::InvalidHandle(HandleKind::Engine))
    }

    pub(crate) fn downgrade(&self) -> Result<InstanceRef<E>> {
        Ok(Rc::downgrade(self.core()?))
    }
}

impl<E: Engine> Drop for EngineInstance<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: Engine> fmt::Debug for EngineInstance<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInstance")
            .field("live", &self.is_live())
            .finish()
    }
}
