//! Host functions and the trampoline
//!
//! A host function is a script-callable value whose body lives on the host
//! side, behind a [`HostRegistry`] and a numeric id the registry minted.
//! Each registration in a scope owns one [`HostBinding`]; the engine-side
//! function only holds a [`HostLink`] (a weak reference) to it. When the
//! registration is replaced or its scope disposed, the scope releases the
//! id through the registry and drops the binding, so any stale copy of the
//! function left in script land fails with [`METADATA_MISSING`] instead of
//! calling into a released id.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::native::NativeRegistry;

/// Thrown when a host function's binding is gone
pub const METADATA_MISSING: &str = "host function metadata missing";

/// Thrown when the registry fails without a message
pub const INVOCATION_FAILED: &str = "host function invocation failed";

/// Outcome of a host invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Success with a result string
    Value(String),
    /// Success without a result (`undefined` in script)
    Undefined,
    /// Failure, optionally with a message
    Failed(Option<String>),
}

impl HostOutcome {
    /// Failure with a message
    pub fn error(message: impl Into<String>) -> Self {
        HostOutcome::Failed(Some(message.into()))
    }
}

/// Host-side function registry.
///
/// Ids are opaque to the bridge; it only passes them through. Both methods
/// may be called while a script evaluation is in progress.
pub trait HostRegistry {
    /// Call function `function_id` with positional string arguments.
    fn invoke(&self, function_id: u64, args: &[String]) -> HostOutcome;

    /// The bridge no longer references `function_id`. Fire-and-forget.
    fn release(&self, function_id: u64);

    /// Closure registry behind this registry, if it accepts closures
    fn as_native(&self) -> Option<&NativeRegistry> {
        None
    }
}

/// Live link between one registration and the host registry
pub struct HostBinding {
    function_id: u64,
    registry: Rc<dyn HostRegistry>,
}

impl HostBinding {
    /// Bind `function_id` to `registry`
    pub fn new(function_id: u64, registry: Rc<dyn HostRegistry>) -> Self {
        Self {
            function_id,
            registry,
        }
    }

    /// Id passed to the registry
    pub fn function_id(&self) -> u64 {
        self.function_id
    }

    /// Tell the registry the bridge no longer references this id.
    pub(crate) fn release(&self) {
        tracing::debug!(function_id = self.function_id, "releasing host function");
        self.registry.release(self.function_id);
    }
}

impl fmt::Debug for HostBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBinding")
            .field("function_id", &self.function_id)
            .finish()
    }
}

/// Engine-side metadata of a host function
pub type HostLink = Weak<HostBinding>;

/// How the engine should complete a host-function call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Return the string, or `undefined` for `None`
    Return(Option<String>),
    /// Throw an exception with this message
    Throw(String),
}

/// Trampoline entry point, called by engine backends from their native
/// callback with the call's arguments already converted to strings.
///
/// `link` is `None` when the backend found no metadata attached to the
/// function at all.
pub fn dispatch(link: Option<&HostLink>, args: Vec<String>) -> Completion {
    let Some(binding) = link.and_then(Weak::upgrade) else {
        return Completion::Throw(METADATA_MISSING.to_string());
    };

    tracing::trace!(
        function_id = binding.function_id,
        argc = args.len(),
        "host function call"
    );

    match binding.registry.invoke(binding.function_id, &args) {
        HostOutcome::Value(result) => Completion::Return(Some(result)),
        HostOutcome::Undefined => Completion::Return(None),
        HostOutcome::Failed(message) => {
            tracing::warn!(
                function_id = binding.function_id,
                message = message.as_deref().unwrap_or(INVOCATION_FAILED),
                "host function failed"
            );
            Completion::Throw(message.unwrap_or_else(|| INVOCATION_FAILED.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        released: RefCell<Vec<u64>>,
        calls: RefCell<Vec<(u64, Vec<String>)>>,
    }

    impl HostRegistry for Recorder {
        fn invoke(&self, function_id: u64, args: &[String]) -> HostOutcome {
            self.calls.borrow_mut().push((function_id, args.to_vec()));
            match function_id {
                1 => HostOutcome::Value(format!("hello {}", args[0])),
                2 => HostOutcome::Undefined,
                3 => HostOutcome::error("boom"),
                _ => HostOutcome::Failed(None),
            }
        }

        fn release(&self, function_id: u64) {
            self.released.borrow_mut().push(function_id);
        }
    }

    fn bind(id: u64, registry: &Rc<Recorder>) -> Rc<HostBinding> {
        Rc::new(HostBinding::new(id, registry.clone() as Rc<dyn HostRegistry>))
    }

    #[test]
    fn test_dispatch_value() {
        let registry = Rc::new(Recorder::default());
        let binding = bind(1, &registry);
        let link = Rc::downgrade(&binding);

        let completion = dispatch(Some(&link), vec!["world".into()]);
        assert_eq!(completion, Completion::Return(Some("hello world".into())));
        assert_eq!(registry.calls.borrow()[0], (1, vec!["world".to_string()]));
    }

    #[test]
    fn test_dispatch_undefined() {
        let registry = Rc::new(Recorder::default());
        let binding = bind(2, &registry);
        assert_eq!(
            dispatch(Some(&Rc::downgrade(&binding)), vec![]),
            Completion::Return(None)
        );
    }

    #[test]
    fn test_dispatch_failure_messages() {
        let registry = Rc::new(Recorder::default());
        let with_message = bind(3, &registry);
        let without_message = bind(4, &registry);

        assert_eq!(
            dispatch(Some(&Rc::downgrade(&with_message)), vec![]),
            Completion::Throw("boom".into())
        );
        assert_eq!(
            dispatch(Some(&Rc::downgrade(&without_message)), vec![]),
            Completion::Throw(INVOCATION_FAILED.into())
        );
    }

    #[test]
    fn test_missing_metadata_skips_registry() {
        let registry = Rc::new(Recorder::default());
        assert_eq!(dispatch(None, vec![]), Completion::Throw(METADATA_MISSING.into()));

        let stale = Rc::downgrade(&bind(1, &registry));
        assert_eq!(
            dispatch(Some(&stale), vec!["x".into()]),
            Completion::Throw(METADATA_MISSING.into())
        );
        assert!(registry.calls.borrow().is_empty());
    }

    #[test]
    fn test_release_then_drop() {
        let registry = Rc::new(Recorder::default());
        let binding = bind(9, &registry);
        let link = Rc::downgrade(&binding);

        binding.release();
        drop(binding);

        assert!(link.upgrade().is_none());
        assert_eq!(*registry.released.borrow(), vec![9]);
    }

    #[test]
    fn test_drop_alone_does_not_release() {
        let registry = Rc::new(Recorder::default());
        drop(bind(5, &registry));
        assert!(registry.released.borrow().is_empty());
    }
}
