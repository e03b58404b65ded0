//! Engine seam
//!
//! The bridge never looks inside the execution engine. Everything it needs
//! (heaps, realms, compilation, property access, calls) goes through the
//! [`Engine`] trait, so the lifecycle, cache, path and trampoline logic is
//! written once and shared by every backend.
//!
//! Backends report failures as [`Raised`]. They never format messages
//! themselves; [`crate::capture`] turns a `Raised` into the final string.

use crate::config::InstanceOptions;
use crate::host::HostLink;

/// Character-set data handed to [`Engine::initialize_platform`]
#[derive(Debug, Clone, Copy)]
pub enum IcuData {
    /// No explicit data; the backend uses its default discovery
    Default,
    /// Raw data loaded by the bridge
    Bytes(&'static [u8]),
}

/// What an engine value looks like from the bridge's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Non-callable object
    Object,
    /// Callable object
    Function,
    /// Strings, numbers, booleans and every other primitive
    Primitive,
}

impl ValueKind {
    /// `null` or `undefined`
    #[inline]
    pub fn is_nullish(self) -> bool {
        matches!(self, ValueKind::Undefined | ValueKind::Null)
    }

    /// Any object, callable or not
    #[inline]
    pub fn is_object(self) -> bool {
        matches!(self, ValueKind::Object | ValueKind::Function)
    }
}

/// A failed engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raised {
    /// An exception is pending
    Exception {
        /// String form of the exception value, if it has one
        message: Option<String>,
        /// Diagnostic context (source line, position), if available
        detail: Option<String>,
    },
    /// The operation failed without leaving an exception behind
    NotPending,
}

impl Raised {
    /// Exception with a message and no diagnostic
    pub fn message(message: impl Into<String>) -> Self {
        Raised::Exception {
            message: Some(message.into()),
            detail: None,
        }
    }
}

/// Result of a backend operation
pub type EngineResult<T> = std::result::Result<T, Raised>;

/// An execution engine instance: one heap, one allocator.
///
/// Associated handle types must stay valid independently of any stack
/// scope (persistent handles), since the bridge stores them in caches and
/// registration tables between calls.
pub trait Engine: Sized + 'static {
    /// Persistent handle to one global environment
    type Realm;
    /// Compiled script not tied to any realm
    type Unbound: Clone;
    /// Engine value
    type Value: Clone;
    /// Engine object
    type Object: Clone;

    /// Process-wide setup. Called at most once per process, behind the
    /// bridge's per-backend initialization gate.
    fn initialize_platform(icu: IcuData) -> std::result::Result<(), String>;

    /// Allocate a fresh heap and its allocator.
    fn new_instance(options: &InstanceOptions) -> std::result::Result<Self, String>;

    /// Create a new global environment on this heap.
    fn new_realm(&mut self) -> EngineResult<Self::Realm>;

    /// Global object of a realm.
    fn global(&mut self, realm: &Self::Realm) -> Self::Object;

    /// Compile `source`. With no realm the backend compiles against a
    /// throwaway one; the result must be rebindable to any realm of this
    /// instance either way.
    fn compile(&mut self, realm: Option<&Self::Realm>, source: &str)
        -> EngineResult<Self::Unbound>;

    /// Bind `script` to `realm` and run it.
    fn run(&mut self, realm: &Self::Realm, script: &Self::Unbound) -> EngineResult<Self::Value>;

    /// `object[key]`
    fn get(&mut self, realm: &Self::Realm, object: &Self::Object, key: &str)
        -> EngineResult<Self::Value>;

    /// `object[key] = value`
    fn set(
        &mut self,
        realm: &Self::Realm,
        object: &Self::Object,
        key: &str,
        value: &Self::Value,
    ) -> EngineResult<()>;

    /// Fresh empty object.
    fn new_object(&mut self, realm: &Self::Realm) -> Self::Object;

    /// String value.
    fn string(&mut self, text: &str) -> Self::Value;

    /// Number value.
    fn number(&mut self, value: f64) -> Self::Value;

    /// `undefined`.
    fn undefined(&mut self) -> Self::Value;

    /// Classify a value.
    fn kind(&mut self, value: &Self::Value) -> ValueKind;

    /// View a value as an object, if it is one.
    fn as_object(&mut self, value: &Self::Value) -> Option<Self::Object>;

    /// View an object as a value.
    fn object_value(&mut self, object: &Self::Object) -> Self::Value;

    /// String conversion (`String(value)`). `None` if conversion throws.
    fn to_utf8(&mut self, realm: &Self::Realm, value: &Self::Value) -> Option<String>;

    /// Create a function that, when called from script, converts its
    /// arguments with the same rule as [`crate::marshal`] and hands them to
    /// [`crate::host::dispatch`] together with `link`.
    fn new_host_function(
        &mut self,
        realm: &Self::Realm,
        name: &str,
        link: HostLink,
    ) -> EngineResult<Self::Value>;

    /// `function.call(receiver, ...args)`
    fn call(
        &mut self,
        realm: &Self::Realm,
        function: &Self::Value,
        receiver: &Self::Object,
        args: &[Self::Value],
    ) -> EngineResult<Self::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_predicates() {
        assert!(ValueKind::Undefined.is_nullish());
        assert!(ValueKind::Null.is_nullish());
        assert!(!ValueKind::Primitive.is_nullish());
        assert!(ValueKind::Function.is_object());
        assert!(ValueKind::Object.is_object());
        assert!(!ValueKind::Null.is_object());
    }
}
