//! Closure-backed host registry
//!
//! Hosts written in Rust register closures here instead of implementing
//! [`HostRegistry`] themselves. Ids are minted from a counter starting at 1
//! and are never reused within one registry.

use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::host::{HostOutcome, HostRegistry};

/// Signature of a host closure: positional string arguments in, optional
/// string result (or an error message) out.
pub type HostFn = dyn Fn(&[String]) -> Result<Option<String>, String> + Send + Sync + 'static;

/// Registry of host closures keyed by numeric id
pub struct NativeRegistry {
    functions: Mutex<FxHashMap<u64, Arc<HostFn>>>,
    next_id: AtomicU64,
}

impl NativeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            functions: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store `callback` and return its id.
    pub fn register<F>(&self, callback: F) -> u64
    where
        F: Fn(&[String]) -> Result<Option<String>, String> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.functions.lock().insert(id, Arc::new(callback));
        id
    }

    /// Remove `function_id`. Returns `false` if it was not registered.
    pub fn unregister(&self, function_id: u64) -> bool {
        match self.functions.lock().entry(function_id) {
            Entry::Occupied(entry) => {
                entry.remove();
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// `true` if `function_id` is registered
    pub fn contains(&self, function_id: u64) -> bool {
        self.functions.lock().contains_key(&function_id)
    }

    /// Number of registered closures
    pub fn len(&self) -> usize {
        self.functions.lock().len()
    }

    /// `true` if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.lock().is_empty()
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("count", &self.len())
            .finish()
    }
}

impl HostRegistry for NativeRegistry {
    fn invoke(&self, function_id: u64, args: &[String]) -> HostOutcome {
        // Clone out of the lock: the callback may register or drop functions.
        let callback = self.functions.lock().get(&function_id).cloned();
        let Some(callback) = callback else {
            return HostOutcome::error("native function not found");
        };

        match callback(args) {
            Ok(Some(result)) => HostOutcome::Value(result),
            Ok(None) => HostOutcome::Undefined,
            Err(message) => HostOutcome::Failed(Some(message)),
        }
    }

    fn release(&self, function_id: u64) {
        self.unregister(function_id);
    }

    fn as_native(&self) -> Option<&NativeRegistry> {
        Some(self)
    }
}
