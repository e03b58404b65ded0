//! Process-wide engine initialization
//!
//! Engines keep static tables (character-set data, a background task
//! platform) that must be set up exactly once before the first instance is
//! created. [`initialize`] runs that setup behind a one-shot gate: the first
//! caller does the work, concurrent callers block until it finishes, and
//! every caller (then and later) sees the same stored outcome.
//!
//! Each backend type has its own gate, so initializing one engine says
//! nothing about another.

use std::any::TypeId;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::InitOptions;
use crate::engine::Engine;
use crate::error::{Error, Result};

/// One-shot initialization gate
#[derive(Debug, Default)]
pub struct InitGate {
    outcome: OnceCell<std::result::Result<(), String>>,
}

impl InitGate {
    /// Create an unopened gate
    pub const fn new() -> Self {
        Self {
            outcome: OnceCell::new(),
        }
    }

    /// Run `setup` if this is the first call, then report its outcome.
    pub fn run<F>(&self, setup: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), String>,
    {
        self.outcome
            .get_or_init(setup)
            .clone()
            .map_err(Error::Init)
    }

    /// `true` once setup has completed successfully
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }
}

static GATES: Lazy<Mutex<FxHashMap<TypeId, &'static InitGate>>> =
    Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Gate for one backend type. The table lock is released before the gate
/// runs, so setup never holds it.
fn gate_for(key: TypeId) -> &'static InitGate {
    *GATES
        .lock()
        .entry(key)
        .or_insert_with(|| Box::leak(Box::new(InitGate::new())))
}

/// Initialize the engine platform for backend `E`.
///
/// Safe to call any number of times from any thread.
pub fn initialize<E: Engine>(options: &InitOptions) -> Result<()> {
    gate_for(TypeId::of::<E>()).run(|| {
        let icu = options.load_icu_data().map_err(|e| match e {
            Error::Init(message) => message,
            other => other.to_string(),
        })?;
        tracing::debug!(?icu, "initializing engine platform");
        E::initialize_platform(icu).inspect_err(|message| {
            tracing::warn!(%message, "engine platform initialization failed");
        })
    })
}

/// `true` once [`initialize`] has succeeded for backend `E` in this process
pub fn is_initialized<E: Engine>() -> bool {
    gate_for(TypeId::of::<E>()).is_ready()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_setup_runs_once() {
        let gate = InitGate::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            gate.run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_ready());
    }

    #[test]
    fn test_failure_is_sticky() {
        let gate = InitGate::new();
        let err = gate.run(|| Err("no data".to_string())).unwrap_err();
        assert_eq!(err, Error::Init("no data".to_string()));

        // A later caller with a working setup still sees the first outcome.
        let err = gate.run(|| Ok(())).unwrap_err();
        assert_eq!(err, Error::Init("no data".to_string()));
        assert!(!gate.is_ready());
    }

    #[test]
    fn test_gates_are_keyed_per_backend() {
        struct First;
        struct Second;

        let first = gate_for(TypeId::of::<First>());
        assert!(std::ptr::eq(first, gate_for(TypeId::of::<First>())));

        first.run(|| Ok(())).unwrap();
        let second = gate_for(TypeId::of::<Second>());
        assert!(!std::ptr::eq(first, second));
        assert!(!second.is_ready());

        let calls = AtomicUsize::new(0);
        second
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_callers_share_outcome() {
        let gate = Arc::new(InitGate::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    gate.run(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err("racing failure".to_string())
                    })
                })
            })
            .collect();

        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result, Err(Error::Init("racing failure".to_string())));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
