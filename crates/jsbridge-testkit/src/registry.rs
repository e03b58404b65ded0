//! Spy host registry
//!
//! Records every invocation and release so tests can assert on the exact
//! traffic between the bridge and the host. Handlers are configured per id;
//! invoking an id without a handler fails.

use std::cell::RefCell;
use std::rc::Rc;

use jsbridge::host::{HostOutcome, HostRegistry};
use rustc_hash::FxHashMap;

type Handler = Rc<dyn Fn(&[String]) -> HostOutcome>;

/// Recording [`HostRegistry`]
#[derive(Default)]
pub struct SpyRegistry {
    handlers: RefCell<FxHashMap<u64, Handler>>,
    invocations: RefCell<Vec<(u64, Vec<String>)>>,
    releases: RefCell<Vec<u64>>,
}

impl SpyRegistry {
    /// Empty registry, ready to share with an engine instance
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Answer calls to `function_id` with `handler`.
    pub fn on<F>(&self, function_id: u64, handler: F)
    where
        F: Fn(&[String]) -> HostOutcome + 'static,
    {
        self.handlers
            .borrow_mut()
            .insert(function_id, Rc::new(handler));
    }

    /// Every `(id, args)` invocation so far, in order
    pub fn invocations(&self) -> Vec<(u64, Vec<String>)> {
        self.invocations.borrow().clone()
    }

    /// How often `function_id` was invoked
    pub fn invoke_count(&self, function_id: u64) -> usize {
        self.invocations
            .borrow()
            .iter()
            .filter(|(id, _)| *id == function_id)
            .count()
    }

    /// Every released id so far, in order
    pub fn releases(&self) -> Vec<u64> {
        self.releases.borrow().clone()
    }

    /// How often `function_id` was released
    pub fn release_count(&self, function_id: u64) -> usize {
        self.releases
            .borrow()
            .iter()
            .filter(|id| **id == function_id)
            .count()
    }
}

impl HostRegistry for SpyRegistry {
    fn invoke(&self, function_id: u64, args: &[String]) -> HostOutcome {
        self.invocations
            .borrow_mut()
            .push((function_id, args.to_vec()));

        let handler = self.handlers.borrow().get(&function_id).cloned();
        match handler {
            Some(handler) => handler(args),
            None => HostOutcome::error(format!("no handler for function {}", function_id)),
        }
    }

    fn release(&self, function_id: u64) {
        self.releases.borrow_mut().push(function_id);
    }
}
