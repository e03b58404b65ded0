//! Test support for jsbridge
//!
//! - [`ScriptedEngine`]: an in-process engine backend with inspection
//!   counters, so bridge behavior can be tested without a real engine
//! - [`SpyRegistry`]: a host registry that records every call
//!
//! The helpers below initialize the platform for the scripted backend on
//! first use; every test binary shares that one initialization.

#![warn(rust_2018_idioms)]

pub mod engine;
pub mod registry;
pub mod syntax;

use std::rc::Rc;

use jsbridge::{platform, EngineInstance, HostRegistry, InitOptions, InstanceOptions};

pub use engine::{JsValue, ObjectId, ScriptedEngine, ScriptedRealm};
pub use registry::SpyRegistry;

/// Initialize the platform for [`ScriptedEngine`]. Idempotent.
pub fn init() {
    platform::initialize::<ScriptedEngine>(&InitOptions::default())
        .expect("scripted platform initialization cannot fail");
}

/// Fresh instance over a closure registry
pub fn instance() -> EngineInstance<ScriptedEngine> {
    init();
    EngineInstance::new(&InstanceOptions::default()).expect("create scripted instance")
}

/// Fresh instance over `registry`
pub fn instance_with(registry: Rc<dyn HostRegistry>) -> EngineInstance<ScriptedEngine> {
    init();
    EngineInstance::with_registry(&InstanceOptions::default(), registry)
        .expect("create scripted instance")
}
