//! Shared helpers for jsbridge integration tests

#![allow(dead_code)]

use std::rc::Rc;

use jsbridge::{EngineInstance, GlobalScope};
use jsbridge_testkit::{ScriptedEngine, SpyRegistry};

/// Route bridge logs to the test harness. Honors `RUST_LOG`.
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    // Ignore the error if another test already installed a subscriber
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Instance over a closure registry plus one scope
pub fn native_scope() -> (EngineInstance<ScriptedEngine>, GlobalScope<ScriptedEngine>) {
    init_test_logging();
    let instance = jsbridge_testkit::instance();
    let scope = instance.create_scope().expect("create scope");
    (instance, scope)
}

/// Instance over a fresh spy registry plus one scope
pub fn spy_scope() -> (
    Rc<SpyRegistry>,
    EngineInstance<ScriptedEngine>,
    GlobalScope<ScriptedEngine>,
) {
    init_test_logging();
    let spy = SpyRegistry::new();
    let instance = jsbridge_testkit::instance_with(spy.clone());
    let scope = instance.create_scope().expect("create scope");
    (spy, instance, scope)
}

/// Snapshot of one engine counter
pub fn compiles(instance: &EngineInstance<ScriptedEngine>) -> usize {
    instance.with_engine(|e| e.compile_count()).unwrap()
}

pub fn objects(instance: &EngineInstance<ScriptedEngine>) -> usize {
    instance.with_engine(|e| e.object_count()).unwrap()
}
