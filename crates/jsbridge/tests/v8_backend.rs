//! End-to-end tests against the V8 backend

#![cfg(feature = "v8")]

use jsbridge::backend::v8::V8Engine;
use jsbridge::host::METADATA_MISSING;
use jsbridge::{platform, EngineInstance, Error, GlobalScope, HostOutcome, InitOptions, InstanceOptions};
use jsbridge_testkit::SpyRegistry;
use pretty_assertions::assert_eq;

fn init() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();

    platform::initialize::<V8Engine>(&InitOptions::default()).unwrap();
}

fn instance() -> EngineInstance<V8Engine> {
    init();
    EngineInstance::new(&InstanceOptions::default()).unwrap()
}

fn scope_of(instance: &EngineInstance<V8Engine>) -> GlobalScope<V8Engine> {
    instance.create_scope().unwrap()
}

#[test]
fn test_platform_is_ready() {
    init();
    assert!(platform::is_initialized::<V8Engine>());
}

#[test]
fn test_globals_and_closures() {
    let instance = instance();
    let scope = scope_of(&instance);

    scope.set_global_string("cfg.name", "demo").unwrap();
    scope.set_global_number("cfg.port", 8080.0).unwrap();
    assert_eq!(scope.evaluate("cfg.name").unwrap(), "demo");
    assert_eq!(scope.evaluate("cfg.port + 1").unwrap(), "8081");

    scope
        .add_function("greet", |args| Ok(Some(format!("hello {}", args[0]))))
        .unwrap();
    assert_eq!(scope.evaluate("greet('world')").unwrap(), "hello world");
    assert_eq!(scope.evaluate("greet(cfg.name)").unwrap(), "hello demo");
}

#[test]
fn test_undefined_result_is_empty() {
    let instance = instance();
    let scope = scope_of(&instance);
    assert_eq!(scope.evaluate("var x = 1").unwrap(), "");
    assert_eq!(scope.evaluate("x").unwrap(), "1");
}

#[test]
fn test_reference_error_is_captured() {
    let instance = instance();
    let scope = scope_of(&instance);

    let Err(Error::Exception(text)) = scope.evaluate("undefinedVar") else {
        panic!("expected an exception");
    };
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("ReferenceError: undefinedVar is not defined"));
    let detail = lines.next().unwrap();
    assert!(detail.contains("undefinedVar is not defined"), "{detail}");
}

#[test]
fn test_syntax_error_is_captured() {
    let instance = instance();
    let scope = scope_of(&instance);

    let Err(Error::Exception(text)) = scope.evaluate("var = 1") else {
        panic!("expected an exception");
    };
    assert!(text.starts_with("SyntaxError"), "{text}");
    assert_eq!(scope.cached_scripts(), 0);
}

#[test]
fn test_host_failure_is_thrown_into_script() {
    let instance = instance();
    let scope = scope_of(&instance);
    scope
        .add_function("fails", |_| Err("bad input".to_string()))
        .unwrap();

    assert_eq!(
        scope.evaluate("try { fails() } catch (e) { 'caught ' + e }").unwrap(),
        "caught bad input"
    );
}

#[test]
fn test_compiled_script_runs_in_two_scopes() {
    let instance = instance();
    let first = scope_of(&instance);
    let second = scope_of(&instance);

    let script = instance.compile("1+1").unwrap();
    assert_eq!(script.run(&first).unwrap(), "2");
    assert_eq!(script.run(&second).unwrap(), "2");
    assert_eq!(first.cached_scripts(), 1);
    assert_eq!(second.cached_scripts(), 1);
}

#[test]
fn test_scopes_are_isolated() {
    let instance = instance();
    let first = scope_of(&instance);
    let second = scope_of(&instance);

    first.evaluate("var shared = 'first'").unwrap();
    assert_eq!(second.evaluate("typeof shared").unwrap(), "undefined");
}

#[test]
fn test_stale_reference_after_reregistration() {
    init();
    let spy = SpyRegistry::new();
    spy.on(7, |args| HostOutcome::Value(format!("hello {}", args[0])));
    spy.on(8, |_| HostOutcome::Value("new".into()));
    let instance = EngineInstance::<V8Engine>::with_registry(&InstanceOptions::default(), spy.clone())
        .unwrap();
    let scope = scope_of(&instance);

    scope.register_host_function("greet", 7).unwrap();
    scope.evaluate("var saved = greet").unwrap();
    scope.register_host_function("greet", 8).unwrap();

    let Err(Error::Exception(text)) = scope.evaluate("saved('x')") else {
        panic!("expected an exception");
    };
    assert_eq!(text.lines().next(), Some(METADATA_MISSING));
    assert_eq!(scope.evaluate("greet('x')").unwrap(), "new");
    assert_eq!(spy.invoke_count(7), 0);
}

#[test]
fn test_call_function_passes_undefined() {
    let instance = instance();
    let scope = scope_of(&instance);
    scope
        .evaluate("function show(a, b) { return typeof a + '|' + typeof b + '|' + arguments.length; }")
        .unwrap();

    assert_eq!(
        scope.call_function("show", &[Some("x"), None]).unwrap(),
        "string|undefined|2"
    );
}

#[test]
fn test_run_in_scope_of_other_instance() {
    let first = instance();
    let second = instance();
    let foreign = scope_of(&second);

    let script = first.compile("1+1").unwrap();
    assert_eq!(script.run(&foreign), Err(Error::CrossInstance));
    assert_eq!(foreign.cached_scripts(), 0);
}
