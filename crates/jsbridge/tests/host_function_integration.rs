//! Integration tests for host functions and the trampoline

mod common;

use std::rc::Rc;

use common::{native_scope, spy_scope};
use jsbridge::host::{INVOCATION_FAILED, METADATA_MISSING};
use jsbridge::{Error, HostOutcome};
use pretty_assertions::assert_eq;

#[test]
fn test_registered_function_round_trip() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(7, |args| HostOutcome::Value(format!("hello {}", args[0])));

    scope.register_host_function("greet", 7).unwrap();

    assert_eq!(scope.evaluate("greet('world')").unwrap(), "hello world");
    assert_eq!(spy.invocations(), vec![(7, vec!["world".to_string()])]);
}

#[test]
fn test_arguments_are_converted_to_strings() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(1, |args| HostOutcome::Value(args.join(",")));
    scope.register_host_function("echo", 1).unwrap();

    assert_eq!(
        scope
            .evaluate("echo(1, 'a', undefined, null, true, 2.5, {})")
            .unwrap(),
        "1,a,,null,true,2.5,[object Object]"
    );
}

#[test]
fn test_undefined_result() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(2, |_| HostOutcome::Undefined);
    scope.register_host_function("quiet", 2).unwrap();

    assert_eq!(scope.evaluate("typeof quiet()").unwrap(), "undefined");
    assert_eq!(scope.evaluate("quiet()").unwrap(), "");
}

#[test]
fn test_host_failures_become_exceptions() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(3, |_| HostOutcome::error("bad input"));
    spy.on(4, |_| HostOutcome::Failed(None));
    scope.register_host_function("fails", 3).unwrap();
    scope.register_host_function("failsQuietly", 4).unwrap();

    assert_eq!(
        scope.evaluate("fails()"),
        Err(Error::Exception("bad input".into()))
    );
    assert_eq!(
        scope.evaluate("failsQuietly()"),
        Err(Error::Exception(INVOCATION_FAILED.into()))
    );
}

#[test]
fn test_nested_registration_path() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(1, |args| HostOutcome::Value(args.concat()));
    scope.register_host_function("a.b.fn", 1).unwrap();

    assert_eq!(scope.evaluate("a.b.fn('x', 'y')").unwrap(), "xy");
    assert_eq!(scope.registered_functions(), vec![("a.b.fn".to_string(), 1)]);
}

#[test]
fn test_reregistration_releases_previous_id_once() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(1, |_| HostOutcome::Value("one".into()));
    spy.on(2, |_| HostOutcome::Value("two".into()));

    scope.register_host_function("a.b.fn", 1).unwrap();
    scope.register_host_function("a.b.fn", 2).unwrap();

    assert_eq!(spy.releases(), vec![1]);
    assert_eq!(scope.evaluate("a.b.fn()").unwrap(), "two");
    assert_eq!(spy.invoke_count(1), 0);
    assert_eq!(spy.invoke_count(2), 1);
    assert_eq!(scope.registered_functions(), vec![("a.b.fn".to_string(), 2)]);
}

#[test]
fn test_stale_function_value_is_rejected() {
    let (spy, _instance, scope) = spy_scope();
    spy.on(7, |_| HostOutcome::Value("old".into()));
    spy.on(8, |_| HostOutcome::Value("new".into()));

    scope.register_host_function("greet", 7).unwrap();
    scope.evaluate("var saved = greet").unwrap();
    scope.register_host_function("greet", 8).unwrap();

    assert_eq!(
        scope.evaluate("saved('x')"),
        Err(Error::Exception(METADATA_MISSING.into()))
    );
    assert_eq!(scope.evaluate("greet('x')").unwrap(), "new");
    assert_eq!(spy.invoke_count(7), 0);
}

#[test]
fn test_dispose_releases_every_registration() {
    let (spy, instance, mut scope) = spy_scope();
    scope.register_host_function("a", 1).unwrap();
    scope.register_host_function("b.c", 2).unwrap();
    scope.register_host_function("b.d", 3).unwrap();

    scope.dispose();

    let mut released = spy.releases();
    released.sort();
    assert_eq!(released, vec![1, 2, 3]);
    assert!(scope.registered_functions().is_empty());
    assert!(scope.evaluate("a()").is_err());

    // Other scopes of the instance are unaffected
    let other = instance.create_scope().unwrap();
    assert_eq!(other.evaluate("1+1").unwrap(), "2");
}

#[test]
fn test_dropping_scope_releases_registrations() {
    let (spy, _instance, scope) = spy_scope();
    scope.register_host_function("f", 11).unwrap();
    drop(scope);
    assert_eq!(spy.releases(), vec![11]);
}

#[test]
fn test_failed_registration_records_nothing() {
    let (spy, instance, scope) = spy_scope();
    scope.evaluate("var x = 'str'").unwrap();

    let err = scope.register_host_function("x.fn", 5).unwrap_err();

    assert_eq!(err, Error::PathConflict { segment: "x".into() });
    assert!(scope.registered_functions().is_empty());
    assert_eq!(instance.with_engine(|e| e.host_function_count()).unwrap(), 0);
    assert!(spy.releases().is_empty());
}

#[test]
fn test_replacement_stays_committed_when_assignment_fails() {
    let (spy, _instance, scope) = spy_scope();
    scope.evaluate("var box = {}").unwrap();
    scope.register_host_function("box.fn", 1).unwrap();
    scope.evaluate("freeze(box)").unwrap();

    let err = scope.register_host_function("box.fn", 2).unwrap_err();

    assert!(err.to_string().starts_with("TypeError"), "{err}");
    assert_eq!(spy.releases(), vec![1]);
    assert!(scope.registered_functions().is_empty());
    // The old function is still reachable but no longer bound
    assert_eq!(
        scope.evaluate("box.fn()"),
        Err(Error::Exception(METADATA_MISSING.into()))
    );
}

#[test]
fn test_reentering_same_instance_is_busy() {
    let (spy, _instance, scope) = spy_scope();
    let scope = Rc::new(scope);
    let weak = Rc::downgrade(&scope);
    spy.on(1, move |_| match weak.upgrade() {
        Some(scope) => match scope.evaluate("1+1") {
            Ok(text) => HostOutcome::Value(text),
            Err(e) => HostOutcome::Value(e.to_string()),
        },
        None => HostOutcome::Failed(None),
    });
    scope.register_host_function("reenter", 1).unwrap();

    assert_eq!(scope.evaluate("reenter()").unwrap(), "engine instance is busy");
}

#[test]
fn test_host_function_may_drive_another_instance() {
    let (spy, _instance, scope) = spy_scope();
    let (_other_instance, other_scope) = native_scope();
    let other_scope = Rc::new(other_scope);
    let captured = Rc::clone(&other_scope);
    spy.on(1, move |args| match captured.evaluate(&args[0]) {
        Ok(text) => HostOutcome::Value(text),
        Err(e) => HostOutcome::error(e.to_string()),
    });
    scope.register_host_function("nested", 1).unwrap();

    assert_eq!(scope.evaluate("nested('20 + 22')").unwrap(), "42");
}

// ===== Closure registration =====

#[test]
fn test_add_function_with_closure() {
    let (instance, scope) = native_scope();
    let id = scope
        .add_function("math.add", |args| {
            let sum: f64 = args
                .iter()
                .map(|a| a.parse::<f64>().map_err(|e| e.to_string()))
                .sum::<Result<f64, String>>()?;
            Ok(Some(sum.to_string()))
        })
        .unwrap();

    assert_eq!(scope.evaluate("math.add(2, 3)").unwrap(), "5");
    assert_eq!(scope.registered_functions(), vec![("math.add".to_string(), id)]);

    let registry = instance.registry().unwrap();
    assert!(registry.as_native().unwrap().contains(id));
}

#[test]
fn test_closure_errors_become_exceptions() {
    let (_instance, scope) = native_scope();
    scope.add_function("fail", |_| Err("boom".to_string())).unwrap();
    scope.add_function("nothing", |_| Ok(None)).unwrap();

    assert_eq!(scope.evaluate("fail()"), Err(Error::Exception("boom".into())));
    assert_eq!(scope.evaluate("typeof nothing()").unwrap(), "undefined");
}

#[test]
fn test_disposing_scope_unregisters_closures() {
    let (instance, mut scope) = native_scope();
    let id = scope.add_function("f", |_| Ok(None)).unwrap();
    let registry = instance.registry().unwrap();
    let native = registry.as_native().unwrap();
    assert!(native.contains(id));

    scope.dispose();
    assert!(native.is_empty());
}

#[test]
fn test_add_function_failure_drops_closure() {
    let (instance, scope) = native_scope();
    scope.evaluate("var x = 1").unwrap();

    assert!(scope.add_function("x.f", |_| Ok(None)).is_err());

    let registry = instance.registry().unwrap();
    assert!(registry.as_native().unwrap().is_empty());
}

#[test]
fn test_add_function_needs_native_registry() {
    let (_spy, _instance, scope) = spy_scope();
    assert_eq!(
        scope.add_function("f", |_| Ok(None)),
        Err(Error::Host("host registry does not accept closures".into()))
    );
}
