//! Engine-generic bodies of the `jsb_*` entry points
//!
//! [`export_c_api!`](crate::export_c_api) instantiates these for one
//! backend. Every function here validates its handles through the live
//! table, nulls its out-parameters first and runs under `catch_unwind`.

use std::any::Any;
use std::ffi::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::rc::Rc;

use jsbridge::{
    platform, CompiledScript, Engine, EngineInstance, Error, GlobalScope, HandleKind, InitOptions,
    InputKind, InstanceOptions,
};

use crate::handles::{self, JsbContext, JsbIsolate, JsbScript, Pin, Retire};
use crate::registry::{self, CallbackRegistry, JsbHostRegistry};
use crate::strings;

/// Failure of one C call
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Reported by the bridge
    #[error(transparent)]
    Bridge(#[from] Error),

    /// A panic was caught at the boundary
    #[error("internal panic: {0}")]
    Panic(String),
}

type CallResult<T> = std::result::Result<T, CallError>;

/// Success status
pub const OK: c_int = 1;
/// Failure status
pub const FAILED: c_int = 0;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `body` with panics caught.
fn shielded<T>(body: impl FnOnce() -> CallResult<T>) -> CallResult<T> {
    panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(CallError::Panic(panic_message(payload))))
}

/// Run a status-returning call, reporting any failure through `error_out`.
unsafe fn status(error_out: *mut *mut c_char, body: impl FnOnce() -> CallResult<()>) -> c_int {
    match shielded(body) {
        Ok(()) => OK,
        Err(e) => {
            strings::store(error_out, strings::export_message(&e.to_string()));
            FAILED
        }
    }
}

unsafe fn deliver(result_out: *mut *mut c_char, text: String) -> CallResult<()> {
    let raw = strings::export(text)?;
    strings::store(result_out, raw);
    Ok(())
}

// ============================================================================
// Handle access
// ============================================================================

unsafe fn pinned<'a, H, T>(ptr: *mut H, kind: HandleKind) -> CallResult<(Pin, &'a T)> {
    if ptr.is_null() {
        return Err(Error::InvalidHandle(kind).into());
    }
    let pin = Pin::acquire(ptr as usize, kind)?;
    Ok((pin, &*(ptr as *const T)))
}

unsafe fn instance<'a, E: Engine>(
    ptr: *mut JsbIsolate,
) -> CallResult<(Pin, &'a EngineInstance<E>)> {
    pinned(ptr, HandleKind::Engine)
}

unsafe fn scope<'a, E: Engine>(ptr: *mut JsbContext) -> CallResult<(Pin, &'a GlobalScope<E>)> {
    pinned(ptr, HandleKind::Scope)
}

unsafe fn script<'a, E: Engine>(ptr: *mut JsbScript) -> CallResult<(Pin, &'a CompiledScript<E>)> {
    pinned(ptr, HandleKind::Script)
}

fn publish<H, T>(value: T, kind: HandleKind) -> *mut H {
    let raw = Box::into_raw(Box::new(value));
    handles::track(raw as usize, kind);
    raw.cast()
}

/// Take a handle out of the live table and drop it. Refused while the
/// handle is in use further up the stack.
unsafe fn retire<H, T>(ptr: *mut H, kind: HandleKind) {
    if ptr.is_null() {
        return;
    }
    match handles::retire(ptr as usize, kind) {
        Retire::Removed => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                drop(Box::from_raw(ptr.cast::<T>()));
            }));
            if let Err(payload) = outcome {
                tracing::warn!(%kind, panic = %panic_message(payload), "panic while disposing handle");
            }
        }
        Retire::Pinned => {
            tracing::warn!(%kind, "dispose refused: handle is in use");
        }
        Retire::Unknown => {}
    }
}

// ============================================================================
// Platform
// ============================================================================

/// `jsb_initialize`
///
/// # Safety
/// `icu_data_path` must be null or a NUL-terminated string.
pub unsafe fn initialize<E: Engine>(icu_data_path: *const c_char) -> c_int {
    let outcome = shielded(|| {
        let options = InitOptions {
            icu_data_path: strings::read_optional(icu_data_path)
                .filter(|path| !path.is_empty())
                .map(|path| PathBuf::from(path.into_owned())),
        };
        platform::initialize::<E>(&options)?;
        Ok(())
    });
    match outcome {
        Ok(()) => OK,
        Err(e) => {
            tracing::warn!(error = %e, "jsb_initialize failed");
            FAILED
        }
    }
}

// ============================================================================
// Engine instances
// ============================================================================

/// `jsb_isolate_new`
pub fn isolate_new<E: Engine>() -> *mut JsbIsolate {
    let outcome = shielded(|| {
        let registry = Rc::new(CallbackRegistry);
        Ok(EngineInstance::<E>::with_registry(
            &InstanceOptions::default(),
            registry,
        )?)
    });
    match outcome {
        Ok(instance) => publish(instance, HandleKind::Engine),
        Err(e) => {
            tracing::warn!(error = %e, "jsb_isolate_new failed");
            ptr::null_mut()
        }
    }
}

/// `jsb_isolate_dispose`
///
/// # Safety
/// `isolate` must be null or a pointer this library returned.
pub unsafe fn isolate_dispose<E: Engine>(isolate: *mut JsbIsolate) {
    retire::<_, EngineInstance<E>>(isolate, HandleKind::Engine);
}

// ============================================================================
// Global scopes
// ============================================================================

/// `jsb_context_new`
///
/// # Safety
/// `isolate` must be null or a pointer this library returned.
pub unsafe fn context_new<E: Engine>(isolate: *mut JsbIsolate) -> *mut JsbContext {
    let outcome = shielded(|| {
        let (_pin, instance) = instance::<E>(isolate)?;
        Ok(instance.create_scope()?)
    });
    match outcome {
        Ok(scope) => publish(scope, HandleKind::Scope),
        Err(e) => {
            tracing::warn!(error = %e, "jsb_context_new failed");
            ptr::null_mut()
        }
    }
}

/// `jsb_context_dispose`
///
/// # Safety
/// `context` must be null or a pointer this library returned.
pub unsafe fn context_dispose<E: Engine>(context: *mut JsbContext) {
    retire::<_, GlobalScope<E>>(context, HandleKind::Scope);
}

/// `jsb_context_eval`
///
/// # Safety
/// Pointers must be null or valid; `source` NUL-terminated.
pub unsafe fn context_eval<E: Engine>(
    context: *mut JsbContext,
    source: *const c_char,
    result_out: *mut *mut c_char,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(result_out);
    strings::clear(error_out);
    status(error_out, || {
        let (_pin, scope) = scope::<E>(context)?;
        let source = strings::read(source, InputKind::Source)?;
        deliver(result_out, scope.evaluate(&source)?)
    })
}

/// `jsb_context_set_global_string`. A null `value` assigns `""`.
///
/// # Safety
/// Pointers must be null or valid; strings NUL-terminated.
pub unsafe fn context_set_global_string<E: Engine>(
    context: *mut JsbContext,
    path: *const c_char,
    value: *const c_char,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(error_out);
    status(error_out, || {
        let (_pin, scope) = scope::<E>(context)?;
        let path = strings::read(path, InputKind::PropertyName)?;
        let value = strings::read_optional(value).unwrap_or_default();
        Ok(scope.set_global_string(&path, &value)?)
    })
}

/// `jsb_context_set_global_number`
///
/// # Safety
/// Pointers must be null or valid; `path` NUL-terminated.
pub unsafe fn context_set_global_number<E: Engine>(
    context: *mut JsbContext,
    path: *const c_char,
    value: f64,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(error_out);
    status(error_out, || {
        let (_pin, scope) = scope::<E>(context)?;
        let path = strings::read(path, InputKind::PropertyName)?;
        Ok(scope.set_global_number(&path, value)?)
    })
}

/// `jsb_context_register_host_function`
///
/// # Safety
/// Pointers must be null or valid; `path` NUL-terminated.
pub unsafe fn context_register_host_function<E: Engine>(
    context: *mut JsbContext,
    path: *const c_char,
    function_id: u64,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(error_out);
    status(error_out, || {
        let (_pin, scope) = scope::<E>(context)?;
        let path = strings::read(path, InputKind::PropertyName)?;
        Ok(scope.register_host_function(&path, function_id)?)
    })
}

/// `jsb_context_call_function`. Null entries in `args` arrive as
/// `undefined`; a null `args` array passes `arg_count` of them.
///
/// # Safety
/// Pointers must be null or valid; `args` must hold `arg_count` entries.
pub unsafe fn context_call_function<E: Engine>(
    context: *mut JsbContext,
    name: *const c_char,
    args: *const *const c_char,
    arg_count: usize,
    result_out: *mut *mut c_char,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(result_out);
    strings::clear(error_out);
    status(error_out, || {
        let (_pin, scope) = scope::<E>(context)?;
        let name = strings::read(name, InputKind::FunctionName)?;

        let owned: Vec<_> = if args.is_null() {
            vec![None; arg_count]
        } else {
            std::slice::from_raw_parts(args, arg_count)
                .iter()
                .map(|arg| strings::read_optional(*arg))
                .collect()
        };
        let argv: Vec<Option<&str>> = owned.iter().map(|arg| arg.as_deref()).collect();

        deliver(result_out, scope.call_function(&name, &argv)?)
    })
}

// ============================================================================
// Compiled scripts
// ============================================================================

/// `jsb_script_compile`
///
/// # Safety
/// Pointers must be null or valid; `source` NUL-terminated.
pub unsafe fn script_compile<E: Engine>(
    isolate: *mut JsbIsolate,
    source: *const c_char,
    error_out: *mut *mut c_char,
) -> *mut JsbScript {
    strings::clear(error_out);
    let outcome = shielded(|| {
        let (_pin, instance) = instance::<E>(isolate)?;
        let source = strings::read(source, InputKind::Source)?;
        Ok(instance.compile(&source)?)
    });
    match outcome {
        Ok(script) => publish(script, HandleKind::Script),
        Err(e) => {
            strings::store(error_out, strings::export_message(&e.to_string()));
            ptr::null_mut()
        }
    }
}

/// `jsb_script_run`
///
/// # Safety
/// Pointers must be null or valid.
pub unsafe fn script_run<E: Engine>(
    script: *mut JsbScript,
    context: *mut JsbContext,
    result_out: *mut *mut c_char,
    error_out: *mut *mut c_char,
) -> c_int {
    strings::clear(result_out);
    strings::clear(error_out);
    status(error_out, || {
        let (_script_pin, script) = self::script::<E>(script)?;
        let (_scope_pin, scope) = self::scope::<E>(context)?;
        deliver(result_out, script.run(scope)?)
    })
}

/// `jsb_script_dispose`
///
/// # Safety
/// `script` must be null or a pointer this library returned.
pub unsafe fn script_dispose<E: Engine>(script: *mut JsbScript) {
    retire::<_, CompiledScript<E>>(script, HandleKind::Script);
}

// ============================================================================
// Helpers
// ============================================================================

/// `jsb_eval`: the result on success, the error text on failure.
///
/// # Safety
/// Same as [`context_eval`].
pub unsafe fn eval<E: Engine>(context: *mut JsbContext, source: *const c_char) -> *mut c_char {
    let mut result: *mut c_char = ptr::null_mut();
    let mut error: *mut c_char = ptr::null_mut();
    if context_eval::<E>(context, source, &mut result, &mut error) == OK {
        result
    } else {
        error
    }
}

/// `jsb_set_host_registry`
///
/// # Safety
/// `vtable` must be null or point to a valid [`JsbHostRegistry`].
pub unsafe fn set_host_registry(vtable: *const JsbHostRegistry) -> c_int {
    if vtable.is_null() {
        return FAILED;
    }
    if registry::install(*vtable) {
        OK
    } else {
        FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_forms() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }

    #[test]
    fn test_shielded_catches_panics() {
        let err = shielded::<()>(|| panic!("boom")).unwrap_err();
        assert_eq!(err.to_string(), "internal panic: boom");
    }

    #[test]
    fn test_status_reports_into_error_out() {
        let mut error: *mut c_char = ptr::null_mut();
        let code = unsafe {
            status(&mut error, || {
                Err(Error::NullInput(InputKind::FunctionName).into())
            })
        };
        assert_eq!(code, FAILED);

        let text = unsafe { std::ffi::CStr::from_ptr(error) }
            .to_string_lossy()
            .into_owned();
        unsafe { strings::free(error) };
        assert_eq!(text, "function name was null");
    }
}
