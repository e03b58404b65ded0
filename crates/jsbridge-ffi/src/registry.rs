//! Host registry installed from C
//!
//! The embedder installs one [`JsbHostRegistry`] vtable per process with
//! `jsb_set_host_registry`. Every instance created through the C ABI routes
//! its host functions to whatever vtable is installed at call time.

use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

use parking_lot::RwLock;

use jsbridge::{Error, HostOutcome, HostRegistry};

/// `invoke(id, args, n, result_out, error_out) -> int`
pub type InvokeFn = unsafe extern "C" fn(
    function_id: u64,
    args: *const *const c_char,
    arg_count: usize,
    result_out: *mut *mut c_char,
    error_out: *mut *mut c_char,
) -> c_int;

/// `drop(id)`
pub type DropFn = unsafe extern "C" fn(function_id: u64);

/// `string_free(s)` for strings the host allocated
pub type StringFreeFn = unsafe extern "C" fn(s: *mut c_char);

/// Host registry vtable
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JsbHostRegistry {
    /// Call a host function. Returns 1 on success (a null `result_out`
    /// means `undefined`), 0 on failure with an optional `error_out`.
    /// `args` is null when `arg_count` is 0.
    pub invoke: Option<InvokeFn>,
    /// The bridge no longer references an id
    pub drop: Option<DropFn>,
    /// Free strings returned through `invoke`. May be null.
    pub string_free: Option<StringFreeFn>,
}

/// Thrown when no vtable has been installed
pub const NOT_INSTALLED: &str = "host registry not installed";

static INSTALLED: RwLock<Option<JsbHostRegistry>> = RwLock::new(None);

/// Install `vtable` for the whole process. Returns `false` (and keeps the
/// previous one) when a required entry is missing.
pub fn install(vtable: JsbHostRegistry) -> bool {
    if vtable.invoke.is_none() || vtable.drop.is_none() {
        tracing::warn!("host registry rejected: invoke and drop are required");
        return false;
    }
    *INSTALLED.write() = Some(vtable);
    tracing::debug!(
        string_free = vtable.string_free.is_some(),
        "host registry installed"
    );
    true
}

fn installed() -> Option<JsbHostRegistry> {
    *INSTALLED.read()
}

/// [`HostRegistry`] over the installed vtable
#[derive(Debug, Default, Clone, Copy)]
pub struct CallbackRegistry;

impl HostRegistry for CallbackRegistry {
    fn invoke(&self, function_id: u64, args: &[String]) -> HostOutcome {
        let Some(JsbHostRegistry {
            invoke: Some(invoke),
            string_free,
            ..
        }) = installed()
        else {
            return HostOutcome::error(NOT_INSTALLED);
        };

        let owned: Vec<CString> = match args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()
        {
            Ok(owned) => owned,
            Err(_) => return HostOutcome::error(Error::InteriorNul.to_string()),
        };
        let argv: Vec<*const c_char> = owned.iter().map(|arg| arg.as_ptr()).collect();
        let argv_ptr = if argv.is_empty() {
            ptr::null()
        } else {
            argv.as_ptr()
        };

        let mut result: *mut c_char = ptr::null_mut();
        let mut error: *mut c_char = ptr::null_mut();
        // SAFETY: argv and its strings outlive the call; the out slots are
        // valid locals.
        let status = unsafe {
            invoke(
                function_id,
                argv_ptr,
                argv.len(),
                &mut result,
                &mut error,
            )
        };

        // SAFETY: both strings, if set, were allocated by the host for us.
        let result = unsafe { take_host_string(result, string_free) };
        let error = unsafe { take_host_string(error, string_free) };

        if status != 0 {
            match result {
                Some(text) => HostOutcome::Value(text),
                None => HostOutcome::Undefined,
            }
        } else {
            HostOutcome::Failed(error)
        }
    }

    fn release(&self, function_id: u64) {
        if let Some(drop) = installed().and_then(|vtable| vtable.drop) {
            // SAFETY: fire-and-forget call into the installed vtable.
            unsafe { drop(function_id) };
        }
    }
}

/// Copy a host-owned string and give it back to the host.
unsafe fn take_host_string(ptr: *mut c_char, string_free: Option<StringFreeFn>) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let text = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    if let Some(free) = string_free {
        free(ptr);
    }
    Some(text)
}
