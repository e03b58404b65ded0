//! C ABI for the jsbridge embedding layer
//!
//! This crate exposes the bridge as a flat set of `jsb_*` functions for
//! hosts written in C or anything that can call C. The API follows these
//! principles:
//! - Opaque pointers for instances, scopes and scripts, validated on every
//!   call through a process-wide live-handle table
//! - Status codes (1 success, 0 failure) with error text in out-parameters
//! - Every returned string is owned by the caller and released with
//!   `jsb_string_free`
//! - No panic crosses the boundary
//!
//! The engine-independent symbols (`jsb_string_free`,
//! `jsb_set_host_registry`, `jsb_version`) are always exported. The rest are
//! generated for one backend by [`export_c_api!`]; the `v8` feature does
//! that for [`V8Engine`](jsbridge::backend::v8::V8Engine).
//!
//! ```c
//! jsb_initialize(NULL);
//! JsbIsolate* isolate = jsb_isolate_new();
//! JsbContext* ctx = jsb_context_new(isolate);
//!
//! char* result = NULL;
//! char* error = NULL;
//! if (jsb_context_eval(ctx, "1 + 1", &result, &error)) {
//!     printf("%s\n", result);   /* 2 */
//!     jsb_string_free(result);
//! } else {
//!     fprintf(stderr, "%s\n", error);
//!     jsb_string_free(error);
//! }
//!
//! jsb_context_dispose(ctx);
//! jsb_isolate_dispose(isolate);
//! ```

use std::ffi::{c_char, c_int};

pub mod abi;
pub mod handles;
pub mod registry;
pub mod strings;

pub use handles::{JsbContext, JsbIsolate, JsbScript};
pub use registry::JsbHostRegistry;

// ============================================================================
// Engine-independent symbols
// ============================================================================

/// Free a string returned by any `jsb_*` function
///
/// # Safety
/// `s` must be null or a string this library returned, freed at most once.
#[no_mangle]
pub unsafe extern "C" fn jsb_string_free(s: *mut c_char) {
    strings::free(s);
}

/// Install the host registry vtable for the whole process
///
/// # Returns
/// * 1 on success
/// * 0 if `registry` is null or lacks `invoke` or `drop`
///
/// # Safety
/// `registry` must be null or point to a valid `JsbHostRegistry`. The
/// function pointers must stay callable for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn jsb_set_host_registry(registry: *const JsbHostRegistry) -> c_int {
    abi::set_host_registry(registry)
}

/// Get the library version string
///
/// # Safety
/// The returned string is static and must not be freed.
#[no_mangle]
pub unsafe extern "C" fn jsb_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Engine-specific symbols
// ============================================================================

/// Export the engine-specific `jsb_*` functions for backend `$engine`.
///
/// Instantiate once per linked artifact.
#[macro_export]
macro_rules! export_c_api {
    ($engine:ty) => {
        /// One-time platform initialization. Returns 1 on success.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_initialize(
            icu_data_path: *const ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::initialize::<$engine>(icu_data_path)
        }

        /// Create an engine instance, or null on failure.
        #[no_mangle]
        pub extern "C" fn jsb_isolate_new() -> *mut $crate::JsbIsolate {
            $crate::abi::isolate_new::<$engine>()
        }

        /// Dispose an engine instance. Idempotent.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_isolate_dispose(isolate: *mut $crate::JsbIsolate) {
            $crate::abi::isolate_dispose::<$engine>(isolate)
        }

        /// Create a global scope, or null on failure.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_new(
            isolate: *mut $crate::JsbIsolate,
        ) -> *mut $crate::JsbContext {
            $crate::abi::context_new::<$engine>(isolate)
        }

        /// Dispose a global scope. Idempotent.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_dispose(context: *mut $crate::JsbContext) {
            $crate::abi::context_dispose::<$engine>(context)
        }

        /// Evaluate source text in a scope.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_eval(
            context: *mut $crate::JsbContext,
            source: *const ::std::ffi::c_char,
            result_out: *mut *mut ::std::ffi::c_char,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::context_eval::<$engine>(context, source, result_out, error_out)
        }

        /// Assign a string at a dotted path.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_set_global_string(
            context: *mut $crate::JsbContext,
            path: *const ::std::ffi::c_char,
            value: *const ::std::ffi::c_char,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::context_set_global_string::<$engine>(context, path, value, error_out)
        }

        /// Assign a number at a dotted path.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_set_global_number(
            context: *mut $crate::JsbContext,
            path: *const ::std::ffi::c_char,
            value: f64,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::context_set_global_number::<$engine>(context, path, value, error_out)
        }

        /// Install host function `function_id` at a dotted path.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_register_host_function(
            context: *mut $crate::JsbContext,
            path: *const ::std::ffi::c_char,
            function_id: u64,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::context_register_host_function::<$engine>(
                context,
                path,
                function_id,
                error_out,
            )
        }

        /// Call a global function with string arguments.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_context_call_function(
            context: *mut $crate::JsbContext,
            name: *const ::std::ffi::c_char,
            args: *const *const ::std::ffi::c_char,
            arg_count: usize,
            result_out: *mut *mut ::std::ffi::c_char,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::context_call_function::<$engine>(
                context, name, args, arg_count, result_out, error_out,
            )
        }

        /// Compile a standalone script, or null on failure.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_script_compile(
            isolate: *mut $crate::JsbIsolate,
            source: *const ::std::ffi::c_char,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> *mut $crate::JsbScript {
            $crate::abi::script_compile::<$engine>(isolate, source, error_out)
        }

        /// Run a compiled script in a scope of the same instance.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_script_run(
            script: *mut $crate::JsbScript,
            context: *mut $crate::JsbContext,
            result_out: *mut *mut ::std::ffi::c_char,
            error_out: *mut *mut ::std::ffi::c_char,
        ) -> ::std::ffi::c_int {
            $crate::abi::script_run::<$engine>(script, context, result_out, error_out)
        }

        /// Dispose a compiled script. Idempotent.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_script_dispose(script: *mut $crate::JsbScript) {
            $crate::abi::script_dispose::<$engine>(script)
        }

        /// Evaluate and return the result, or the error text on failure.
        #[no_mangle]
        pub unsafe extern "C" fn jsb_eval(
            context: *mut $crate::JsbContext,
            source: *const ::std::ffi::c_char,
        ) -> *mut ::std::ffi::c_char {
            $crate::abi::eval::<$engine>(context, source)
        }
    };
}

#[cfg(feature = "v8")]
export_c_api!(jsbridge::backend::v8::V8Engine);

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_version() {
        unsafe {
            let version = jsb_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, jsbridge::VERSION);
        }
    }

    #[test]
    fn test_string_free_null_is_noop() {
        unsafe { jsb_string_free(std::ptr::null_mut()) };
    }

    #[test]
    fn test_rejects_incomplete_registry() {
        let vtable = JsbHostRegistry {
            invoke: None,
            drop: None,
            string_free: None,
        };
        assert_eq!(unsafe { jsb_set_host_registry(&vtable) }, 0);
        assert_eq!(unsafe { jsb_set_host_registry(std::ptr::null()) }, 0);
    }
}
