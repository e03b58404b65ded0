//! C string conversion
//!
//! Strings passed in are borrowed and read as UTF-8 (invalid sequences are
//! replaced). Strings passed out are `CString`s released through
//! `jsb_string_free`.

use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};
use std::ptr;

use jsbridge::{Error, InputKind, Result};

/// Borrow a NUL-terminated input string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn read<'a>(ptr: *const c_char, what: InputKind) -> Result<Cow<'a, str>> {
    if ptr.is_null() {
        return Err(Error::NullInput(what));
    }
    Ok(CStr::from_ptr(ptr).to_string_lossy())
}

/// Borrow an optional input string; null reads as `None`.
///
/// # Safety
/// Same as [`read`].
pub unsafe fn read_optional<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy())
    }
}

/// Hand a result string to C.
pub fn export(text: String) -> Result<*mut c_char> {
    CString::new(text)
        .map(CString::into_raw)
        .map_err(|_| Error::InteriorNul)
}

/// Hand an error message to C. Interior NULs are dropped so the message
/// always crosses.
pub fn export_message(message: &str) -> *mut c_char {
    let clean: String = message.chars().filter(|&c| c != '\0').collect();
    CString::new(clean).map_or(ptr::null_mut(), CString::into_raw)
}

/// Null an out-parameter, if present.
///
/// # Safety
/// `out` must be null or valid for writes.
pub unsafe fn clear(out: *mut *mut c_char) {
    if !out.is_null() {
        *out = ptr::null_mut();
    }
}

/// Store `value` in an out-parameter, or free it when the caller passed no
/// slot.
///
/// # Safety
/// `out` must be null or valid for writes; `value` must come from
/// [`export`] or [`export_message`].
pub unsafe fn store(out: *mut *mut c_char, value: *mut c_char) {
    if out.is_null() {
        free(value);
    } else {
        *out = value;
    }
}

/// Release a string this library returned.
///
/// # Safety
/// `ptr` must be null or come from [`export`] or [`export_message`], and
/// must not be freed twice.
pub unsafe fn free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
