//! Opaque handle bookkeeping
//!
//! Every pointer handed to C is a boxed Rust value whose address is entered
//! in a process-wide table together with its kind. Entry points look the
//! address up before dereferencing it, so a null, foreign, disposed or
//! mistyped pointer is rejected instead of read. While an entry point works
//! on a handle it holds a [`Pin`]; disposing a pinned handle (from a host
//! function running further up the stack) is refused.

use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use jsbridge::{Error, HandleKind, Result};

/// Opaque engine instance
#[repr(C)]
pub struct JsbIsolate {
    _private: [u8; 0],
}

/// Opaque global scope
#[repr(C)]
pub struct JsbContext {
    _private: [u8; 0],
}

/// Opaque compiled script
#[repr(C)]
pub struct JsbScript {
    _private: [u8; 0],
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: HandleKind,
    pins: u32,
}

static LIVE: Lazy<Mutex<FxHashMap<usize, Entry>>> = Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Record a freshly boxed handle.
pub fn track(address: usize, kind: HandleKind) {
    LIVE.lock().insert(address, Entry { kind, pins: 0 });
}

/// `true` if `address` is a live handle of `kind`
pub fn is_live(address: usize, kind: HandleKind) -> bool {
    matches!(LIVE.lock().get(&address), Some(entry) if entry.kind == kind)
}

/// Validation guard over one live handle
pub struct Pin {
    address: usize,
}

impl Pin {
    /// Validate `address` as a live `kind` handle and hold it for the
    /// duration of the guard.
    pub fn acquire(address: usize, kind: HandleKind) -> Result<Self> {
        let mut live = LIVE.lock();
        match live.get_mut(&address) {
            Some(entry) if entry.kind == kind => {
                entry.pins += 1;
                Ok(Self { address })
            }
            _ => Err(Error::InvalidHandle(kind)),
        }
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        if let Some(entry) = LIVE.lock().get_mut(&self.address) {
            entry.pins = entry.pins.saturating_sub(1);
        }
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pin({:#x})", self.address)
    }
}

/// Outcome of [`retire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retire {
    /// Removed from the table; the caller now owns the box
    Removed,
    /// Not a live handle of that kind
    Unknown,
    /// In use further up the stack; left live
    Pinned,
}

/// Remove `address` from the table unless it is unknown or pinned.
pub fn retire(address: usize, kind: HandleKind) -> Retire {
    let mut live = LIVE.lock();
    match live.get(&address) {
        Some(entry) if entry.kind == kind && entry.pins > 0 => Retire::Pinned,
        Some(entry) if entry.kind == kind => {
            live.remove(&address);
            Retire::Removed
        }
        _ => Retire::Unknown,
    }
}
