//! Concrete [`Engine`](crate::Engine) implementations
//!
//! Backends are opt-in through cargo features so the core builds without
//! pulling an engine in.

#[cfg(feature = "v8")]
pub mod v8;
