//! jsbridge: JavaScript engine embedding layer
//!
//! This crate drives an external JavaScript engine on behalf of a host:
//! - **Instances**: independent heaps, the ownership root (`instance`)
//! - **Scopes**: global environments with a compiled-script cache (`scope`, `cache`)
//! - **Scripts**: compile once, run against any scope of the instance (`script`)
//! - **Host functions**: script-callable values that call back into the host by id (`host`, `native`)
//!
//! The engine itself sits behind the [`Engine`] trait. The V8 backend lives
//! in [`backend::v8`] behind the `v8` feature; the C ABI is in `jsbridge-ffi`.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsbridge::{platform, EngineInstance, InitOptions, InstanceOptions};
//! use jsbridge::backend::v8::V8Engine;
//!
//! platform::initialize::<V8Engine>(&InitOptions::default())?;
//! let instance = EngineInstance::<V8Engine>::new(&InstanceOptions::default())?;
//! let scope = instance.create_scope()?;
//!
//! scope.set_global_string("cfg.name", "demo")?;
//! scope.add_function("greet", |args| Ok(Some(format!("hello {}", args[0]))))?;
//! assert_eq!(scope.evaluate("greet(cfg.name)")?, "hello demo");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

pub mod cache;
pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod instance;
pub mod marshal;
pub mod native;
pub mod path;
pub mod platform;
pub mod scope;
pub mod script;

// ============================================================================
// Backends
// ============================================================================

/// Engine backends
pub mod backend;

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::{ScriptCache, MAX_CACHEABLE_SOURCE_LEN};
pub use config::{InitOptions, InstanceOptions, ICU_DATA_ENV};
pub use engine::{Engine, EngineResult, IcuData, Raised, ValueKind};
pub use error::{Error, ErrorKind, HandleKind, InputKind, Result};
pub use host::{Completion, HostBinding, HostLink, HostOutcome, HostRegistry};
pub use instance::EngineInstance;
pub use native::{HostFn, NativeRegistry};
pub use scope::GlobalScope;
pub use script::CompiledScript;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
