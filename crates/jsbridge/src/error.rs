//! Error types for the bridge
//!
//! Every failure the bridge can report is a variant of [`Error`]. The
//! variants group into five kinds (see [`ErrorKind`]) which mirror the
//! places a call can go wrong: the handle, the input, the property path,
//! the engine, or the host registry on the other side of a trampoline.

use std::fmt;

/// Result type used throughout the bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Which handle failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// Engine instance (isolate)
    Engine,
    /// Global scope (context)
    Scope,
    /// Compiled script
    Script,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Engine => write!(f, "engine"),
            HandleKind::Scope => write!(f, "scope"),
            HandleKind::Script => write!(f, "script"),
        }
    }
}

/// Which input was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Script source text
    Source,
    /// Property name or dotted path
    PropertyName,
    /// Function name
    FunctionName,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Source => write!(f, "source"),
            InputKind::PropertyName => write!(f, "property name"),
            InputKind::FunctionName => write!(f, "function name"),
        }
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid, disposed, busy or mismatched handle
    Handle,
    /// Null or malformed input
    Input,
    /// An intermediate path segment holds a non-object value
    PathConflict,
    /// Raised by the engine (compile, run, assignment, call) or its setup
    Engine,
    /// Reported by the host registry
    Host,
}

/// Bridge errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Handle is null, disposed or of the wrong kind
    #[error("invalid {0} handle")]
    InvalidHandle(HandleKind),

    /// Script run against a scope of another engine instance
    #[error("script and scope belong to different engine instances")]
    CrossInstance,

    /// Engine is already executing further up the stack
    #[error("engine instance is busy")]
    Busy,

    /// Required input was null
    #[error("{0} was null")]
    NullInput(InputKind),

    /// Property path was the empty string
    #[error("property path was empty")]
    EmptyPath,

    /// Property path contained `..`, or a leading or trailing dot
    #[error("property path contained an empty segment")]
    EmptySegment,

    /// String contained an interior NUL byte and cannot cross the C boundary
    #[error("string contained an interior null byte")]
    InteriorNul,

    /// An intermediate segment already holds a non-object value
    #[error("property path conflicts with existing non-object value at '{segment}'")]
    PathConflict {
        /// Offending segment
        segment: String,
    },

    /// Captured engine exception
    #[error("{0}")]
    Exception(String),

    /// Name absent on the global object, or not callable
    #[error("global function not found")]
    FunctionNotFound,

    /// One-time platform initialization failed
    #[error("failed to initialise engine platform: {0}")]
    Init(String),

    /// Engine instance could not be allocated
    #[error("failed to create engine instance: {0}")]
    InstanceCreation(String),

    /// Host registry error
    #[error("{0}")]
    Host(String),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHandle(_) | Error::CrossInstance | Error::Busy => ErrorKind::Handle,
            Error::NullInput(_) | Error::EmptyPath | Error::EmptySegment | Error::InteriorNul => {
                ErrorKind::Input
            }
            Error::PathConflict { .. } => ErrorKind::PathConflict,
            Error::Exception(_)
            | Error::FunctionNotFound
            | Error::Init(_)
            | Error::InstanceCreation(_) => ErrorKind::Engine,
            Error::Host(_) => ErrorKind::Host,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Host(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Host(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Error::InvalidHandle(HandleKind::Scope).to_string(), "invalid scope handle");
        assert_eq!(Error::NullInput(InputKind::Source).to_string(), "source was null");
        assert_eq!(
            Error::PathConflict { segment: "y".into() }.to_string(),
            "property path conflicts with existing non-object value at 'y'"
        );
        assert_eq!(Error::Exception("boom".into()).to_string(), "boom");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::CrossInstance.kind(), ErrorKind::Handle);
        assert_eq!(Error::Busy.kind(), ErrorKind::Handle);
        assert_eq!(Error::EmptySegment.kind(), ErrorKind::Input);
        assert_eq!(Error::PathConflict { segment: "a".into() }.kind(), ErrorKind::PathConflict);
        assert_eq!(Error::FunctionNotFound.kind(), ErrorKind::Engine);
        assert_eq!(Error::from("nope").kind(), ErrorKind::Host);
    }
}
