//! Exception capture
//!
//! Turns a [`Raised`] into the single human-readable string reported to
//! the caller. Never fails.

use crate::engine::Raised;
use crate::error::Error;

/// Used when the exception value has no string form
pub const UNKNOWN_EXCEPTION: &str = "unknown exception";

/// Used when an operation failed without a pending exception
pub const EXECUTION_FAILED: &str = "execution failed";

/// Render a raised exception as one message.
///
/// The exception's string form comes first; a diagnostic, when present, is
/// appended after a newline.
pub fn describe(raised: &Raised) -> String {
    match raised {
        Raised::Exception { message, detail } => {
            let mut out = match message {
                Some(message) => message.clone(),
                None => UNKNOWN_EXCEPTION.to_string(),
            };
            if let Some(detail) = detail {
                out.push('\n');
                out.push_str(detail);
            }
            out
        }
        Raised::NotPending => EXECUTION_FAILED.to_string(),
    }
}

impl From<Raised> for Error {
    fn from(raised: Raised) -> Self {
        Error::Exception(describe(&raised))
    }
}
