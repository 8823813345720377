//! Guard Error Types

use thiserror::Error;

/// Result type for guard checks
pub type GuardResult<T> = Result<T, GuardError>;

/// Failures raised by the call-site authorization guard
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    /// The call site presented does not match any allowed filter
    #[error("Unauthorized caller: expected {expected}, got {actual}")]
    UnauthorizedCaller { expected: String, actual: String },

    /// A filter was declared with neither owner nor operation
    #[error("Guard misuse: {message}")]
    GuardMisuse { message: String },
}

impl GuardError {
    /// Create an unauthorized caller error
    pub fn unauthorized<S: Into<String>, A: Into<String>>(expected: S, actual: A) -> Self {
        Self::UnauthorizedCaller {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a guard misuse error
    pub fn misuse<S: Into<String>>(message: S) -> Self {
        Self::GuardMisuse { message: message.into() }
    }

    /// Misuse is a bug in the guarded code, not in whoever called it
    pub fn is_misuse(&self) -> bool {
        matches!(self, GuardError::GuardMisuse { .. })
    }
}
