//! Common result and error types for the build core.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an internal error (a bug in the build core or a
/// collaborator breaking its contract), not a user-facing error. User errors
/// are stored on modules and reported as diagnostics.
pub type KilnResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant, not a user input problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal build error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
