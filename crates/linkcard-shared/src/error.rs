use thiserror::Error;

/// Failures raised by the block/profile access layer.
///
/// Codes are stable machine-readable strings surfaced to clients.
#[derive(Error, Debug)]
pub enum AccessError {
    /// Missing or malformed required input.
    #[error("Validation failed: {code}")]
    Validation { code: &'static str },

    /// Entity absent or not owned by the caller; the two are not told apart.
    #[error("Not found")]
    NotFound,

    /// Uniqueness violation.
    #[error("Conflict: {code}")]
    Conflict { code: &'static str },

    /// No valid identity for an operation that needs one.
    #[error("Unauthorized")]
    Unauthorized,

    /// Operation disabled by configuration.
    #[error("Forbidden: {code}")]
    Forbidden { code: &'static str },

    /// Anything else.  The message is for logs only.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    pub fn validation(code: &'static str) -> Self {
        Self::Validation { code }
    }

    pub fn conflict(code: &'static str) -> Self {
        Self::Conflict { code }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed session token")]
    Malformed,

    #[error("Invalid session signature")]
    BadSignature,

    #[error("Session expired")]
    Expired,
}
