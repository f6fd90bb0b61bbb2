use thiserror::Error;

use colis_store::StoreError;

/// Authentication failures surfaced by the gate.  All three are reported to
/// the caller as a failed login; they stay distinct for logging.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("No account for this email")]
    NotFound,

    #[error("Incorrect password")]
    BadPassword,

    /// The stored value does not parse as a PHC hash.  This is a hard
    /// failure: run the offline password migration instead of accepting a
    /// plaintext match.
    #[error("Stored password hash is malformed")]
    MalformedStoredHash,
}

/// Errors produced by the domain layer.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Entity id or tracking number has no matching row.
    #[error("Not found")]
    NotFound,

    /// The operation violates the status state machine or a uniqueness
    /// rule (duplicate email, parcel already assigned, foreign owner).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or malformed input (negative weight, bad email, ...).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Credentials rejected.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Password hashing failure.
    #[error("Password hashing error: {0}")]
    Hash(String),

    /// Out-of-band mail delivery failed.
    #[error("Mail delivery error: {0}")]
    Mail(String),

    /// Underlying store failure not covered by NotFound/Conflict.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => CoreError::NotFound,
            StoreError::Conflict(message) => CoreError::Conflict(message),
            other => CoreError::Store(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
