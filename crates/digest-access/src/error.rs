//! Error types for the access crate.

use thiserror::Error;

/// Errors returned by role administration.
///
/// Access checks never return errors; they deny instead.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Role store error.
    #[error("role store error: {0}")]
    Store(#[from] digest_persistence::PersistenceError),

    /// Role name was empty after trimming.
    #[error("invalid role name: {0:?}")]
    InvalidRoleName(String),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
