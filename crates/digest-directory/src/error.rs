//! Error types for the directory crate.

use thiserror::Error;

/// Errors that can occur while talking to the HR directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory could not be reached or refused the request.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// The directory answered with data we could not interpret.
    #[error("malformed directory data: {0}")]
    Malformed(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Mirror snapshot could not be read or written.
    #[error("mirror error: {0}")]
    Persistence(#[from] digest_persistence::PersistenceError),
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

impl From<reqwest::Error> for DirectoryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DirectoryError::Malformed(e.to_string())
        } else {
            DirectoryError::Unavailable(e.to_string())
        }
    }
}
