//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Missing environment variable
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    /// Pull request not found
    #[error("Pull request #{0} not found")]
    PrNotFound(u64),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<Error> for corvid_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Auth(msg) => corvid_core::Error::Auth(msg),
            Error::MissingEnv(var) => {
                corvid_core::Error::Auth(format!("missing environment variable: {}", var))
            }
            other => corvid_core::Error::Platform(other.to_string()),
        }
    }
}
