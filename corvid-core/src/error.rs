//! Error types for the corvid review pipeline

use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias for corvid operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for corvid operations
///
/// Only `Auth` and `Config` abort a review run. Everything file-scoped is
/// caught at the per-file pipeline boundary and converted into a failure
/// record in the run statistics.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication error (fatal, aborts the run before any file)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Platform API error (fetching changes, posting comments)
    #[error("Platform error: {0}")]
    Platform(String),

    /// AI provider error, carries its own retry classification
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Static analyzer error (never fatal, treated as zero findings)
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// Malformed tool or model output (offending item dropped)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Config(_))
    }
}
