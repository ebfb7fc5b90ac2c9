//! Error types for upload and analysis operations

use thiserror::Error;

/// Result type alias for analysis client operations
pub type Result<T> = std::result::Result<T, AnalyzeError>;

/// Errors that can occur while submitting a form or fetching results
///
/// The upload handler treats every variant the same way: the submission is
/// abandoned, the error is logged and the page is left untouched. The
/// variants only exist so logs say what went wrong.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// HTTP request failed (connect, send or body read)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server returned an error response
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl AnalyzeError {
    /// Create a server error from status code and message
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }
}

/// Errors raised while binding to page elements
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// No element with the given id exists in the document
    #[error("Element not found: #{0}")]
    MissingElement(String),

    /// An element exists under the id but is not of the expected kind
    #[error("Element #{id} is a {found}, expected a {expected}")]
    WrongKind {
        id: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
