//! Extraction error types.

use intentgate_core::error::GateError;
use thiserror::Error;

/// Errors that can occur during content extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// No page is available for the URL.
    #[error("Page not found: {0}")]
    NotFound(String),

    /// Fetching the page failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The server answered with an error status.
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    /// Extracted content is empty.
    #[error("Empty content extracted")]
    EmptyContent,
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

impl From<ExtractError> for GateError {
    fn from(err: ExtractError) -> Self {
        GateError::Extraction(err.to_string())
    }
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ExtractError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => ExtractError::Fetch(err.to_string()),
        }
    }
}
