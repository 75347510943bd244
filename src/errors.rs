//! Error types for quakemap.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

/// Errors that can occur while building, fetching or rendering a map view.
#[derive(Error, Debug)]
pub enum QuakeMapError {
    /// A caller-supplied parameter was rejected before any network activity
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed returned a non-success status
    #[error("USGS API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Writing rendered output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The controller task is gone
    #[error("view controller has stopped")]
    Stopped,
}

impl QuakeMapError {
    /// Whether this error came from talking to the feed (transport or status).
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. })
    }
}
