//! Error types for tracker and wiki lookups.

use thiserror::Error;

/// Errors that can occur while talking to Jira or the wiki.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// The issue key does not exist upstream (HTTP 404).
    #[error("Issue not found: {0}")]
    NotFound(String),

    /// Non-2xx response, transport failure or timeout.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Empty, unparseable or incomplete response body.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The wiki rejected the credentials and redirected to its login page.
    #[error("Authentication failed, redirected to {redirect_url}")]
    AuthenticationFailure {
        /// URL the request ended up at after redirects.
        redirect_url: String,
    },

    /// The development-status endpoint has no detail for the issue
    /// (including when the user is not authorized to see it).
    #[error("No development information: {0}")]
    NoDevInfo(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TrackerError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            TrackerError::UpstreamUnavailable(format!("Request timed out: {}", err))
        } else {
            TrackerError::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::MalformedResponse(err.to_string())
    }
}

/// Result type for tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
