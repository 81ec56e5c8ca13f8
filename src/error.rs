// Error handling module
// Defines the error kinds surfaced to callers of the client

use thiserror::Error;

/// Errors that can occur while talking to the management API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Identity endpoint call failed (network, bad credentials, malformed token)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Non-2xx response from the management API
    #[error("HTTP error: {status} - {body}")]
    HttpError { status: u16, body: String },

    /// Network stalled, or an established connection failed at the I/O level
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Any other transport failure (connect refused, DNS, TLS, protocol)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body is not the JSON shape we expected
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request could not be built (bad header name or value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// HTTP status for `HttpError`, `None` otherwise
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 401 from the resource server
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ApiError>;
