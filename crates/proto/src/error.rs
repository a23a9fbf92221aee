use std::time::Duration;
use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP server runtime error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Chat request error.
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// HTTP server errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Listener could not be bound.
    #[error("Bind failed on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    /// Server loop terminated with an error.
    #[error("Server error: {0}")]
    Serve(String),
}

/// Malformed request body for either endpoint.
///
/// Always rendered as `Invalid body` on the wire; the reason is kept for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid body")]
    InvalidBody(String),
}

impl ValidationError {
    /// Returns the internal reason the body was rejected.
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidBody(reason) => reason,
        }
    }
}

/// Failure talking to the external AI endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalServiceError {
    /// Request could not be built or sent (empty URL, DNS, refused, ...).
    #[error("AI endpoint unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured bound.
    #[error("AI endpoint timed out after {0:?}")]
    Timeout(Duration),

    /// Endpoint answered with a non-success status.
    #[error("AI endpoint returned HTTP {status}: {preview}")]
    Status { status: u16, preview: String },

    /// Response body was not JSON.
    #[error("Invalid response from AI endpoint: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the chat request handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("External service error: {0}")]
    External(#[from] ExternalServiceError),
}
