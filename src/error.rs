//! Error types for jobdash.

/// Prefix that `ApiError` puts in front of transport failures. Stripped
/// again before a message is shown to the user.
pub const HTTP_ERROR_PREFIX: &str = "HTTP request failed: ";

/// Shown when a failure carries no message at all.
pub const CAUSE_UNKNOWN: &str = "Cause unknown";

/// Top-level error type for setup paths. Socket and message failures are
/// logged and contained inside the push loop, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures of the REST API client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("HTTP request failed: {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl ApiError {
    /// Text suitable for a toast: the transport prefix is removed and an
    /// empty message becomes [`CAUSE_UNKNOWN`].
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Status { body, .. } if !body.trim().is_empty() => body.clone(),
            Self::Status { status, .. } => format!("status {status}"),
            other => other.to_string(),
        };
        strip_error_prefix(&message)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

/// Strip [`HTTP_ERROR_PREFIX`] from a message, falling back to
/// [`CAUSE_UNKNOWN`] when nothing is left.
pub fn strip_error_prefix(message: &str) -> String {
    let stripped = message
        .strip_prefix(HTTP_ERROR_PREFIX)
        .unwrap_or(message)
        .trim();
    if stripped.is_empty() {
        CAUSE_UNKNOWN.to_string()
    } else {
        stripped.to_string()
    }
}

/// WebSocket transport errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("WebSocket not supported for URL {0}")]
    Unsupported(String),
}

/// Inbound push message errors. Every variant means "log and drop".
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid payload for {action}: {reason}")]
    Payload { action: String, reason: String },
}

/// Result type alias for jobdash.
pub type Result<T> = std::result::Result<T, Error>;
