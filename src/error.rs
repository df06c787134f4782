//! # Error Handling
//!
//! This module defines the error types shared by every part of the runtime.
//! None of them is fatal: the runtime loop logs each failure and turns it into
//! a visible island status, so the page always keeps working in some mode.
//!
//! ## Error Categories:
//! - **Unsupported**: the platform lacks push-streams or media capture
//! - **Transport**: a stream disconnected or a request failed on the network
//! - **MalformedPayload**: a stream message could not be decoded
//! - **PermissionDenied**: microphone access was refused
//! - **EmptyCapture**: a recording produced zero bytes
//! - **Upload**: the upload endpoint answered with a non-success status
//! - **InvalidTransition**: a connection was asked to move backwards
//! - **Config**: configuration file or environment variable problems
//! - **Internal**: anything else (wrapped `anyhow` errors)

use serde::Deserialize;
use std::fmt;

/// Custom error types for the runtime.
///
/// ## Usage Example:
/// ```rust
/// use alphonse_ui_runtime::error::RuntimeError;
/// let err = RuntimeError::EmptyCapture;
/// assert_eq!(err.user_message(), "No audio captured.");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A platform capability (push-stream, media capture) is missing
    Unsupported(String),

    /// Stream disconnect or network failure
    Transport(String),

    /// A stream message could not be parsed into the expected shape
    MalformedPayload(String),

    /// Microphone access refused or hardware failure on acquire
    PermissionDenied(String),

    /// The assembled recording contained no bytes
    EmptyCapture,

    /// Upload rejected by the server; holds the HTTP status and the reason
    Upload { status: u16, reason: String },

    /// A connection state change that the state graph does not allow
    InvalidTransition(String),

    /// Configuration file or environment variable problems
    Config(String),

    /// Anything that does not fit the categories above
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Unsupported(msg) => write!(f, "Unsupported capability: {}", msg),
            RuntimeError::Transport(msg) => write!(f, "Transport error: {}", msg),
            RuntimeError::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            RuntimeError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            RuntimeError::EmptyCapture => write!(f, "Empty capture"),
            RuntimeError::Upload { status, reason } => {
                write!(f, "Upload failed with status {}: {}", status, reason)
            }
            RuntimeError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            RuntimeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RuntimeError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Body shape of a failed upload response: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl RuntimeError {
    /// Build an upload error from a non-success response.
    ///
    /// When the body is JSON with an `error` string, that string is used
    /// verbatim. Otherwise a generic message naming the status is used.
    pub fn from_upload_response(status: u16, body: Option<&str>) -> Self {
        let reason = body
            .and_then(|raw| serde_json::from_str::<ErrorBody>(raw).ok())
            .map(|parsed| parsed.error)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status));
        RuntimeError::Upload { status, reason }
    }

    /// The text shown to the user in the island's status area.
    pub fn user_message(&self) -> String {
        match self {
            RuntimeError::Unsupported(what) => {
                format!("{} is not supported in this browser.", what)
            }
            RuntimeError::Transport(_) => "Connection lost.".to_string(),
            RuntimeError::MalformedPayload(_) => "Received an unreadable update.".to_string(),
            RuntimeError::PermissionDenied(reason) => format!("Microphone unavailable: {}", reason),
            RuntimeError::EmptyCapture => "No audio captured.".to_string(),
            RuntimeError::Upload { reason, .. } => format!("Upload failed: {}", reason),
            RuntimeError::InvalidTransition(msg)
            | RuntimeError::Config(msg)
            | RuntimeError::Internal(msg) => msg.clone(),
        }
    }
}

/// Automatic conversion from anyhow::Error to RuntimeError.
impl From<anyhow::Error> for RuntimeError {
    fn from(err: anyhow::Error) -> Self {
        RuntimeError::Internal(err.to_string())
    }
}

/// JSON decoding failures on a stream are malformed payloads, which the
/// transport treats exactly like a disconnect.
impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::MalformedPayload(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for RuntimeError {
    fn from(err: config::ConfigError) -> Self {
        RuntimeError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for RuntimeError {
    fn from(err: reqwest::Error) -> Self {
        RuntimeError::Transport(err.to_string())
    }
}

/// Shorthand for `Result<T, RuntimeError>`.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_uses_server_reason_verbatim() {
        let err = RuntimeError::from_upload_response(413, Some(r#"{"error":"too large"}"#));
        assert_eq!(
            err,
            RuntimeError::Upload {
                status: 413,
                reason: "too large".to_string()
            }
        );
        assert!(err.user_message().contains("too large"));
    }

    #[test]
    fn test_upload_error_falls_back_to_generic_message() {
        let html = RuntimeError::from_upload_response(502, Some("<html>Bad Gateway</html>"));
        assert_eq!(html.user_message(), "Upload failed: HTTP 502");

        let empty = RuntimeError::from_upload_response(500, None);
        assert!(empty.user_message().contains("HTTP 500"));

        let blank = RuntimeError::from_upload_response(400, Some(r#"{"error":"  "}"#));
        assert!(blank.user_message().contains("HTTP 400"));
    }

    #[test]
    fn test_json_errors_become_malformed_payloads() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: RuntimeError = parse_err.into();
        assert!(matches!(err, RuntimeError::MalformedPayload(_)));
    }

    #[test]
    fn test_display_names_the_category() {
        let err = RuntimeError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
        assert_eq!(RuntimeError::EmptyCapture.user_message(), "No audio captured.");
    }
}
