//! Error types for chatstream
//!
//! Every failure of a streamed request is terminal for that stream and is
//! reported to the caller exactly once.

use thiserror::Error;

/// Main error type for the streaming chat client
#[derive(Error, Debug)]
pub enum ChatError {
    /// Input rejected locally, before any network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Request could not be sent, or the server refused it before streaming
    #[error("{}", transport_message(*status, message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Response body is not valid UTF-8 or cannot be framed
    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    /// An `error` frame arrived on the stream
    #[error("{0}")]
    ServerReported(String),

    /// A stream is already open for this session or task
    #[error("A stream is already open for {target}")]
    ConcurrentStream { target: String },

    /// State machine transition errors
    #[error("Invalid stream transition from {from} via {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

fn transport_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Transport error (HTTP {}): {}", code, message),
        None => format!("Transport error: {}", message),
    }
}

impl ChatError {
    /// Build a transport error with no HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        ChatError::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// The caller-facing reason, without the category prefix
    ///
    /// For server-reported and transport failures this is the text the server
    /// sent, which is what a UI shows next to the partial reply.
    pub fn reason(&self) -> String {
        match self {
            ChatError::Transport { message, .. } => message.clone(),
            ChatError::ServerReported(message) => message.clone(),
            ChatError::StreamDecode(message) => message.clone(),
            ChatError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status attached to a transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Transport { status, .. } => *status,
            ChatError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for chatstream operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Convert anyhow errors to ChatError
impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_with_status() {
        let err = ChatError::Transport {
            status: Some(500),
            message: "internal failure".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("internal failure"));
        assert_eq!(err.reason(), "internal failure");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_server_reported_displays_bare_message() {
        let err = ChatError::ServerReported("boom".to_string());
        assert_eq!(err.to_string(), "boom");
        assert_eq!(err.reason(), "boom");
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = ChatError::InvalidTransition {
            from: "Idle".to_string(),
            to: "FirstChunk".to_string(),
            reason: "request not issued".to_string(),
        };
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("FirstChunk"));
    }

    #[test]
    fn test_concurrent_stream_mentions_target() {
        let err = ChatError::ConcurrentStream {
            target: "session 42".to_string(),
        };
        assert!(err.to_string().contains("session 42"));
        assert_eq!(err.status(), None);
    }
}
