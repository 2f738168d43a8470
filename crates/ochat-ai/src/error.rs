//! Error types for ochat-ai

use thiserror::Error;

/// Result type alias using ochat-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to the user for any transport-level failure
pub const CONNECTION_FAILED_MESSAGE: &str =
    "Failed to connect to the server. Check the endpoint and try again.";

/// Errors that can occur while talking to the generation proxy
#[derive(Error, Debug)]
pub enum Error {
    /// Server answered with a non-success status
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    /// A stream line was not valid JSON
    #[error("Malformed stream line: {source}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request could not be completed (refused, DNS, TLS, ...)
    #[error("Connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// Reading the response body failed mid-stream
    #[error("Stream read failed: {0}")]
    Read(String),

    /// The request was cancelled by the user
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Server,
    Parse,
    Network,
    Cancelled,
    Config,
}

impl Error {
    /// Create a server error from a status code and response body
    pub fn server(status: u16, body: impl Into<String>) -> Self {
        Self::Server {
            status,
            body: body.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Server { .. } => ErrorKind::Server,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Connection(_) | Error::Read(_) => ErrorKind::Network,
            Error::Aborted => ErrorKind::Cancelled,
            Error::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Whether this error is a user cancellation (never shown to the user)
    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Text suitable for the error banner.
    ///
    /// Network failures collapse into one generic message; the detailed cause
    /// goes to the log instead.
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(_) | Error::Read(_) => CONNECTION_FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> Error {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        Error::Parse {
            line: "{oops".into(),
            source,
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::server(500, "boom").kind(), ErrorKind::Server);
        assert_eq!(parse_error().kind(), ErrorKind::Parse);
        assert_eq!(Error::Read("reset".into()).kind(), ErrorKind::Network);
        assert_eq!(Error::Aborted.kind(), ErrorKind::Cancelled);
        assert_eq!(Error::InvalidConfig("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_only_aborted_is_cancellation() {
        assert!(Error::Aborted.is_cancellation());
        assert!(!Error::server(499, "").is_cancellation());
        assert!(!Error::Read("closed".into()).is_cancellation());
    }

    #[test]
    fn test_server_message_includes_status_and_body() {
        let msg = Error::server(502, "upstream down").user_message();
        assert!(msg.contains("502"));
        assert!(msg.contains("upstream down"));
    }

    #[test]
    fn test_read_failure_uses_generic_message() {
        let msg = Error::Read("connection reset by peer".into()).user_message();
        assert_eq!(msg, CONNECTION_FAILED_MESSAGE);
    }

    #[test]
    fn test_parse_message_mentions_malformed() {
        assert!(parse_error().user_message().starts_with("Malformed stream line"));
    }
}
