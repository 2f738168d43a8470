//! Error types for ochat-session

use thiserror::Error;

/// Result type alias using ochat-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Ai(#[from] ochat_ai::Error),

    /// A fragment arrived but the conversation does not end with a bot message
    #[error("last message is not a bot message")]
    LastMessageNotBot,

    /// A session tried to leave a terminal state
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
