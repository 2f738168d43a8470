//! Chat event types

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Events emitted while the controller runs a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// User message and bot placeholder were appended
    TurnStart { prompt: String },

    /// Response headers arrived; fragments may follow
    StreamOpened,

    /// A fragment was appended to the bot message
    Fragment { text: String },

    /// A stream line was not valid JSON; the turn continues
    Malformed { message: String },

    /// User-visible error
    Error { message: String },

    /// The turn finished
    TurnEnd { state: SessionState },
}

impl ChatEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::TurnEnd { .. })
    }
}
