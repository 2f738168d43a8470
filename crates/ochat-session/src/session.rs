//! Stream session lifecycle

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Why a session failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Non-success HTTP status
    Server,
    /// Connection or read failure
    Network,
}

/// State of one streaming turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed(FailureKind),
}

impl SessionState {
    /// A request is outstanding
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Requesting | SessionState::Streaming)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed(_)
        )
    }

    fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Requesting) => true,
            (Requesting, Streaming | Cancelled | Failed(_)) => true,
            (Streaming, Completed | Cancelled | Failed(FailureKind::Network)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Cancelled => write!(f, "cancelled"),
            SessionState::Failed(FailureKind::Server) => write!(f, "failed (server)"),
            SessionState::Failed(FailureKind::Network) => write!(f, "failed (network)"),
        }
    }
}

/// One outstanding request tied to one user turn.
///
/// Created per turn by the controller and dropped when the turn ends. The
/// cancellation token is handed to the transport; cancelling it aborts the
/// request or the body read, whichever is in progress.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    cancel: CancellationToken,
    state: SessionState,
    started_at: i64,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            state: SessionState::Idle,
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Token to pass to the transport
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Milliseconds since the session was created
    pub fn elapsed_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.started_at
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(session = %self.id, "{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}
