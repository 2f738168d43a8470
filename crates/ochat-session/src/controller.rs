//! Chat controller: owns the conversation and drives one streamed turn at a time.

use std::sync::Arc;

use futures::StreamExt;
use ochat_ai::{ErrorKind, Message, StreamEvent, error::CONNECTION_FAILED_MESSAGE};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::{
    conversation::Conversation,
    events::ChatEvent,
    handle::ChatHandle,
    session::{FailureKind, SessionState, StreamSession},
    transport::Transport,
};

/// Result of [`ChatController::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank prompt; nothing changed
    Ignored,
    /// Another turn is still in flight; nothing changed
    Rejected,
    /// The turn ran to the given terminal state
    Finished(SessionState),
}

/// Owns the conversation, the user-visible error slot and the current session
pub struct ChatController {
    conversation: Conversation,
    transport: Arc<dyn Transport>,
    handle: ChatHandle,
    event_tx: broadcast::Sender<ChatEvent>,
    error: Option<String>,
    last_state: SessionState,
}

impl ChatController {
    /// Create a controller with an empty conversation
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            conversation: Conversation::new(),
            transport,
            handle: ChatHandle::new(),
            event_tx,
            error: None,
            last_state: SessionState::Idle,
        }
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Get a handle that can cancel the running turn without borrowing the
    /// controller
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Cancel the running turn, if any
    pub fn abort(&self) -> bool {
        self.handle.abort()
    }

    /// Whether a turn is requesting or streaming
    pub fn is_loading(&self) -> bool {
        self.handle.is_running()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// The error currently shown to the user
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Clear the error notification. History is untouched.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Terminal state of the most recent turn, or `Idle` before the first
    pub fn current_state(&self) -> SessionState {
        self.last_state
    }

    /// Submit a prompt and stream the reply into the conversation.
    ///
    /// Blank prompts and prompts submitted while another turn is active
    /// change nothing. Otherwise the user message and an empty bot
    /// placeholder are appended before the request is sent, and the
    /// placeholder grows as fragments arrive.
    pub async fn submit(&mut self, prompt: &str) -> SubmitOutcome {
        if self.handle.is_running() {
            tracing::debug!("turn already in flight, rejecting submit");
            return SubmitOutcome::Rejected;
        }
        if prompt.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let mut session = StreamSession::new();
        let _running = self.handle.begin(session.cancel_token());
        self.error = None;

        self.conversation.append_user_message(prompt);
        self.conversation.append_bot_placeholder();
        self.emit(ChatEvent::TurnStart {
            prompt: prompt.to_string(),
        });

        let span = tracing::debug_span!("session", id = %session.id());
        let state = self
            .run_session(&mut session, prompt)
            .instrument(span)
            .await;

        tracing::debug!(
            "turn finished: {} after {}ms",
            state,
            session.elapsed_ms()
        );
        self.last_state = state;
        self.emit(ChatEvent::TurnEnd { state });
        SubmitOutcome::Finished(state)
    }

    async fn run_session(&mut self, session: &mut StreamSession, prompt: &str) -> SessionState {
        advance(session, SessionState::Requesting);

        let mut stream = match self.transport.open(prompt, session.cancel_token()).await {
            Ok(stream) => stream,
            Err(e) if e.is_cancellation() || session.is_cancelled() => {
                tracing::debug!("request abandoned: {}", e);
                return advance(session, SessionState::Cancelled);
            }
            Err(e) => {
                tracing::warn!("request failed: {}", e);
                let kind = match e.kind() {
                    ErrorKind::Server => FailureKind::Server,
                    _ => FailureKind::Network,
                };
                self.report(e.user_message());
                return advance(session, SessionState::Failed(kind));
            }
        };

        advance(session, SessionState::Streaming);
        self.emit(ChatEvent::StreamOpened);

        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Fragment { text } => {
                    match self.conversation.append_to_last_bot_message(&text) {
                        Ok(()) => self.emit(ChatEvent::Fragment { text }),
                        Err(e) => tracing::warn!("dropping fragment: {}", e),
                    }
                }
                StreamEvent::Malformed { error, .. } => {
                    self.error = Some(error.clone());
                    self.emit(ChatEvent::Malformed { message: error });
                }
                StreamEvent::Done { reason } => {
                    tracing::debug!("generator done (reason: {:?})", reason);
                }
                StreamEvent::Failed { message } => {
                    tracing::warn!("stream read failed: {}", message);
                    self.report(CONNECTION_FAILED_MESSAGE.to_string());
                    return advance(session, SessionState::Failed(FailureKind::Network));
                }
                StreamEvent::Cancelled => {
                    return advance(session, SessionState::Cancelled);
                }
            }
        }

        if session.is_cancelled() {
            advance(session, SessionState::Cancelled)
        } else {
            advance(session, SessionState::Completed)
        }
    }

    fn report(&mut self, message: String) {
        self.error = Some(message.clone());
        self.emit(ChatEvent::Error { message });
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

fn advance(session: &mut StreamSession, next: SessionState) -> SessionState {
    if let Err(e) = session.transition(next) {
        tracing::warn!("{}", e);
    }
    session.state()
}
