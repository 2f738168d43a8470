//! Conversation state: the ordered, in-memory message history.

use ochat_ai::Message;

use crate::error::{Error, Result};

/// Ordered chat history.
///
/// Append-only, except that the text of the last bot message grows while its
/// response streams in. Messages are never removed.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message. Whitespace-only text is ignored and `false`
    /// is returned.
    pub fn append_user_message(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.messages.push(Message::user(text));
        true
    }

    /// Append the empty bot message that incoming fragments will fill
    pub fn append_bot_placeholder(&mut self) {
        self.messages.push(Message::bot(""));
    }

    /// Concatenate a fragment onto the last message, which must be a bot
    /// message.
    pub fn append_to_last_bot_message(&mut self, fragment: &str) -> Result<()> {
        match self.messages.last_mut() {
            Some(last) if last.is_bot() => {
                last.text.push_str(fragment);
                Ok(())
            }
            _ => Err(Error::LastMessageNotBot),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
