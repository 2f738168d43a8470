//! ochat-session: conversation state and streamed-turn control
//!
//! [`ChatController`] owns the message history and runs one
//! [`StreamSession`] per user turn, appending decoded fragments to the bot
//! reply as they arrive. A [`ChatHandle`] cancels the running turn from
//! another task.

pub mod controller;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod session;
pub mod transport;

pub use controller::{ChatController, SubmitOutcome};
pub use conversation::Conversation;
pub use error::Error;
pub use events::ChatEvent;
pub use handle::ChatHandle;
pub use session::{FailureKind, SessionState, StreamSession};
pub use transport::{HttpTransport, Transport};
