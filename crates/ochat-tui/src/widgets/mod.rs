//! Widgets for the chat screen

pub mod banner;
pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod spinner;
pub mod welcome;

pub use banner::ErrorBanner;
pub use input_box::InputBox;
pub use message_list::{ChatMessage, MessageList, Speaker};
pub use spinner::Spinner;
pub use welcome::WelcomePanel;
