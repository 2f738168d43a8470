//! ochat-tui: terminal widgets for the chat screen
//!
//! Built on ratatui and crossterm. The binary owns the event loop; this crate
//! provides terminal setup, key mapping, the theme and the widgets.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::Tui;
pub use theme::Theme;
