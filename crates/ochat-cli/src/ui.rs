//! TUI implementation for ochat

use std::time::{Duration, Instant};

use futures::StreamExt;
use ochat_ai::{Message, Sender};
use ochat_session::{ChatController, ChatEvent, SessionState};
use ochat_tui::{
    Theme, Tui,
    input::{Action, event_to_action},
    widgets::{
        ChatMessage, ErrorBanner, InputBox, MessageList, Spinner, WelcomePanel,
        message_list::calculate_message_height,
    },
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use tokio::sync::broadcast::error::RecvError;

/// Lines moved per PgUp/PgDn
const PAGE: usize = 10;
/// Lines moved per mouse wheel notch
const WHEEL: usize = 3;

/// Requests from the UI to the loop that owns the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    /// User submitted a prompt
    Submit(String),
    /// Cancel the running turn
    Abort,
    /// Hide the error banner
    DismissError,
    Quit,
}

/// TUI application state.
///
/// Mirrors the controller's conversation through chat events while a turn
/// runs, and is resynced from the controller once it finishes.
pub struct TuiState {
    messages: Vec<ChatMessage>,
    input: InputBox,
    /// First visible line; `usize::MAX` follows the bottom
    scroll: usize,
    is_loading: bool,
    status: String,
    error: Option<String>,
    theme: Theme,
    endpoint: String,
    spinner_start: Instant,
    /// Chat events were dropped; the mirror needs a resync
    stale: bool,
}

impl TuiState {
    pub fn new(theme: Theme, endpoint: impl Into<String>) -> Self {
        let mut input = InputBox::new().with_placeholder("Type your message here...");
        input.set_focused(true);

        Self {
            messages: vec![],
            input,
            scroll: 0,
            is_loading: false,
            status: "Ready".to_string(),
            error: None,
            theme,
            endpoint: endpoint.into(),
            spinner_start: Instant::now(),
            stale: false,
        }
    }

    pub fn handle_chat_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::TurnStart { prompt } => {
                self.messages.push(ChatMessage::user(prompt));
                self.messages.push(ChatMessage::bot_streaming());
                self.is_loading = true;
                self.error = None;
                self.spinner_start = Instant::now();
                self.status = "Waiting for server...".to_string();
                self.scroll_to_bottom();
            }
            ChatEvent::StreamOpened => {
                self.status = "Receiving...".to_string();
            }
            ChatEvent::Fragment { text } => {
                if let Some(last) = self.messages.last_mut() {
                    last.text.push_str(&text);
                }
                self.scroll_to_bottom();
            }
            ChatEvent::Malformed { message } | ChatEvent::Error { message } => {
                self.error = Some(message);
            }
            ChatEvent::TurnEnd { state } => {
                if let Some(last) = self.messages.last_mut() {
                    last.is_streaming = false;
                }
                self.is_loading = false;
                self.status = match state {
                    SessionState::Cancelled => "Cancelled".to_string(),
                    SessionState::Failed(_) => "Failed".to_string(),
                    _ => "Ready".to_string(),
                };
            }
        }
    }

    /// Apply one result from the chat event channel
    pub fn receive(&mut self, received: Result<ChatEvent, RecvError>) {
        match received {
            Ok(event) => self.handle_chat_event(event),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("ui fell behind, {} chat events dropped", missed);
                self.stale = true;
                self.status = "Catching up...".to_string();
            }
            Err(RecvError::Closed) => {}
        }
    }

    /// Whether events were dropped since the last sync
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Replace the mirror with the controller's state
    pub fn sync(&mut self, messages: &[Message], error: Option<&str>, is_loading: bool) {
        self.messages = messages
            .iter()
            .map(|m| match m.sender {
                Sender::User => ChatMessage::user(m.text.clone()),
                Sender::Bot => ChatMessage::bot(m.text.clone()),
            })
            .collect();
        if is_loading {
            if let Some(last) = self.messages.last_mut() {
                last.is_streaming = true;
            }
        }
        self.error = error.map(str::to_string);
        self.is_loading = is_loading;
        self.stale = false;
    }

    fn scroll_to_bottom(&mut self) {
        // Resolved against the content height at render time
        self.scroll = usize::MAX;
    }

    /// Handle a keyboard or mouse action
    pub fn handle_action(&mut self, action: Action, width: u16) -> Option<UiMessage> {
        match action {
            Action::Submit => {
                if self.is_loading {
                    self.status = "Still answering, Esc to cancel".to_string();
                    None
                } else if self.input.is_blank() {
                    None
                } else {
                    Some(UiMessage::Submit(self.input.take()))
                }
            }
            Action::Interrupt => {
                if self.is_loading {
                    self.status = "Cancelling...".to_string();
                    Some(UiMessage::Abort)
                } else {
                    Some(UiMessage::Quit)
                }
            }
            Action::Quit => Some(UiMessage::Quit),
            Action::Escape => {
                if self.is_loading {
                    self.status = "Cancelling...".to_string();
                    Some(UiMessage::Abort)
                } else if self.error.is_some() {
                    self.error = None;
                    Some(UiMessage::DismissError)
                } else {
                    None
                }
            }
            Action::PageUp => {
                self.scroll = self.scroll.saturating_sub(PAGE);
                None
            }
            Action::PageDown => {
                self.scroll = self.scroll.saturating_add(PAGE);
                None
            }
            Action::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(WHEEL);
                None
            }
            Action::ScrollDown => {
                self.scroll = self.scroll.saturating_add(WHEEL);
                None
            }
            _ => {
                self.input.handle_action(&action, width);
                None
            }
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let size = frame.area();

        let banner = self
            .error
            .as_deref()
            .map(|message| ErrorBanner::new(message, &self.theme));
        let banner_height = banner.as_ref().map_or(0, |b| b.height(size.width).min(6));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(banner_height),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(size);

        let (messages_area, banner_area, status_area, input_area) =
            (chunks[0], chunks[1], chunks[2], chunks[3]);

        if let Some(banner) = banner {
            frame.render_widget(banner, banner_area);
        }

        self.render_messages(frame, messages_area);
        self.render_status(frame, status_area);
        self.input
            .render(input_area, frame.buffer_mut(), &self.theme);
    }

    fn render_messages(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style())
            .title(" ochat ");

        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }

        if self.messages.is_empty() {
            frame.render_widget(
                WelcomePanel::new(&self.theme).endpoint(&self.endpoint),
                inner,
            );
            return;
        }

        // Leave a column for the scrollbar
        let text_width = inner.width.saturating_sub(1) as usize;
        let content_height = calculate_message_height(&self.messages, &self.theme, text_width);
        let max_scroll = content_height.saturating_sub(inner.height as usize);
        self.scroll = self.scroll.min(max_scroll);

        let list_area = Rect {
            width: inner.width.saturating_sub(1),
            ..inner
        };
        let message_list = MessageList::new(&self.messages, &self.theme)
            .scroll(self.scroll)
            .spinner_start(self.spinner_start);
        frame.render_widget(message_list, list_area);

        if content_height > inner.height as usize {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .track_symbol(Some("│"))
                .thumb_symbol("█");

            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(self.scroll);
            frame.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
        }
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if self.is_loading {
            let spinner =
                Spinner::new(&self.status, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left = self.status.as_str();
        let right = if self.error.is_some() {
            "Esc: dismiss │ Ctrl+C: quit"
        } else {
            "Enter: send │ PgUp/PgDn: scroll │ Ctrl+C: quit"
        };

        let left_width = left.chars().count();
        let right_width = right.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            Line::from(vec![
                Span::styled(left, self.theme.dim_style()),
                Span::raw(" ".repeat(available - left_width - right_width)),
                Span::styled(right, self.theme.dim_style()),
            ])
        } else {
            Line::from(Span::styled(left, self.theme.dim_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI until the user quits
pub async fn run_tui(
    controller: &mut ChatController,
    theme: Theme,
    endpoint: &str,
) -> anyhow::Result<()> {
    let mut tui = Tui::enter()?;
    let mut state = TuiState::new(theme, endpoint);
    let mut chat_rx = controller.subscribe();
    let mut events = tui.events();
    let mut tick = tokio::time::interval(Duration::from_millis(80));

    // Prompt queued by Enter, started at the top of the next iteration so the
    // turn future can borrow the controller
    let mut pending: Option<String> = None;

    loop {
        if let Some(prompt) = pending.take() {
            let handle = controller.handle();
            let finished = {
                let mut turn = std::pin::pin!(controller.submit(&prompt));
                loop {
                    tui.draw(|frame| state.render(frame))?;
                    let width = tui.size()?.width;

                    tokio::select! {
                        biased;

                        outcome = &mut turn => break Some(outcome),

                        event = chat_rx.recv() => state.receive(event),

                        event = events.next() => match event {
                            Some(Ok(event)) => {
                                let Some(action) = event_to_action(event) else { continue };
                                match state.handle_action(action, width) {
                                    Some(UiMessage::Abort) => {
                                        handle.abort();
                                    }
                                    Some(UiMessage::Quit) => break None,
                                    _ => {}
                                }
                            }
                            Some(Err(e)) => return Err(e.into()),
                            None => break None,
                        },

                        _ = tick.tick() => {}
                    }
                }
            };

            let Some(outcome) = finished else {
                // Dropping the turn cancelled it
                break;
            };
            tracing::debug!("turn outcome: {:?}", outcome);

            while let Ok(event) = chat_rx.try_recv() {
                state.handle_chat_event(event);
            }
            state.sync(controller.messages(), controller.error(), controller.is_loading());
            continue;
        }

        tui.draw(|frame| state.render(frame))?;
        let width = tui.size()?.width;

        tokio::select! {
            biased;

            event = chat_rx.recv() => {
                state.receive(event);
                if state.is_stale() {
                    state.sync(controller.messages(), controller.error(), controller.is_loading());
                }
            }

            event = events.next() => match event {
                Some(Ok(event)) => {
                    let Some(action) = event_to_action(event) else { continue };
                    match state.handle_action(action, width) {
                        Some(UiMessage::Submit(prompt)) => pending = Some(prompt),
                        Some(UiMessage::DismissError) => controller.dismiss_error(),
                        Some(UiMessage::Quit) => break,
                        Some(UiMessage::Abort) => {
                            controller.abort();
                        }
                        None => {}
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },

            _ = tick.tick() => {}
        }
    }

    tui.restore()?;
    Ok(())
}
