//! Message list widget for displaying the conversation

use crate::theme::Theme;
use crate::widgets::{markdown::render_markdown, spinner::frame_at};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::time::Instant;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
}

/// A single message in the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    /// The reply is still arriving
    pub is_streaming: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            is_streaming: false,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
            is_streaming: false,
        }
    }

    /// An empty bot reply that is about to stream in
    pub fn bot_streaming() -> Self {
        Self {
            is_streaming: true,
            ..Self::bot("")
        }
    }
}

/// Widget for displaying a list of chat messages
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
    spinner_start: Instant,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
            spinner_start: Instant::now(),
        }
    }

    /// First visible line
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Animation origin for the thinking indicator
    pub fn spinner_start(mut self, start: Instant) -> Self {
        self.spinner_start = start;
        self
    }
}

fn render_message(
    msg: &ChatMessage,
    theme: &Theme,
    width: usize,
    spinner_start: Instant,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let header = match msg.speaker {
        Speaker::User => Span::styled("▶ You", theme.accent_bold()),
        Speaker::Bot => Span::styled("◀ Bot", theme.bot_bold()),
    };
    lines.push(Line::from(header));

    let content_width = width.saturating_sub(2).max(1);
    let mut body: Vec<Line<'static>> = match msg.speaker {
        Speaker::Bot if msg.text.is_empty() && msg.is_streaming => {
            vec![Line::from(Span::styled(
                format!("{} thinking...", frame_at(spinner_start.elapsed())),
                theme.warning_style(),
            ))]
        }
        Speaker::Bot if msg.text.is_empty() => {
            vec![Line::from(Span::styled("(no response)", theme.dim_style()))]
        }
        Speaker::Bot => render_markdown(&msg.text, theme, content_width),
        Speaker::User => textwrap::wrap(&msg.text, content_width)
            .into_iter()
            .map(|l| Line::from(Span::styled(l.into_owned(), theme.base_style())))
            .collect(),
    };

    if msg.is_streaming && !msg.text.is_empty() {
        let cursor = Span::styled("▌", theme.accent_style());
        match body.last_mut() {
            Some(last) => last.spans.push(cursor),
            None => body.push(Line::from(cursor)),
        }
    }

    lines.extend(body.into_iter().map(|line| {
        let mut spans = vec![Span::raw("  ")];
        spans.extend(line.spans);
        Line::from(spans)
    }));

    // Gap between messages
    lines.push(Line::from(""));
    lines
}

/// All lines of the conversation at the given width
pub fn message_lines(
    messages: &[ChatMessage],
    theme: &Theme,
    width: usize,
    spinner_start: Instant,
) -> Vec<Line<'static>> {
    messages
        .iter()
        .flat_map(|msg| render_message(msg, theme, width, spinner_start))
        .collect()
}

/// Calculate total height of messages
pub fn calculate_message_height(messages: &[ChatMessage], theme: &Theme, width: usize) -> usize {
    message_lines(messages, theme, width, Instant::now()).len()
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let visible: Vec<Line> = message_lines(
            self.messages,
            self.theme,
            area.width as usize,
            self.spinner_start,
        )
        .into_iter()
        .skip(self.scroll)
        .take(area.height as usize)
        .collect();

        Paragraph::new(visible).render(area, buf);
    }
}
