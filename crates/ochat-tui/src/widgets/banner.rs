//! Dismissible error banner

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

const DISMISS_HINT: &str = " Esc to dismiss ";

/// Red bordered box holding the current error message
pub struct ErrorBanner<'a> {
    message: &'a str,
    theme: &'a Theme,
}

impl<'a> ErrorBanner<'a> {
    pub fn new(message: &'a str, theme: &'a Theme) -> Self {
        Self { message, theme }
    }

    /// Rows needed at `width`, borders included
    pub fn height(&self, width: u16) -> u16 {
        let inner = width.saturating_sub(2).max(1) as usize;
        let rows = textwrap::wrap(self.message, inner).len().max(1);
        u16::try_from(rows).unwrap_or(u16::MAX).saturating_add(2)
    }
}

impl Widget for ErrorBanner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.error_style())
            .title(Span::styled(
                " Error ",
                self.theme.error_style().add_modifier(Modifier::BOLD),
            ))
            .title_bottom(Line::from(Span::styled(DISMISS_HINT, self.theme.dim_style())).right_aligned());

        Paragraph::new(self.message)
            .style(self.theme.error_style())
            .wrap(Wrap { trim: true })
            .block(block)
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_grows_with_message() {
        let theme = Theme::dark();
        assert_eq!(ErrorBanner::new("short", &theme).height(40), 3);
        let long = "Failed to connect to the server. ".repeat(4);
        assert!(ErrorBanner::new(&long, &theme).height(40) > 3);
    }

    #[test]
    fn test_renders_message() {
        let theme = Theme::dark();
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        ErrorBanner::new("Server error (503)", &theme).render(area, &mut buf);

        let row: String = (0..area.width)
            .map(|x| buf[(x, 1)].symbol().to_string())
            .collect();
        assert!(row.contains("Server error (503)"));
    }
}
