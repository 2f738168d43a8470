//! Welcome panel shown before the first message

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

const TRACKS: &[(&str, &str)] = &[
    (
        "Math Olympiad",
        "Get tips on problem-solving techniques, past papers, and study materials.",
    ),
    (
        "Science Olympiad",
        "Explore topics in physics, chemistry, and biology with curated resources.",
    ),
    (
        "Programming Olympiad",
        "Practice coding problems and learn algorithms and data structures.",
    ),
];

const KEYS: &[(&str, &str)] = &[
    ("Enter", "Send message"),
    ("Esc", "Cancel reply / dismiss error"),
    ("Ctrl+C", "Cancel / Quit"),
    ("PgUp/Dn", "Scroll history"),
];

/// Introduction to the Olympiad preparation assistant
pub struct WelcomePanel<'a> {
    theme: &'a Theme,
    endpoint: Option<&'a str>,
}

impl<'a> WelcomePanel<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            endpoint: None,
        }
    }

    /// Show which server replies come from
    pub fn endpoint(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let theme = self.theme;
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "  Welcome to the Olympiad Preparation Chat!",
                theme.accent_bold(),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "  This chat is designed to help you prepare for various Olympiads by \
                 providing information, resources, and practice questions.",
                theme.base_style(),
            )),
            Line::from(""),
        ];

        for (track, blurb) in TRACKS {
            lines.push(Line::from(vec![
                Span::styled("    • ", theme.dim_style()),
                Span::styled(
                    format!("{}: ", track),
                    theme.base_style().add_modifier(Modifier::BOLD),
                ),
                Span::styled(*blurb, theme.base_style()),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Feel free to ask any questions or request specific resources to aid your preparation!",
            theme.dim_style(),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("  Keybindings", theme.warning_style())));
        for (key, what) in KEYS {
            lines.push(Line::from(vec![
                Span::styled(format!("    {:<10}", key), theme.accent_style()),
                Span::styled(*what, theme.base_style()),
            ]));
        }

        if let Some(endpoint) = self.endpoint {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("  Server: {}", endpoint),
                theme.dim_style(),
            )));
        }
        lines
    }
}

impl Widget for WelcomePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.lines())
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_track() {
        let theme = Theme::dark();
        let text: Vec<String> = WelcomePanel::new(&theme)
            .lines()
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect();
        for (track, _) in TRACKS {
            assert!(text.iter().any(|l| l.contains(track)));
        }
        assert!(!text.iter().any(|l| l.contains("Server:")));
    }

    #[test]
    fn test_shows_endpoint() {
        let theme = Theme::dark();
        let lines = WelcomePanel::new(&theme).endpoint("http://localhost:8000").lines();
        let last: String = lines
            .last()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .unwrap_or_default();
        assert_eq!(last, "  Server: http://localhost:8000");
    }
}
