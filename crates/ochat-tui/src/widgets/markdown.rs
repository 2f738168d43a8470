//! Markdown rendering for bot replies

use crate::theme::Theme;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Convert markdown text to styled lines no wider than `width` columns.
///
/// Incomplete markdown is expected: replies are re-rendered on every
/// fragment, so an unterminated code fence or emphasis renders as whatever
/// pulldown-cmark makes of it so far.
pub fn render_markdown(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut out = Renderer::new(theme, width.max(1));
    for event in Parser::new(text) {
        out.event(event);
    }
    out.finish()
}

struct Renderer<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    /// `None` for bullets, `Some(n)` for the next ordered item number
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code_block: Option<String>,
}

impl<'t> Renderer<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width,
            lines: Vec::new(),
            current: Vec::new(),
            style_stack: vec![theme.base_style()],
            lists: Vec::new(),
            quote_depth: 0,
            code_block: None,
        }
    }

    fn style(&self) -> Style {
        self.style_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.theme.base_style())
    }

    fn push_style(&mut self, f: impl FnOnce(Style) -> Style) {
        let next = f(self.style());
        self.style_stack.push(next);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn prefix(&self) -> Vec<Span<'static>> {
        if self.quote_depth == 0 {
            return Vec::new();
        }
        vec![Span::styled(
            "│ ".repeat(self.quote_depth),
            Style::default().fg(self.theme.quote),
        )]
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        let mut prefixed = self.prefix();
        prefixed.extend(spans);
        self.lines.extend(wrap_spans(prefixed, self.width));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::from(""));
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.code_block {
                Some(buffer) => buffer.push_str(&text),
                None => {
                    let style = self.style();
                    self.current.push(Span::styled(text.into_string(), style));
                }
            },
            Event::Code(code) => {
                let style = self.theme.code_style().add_modifier(Modifier::BOLD);
                self.current.push(Span::styled(format!("`{}`", code), style));
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(self.width.min(40)),
                    self.theme.dim_style(),
                )));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let style = self.theme.dim_style();
                self.current.push(Span::styled(html.into_string(), style));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                let accent = self.theme.accent_style();
                self.style_stack.push(match level {
                    HeadingLevel::H1 => accent.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    HeadingLevel::H2 => accent.add_modifier(Modifier::BOLD),
                    _ => accent,
                });
            }
            // Item markers wait for the paragraph text
            Tag::Paragraph if self.lists.is_empty() => self.flush(),
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(|s| s.add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(_) => {
                self.flush();
                self.code_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::styled(
                    format!("{}{}", "  ".repeat(depth), marker),
                    self.theme.dim_style(),
                ));
            }
            Tag::Emphasis => self.push_style(|s| s.add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(|s| s.add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.push_style(|s| s.add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => {
                let link = self.theme.link;
                self.push_style(|s| s.fg(link).add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush();
                self.pop_style();
                self.blank();
            }
            TagEnd::Paragraph => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
                self.blank();
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code_block.take() {
                    self.code_lines(&code);
                }
                self.blank();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.pop_style()
            }
            _ => {}
        }
    }

    /// Code is never wrapped; overlong lines are cut with an ellipsis
    fn code_lines(&mut self, code: &str) {
        let style = self.theme.code_style().add_modifier(Modifier::DIM);
        let budget = self.width.saturating_sub(2);
        for line in code.lines() {
            let shown = if line.width() > budget {
                format!("  {}…", truncate_to_width(line, budget.saturating_sub(1)))
            } else {
                format!("  {}", line)
            };
            let mut spans = self.prefix();
            spans.push(Span::styled(shown, style));
            self.lines.push(Line::from(spans));
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if let Some(code) = self.code_block.take() {
            self.code_lines(&code);
        }
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Longest prefix of `s` that fits in `width` columns
fn truncate_to_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            return &s[..i];
        }
        used += w;
    }
    s
}

/// Greedy word wrap across styled spans. Words wider than a line are split
/// at character boundaries.
fn wrap_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut line: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in spans {
        let style = span.style;
        for word in span.content.split_inclusive(' ') {
            let word_width = word.width();
            let trimmed_width = word.trim_end().width();

            if used > 0 && used + trimmed_width > width {
                lines.push(Line::from(std::mem::take(&mut line)));
                used = 0;
            }

            let room = width.saturating_sub(used);
            if word_width <= room {
                line.push(Span::styled(word.to_string(), style));
                used += word_width;
                continue;
            }
            if trimmed_width <= room {
                line.push(Span::styled(word.trim_end().to_string(), style));
                lines.push(Line::from(std::mem::take(&mut line)));
                used = 0;
                continue;
            }

            // Hard split
            let mut piece = String::new();
            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if used + w > width && used > 0 {
                    if !piece.is_empty() {
                        line.push(Span::styled(std::mem::take(&mut piece), style));
                    }
                    lines.push(Line::from(std::mem::take(&mut line)));
                    used = 0;
                }
                piece.push(c);
                used += w;
            }
            if !piece.is_empty() {
                line.push(Span::styled(piece, style));
            }
        }
    }

    if !line.is_empty() {
        lines.push(Line::from(line));
    }
    lines
}
