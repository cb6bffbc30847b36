//! The listener's input line.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme::StoryTheme;

/// Split `text` around the cursor into (before, under, after), counting
/// in characters so multi-byte input never lands mid-codepoint. A
/// cursor at the end sits under a phantom space.
fn split_at_cursor(text: &str, cursor: usize) -> (String, String, String) {
    let mut chars = text.chars();
    let before: String = chars.by_ref().take(cursor).collect();
    let under = chars
        .next()
        .map(|c| c.to_string())
        .unwrap_or_else(|| " ".to_string());
    let after: String = chars.collect();
    (before, under, after)
}

/// One-line editor where the listener speaks to the teller.
pub struct InputWidget<'a> {
    text: &'a str,
    cursor: usize,
    theme: &'a StoryTheme,
    placeholder: &'a str,
    active: bool,
}

impl<'a> InputWidget<'a> {
    pub fn new(text: &'a str, theme: &'a StoryTheme) -> Self {
        Self {
            text,
            cursor: text.chars().count(),
            theme,
            placeholder: "Speak to the teller...",
            active: true,
        }
    }

    pub fn cursor_position(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Inactive fields render without a cursor cell.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl Widget for InputWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(self.active));
        let inner = block.inner(area);
        block.render(area, buf);

        let prompt = Span::styled("> ", self.theme.player_style());

        let line = if self.text.is_empty() {
            let hint = Span::styled(
                self.placeholder,
                Style::default().add_modifier(Modifier::DIM),
            );
            Line::from(vec![prompt, hint])
        } else if !self.active {
            Line::from(vec![prompt, Span::raw(self.text)])
        } else {
            let (before, under, after) = split_at_cursor(self.text, self.cursor);
            Line::from(vec![
                prompt,
                Span::raw(before),
                Span::styled(
                    under,
                    Style::default()
                        .fg(self.theme.accent)
                        .add_modifier(Modifier::UNDERLINED | Modifier::BOLD),
                ),
                Span::raw(after),
            ])
        };

        Paragraph::new(line).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_in_the_middle() {
        let (before, under, after) = split_at_cursor("go north", 3);
        assert_eq!(before, "go ");
        assert_eq!(under, "n");
        assert_eq!(after, "orth");
    }

    #[test]
    fn test_cursor_at_the_end_gets_a_phantom_cell() {
        let (before, under, after) = split_at_cursor("go", 2);
        assert_eq!(before, "go");
        assert_eq!(under, " ");
        assert_eq!(after, "");
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let (before, under, after) = split_at_cursor("日本語", 1);
        assert_eq!(before, "日");
        assert_eq!(under, "本");
        assert_eq!(after, "語");
    }
}
