//! Story display widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::scrollbar,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
        StatefulWidget, Widget,
    },
};

use crate::ui::theme::StoryTheme;

/// Widget for the telling itself: the streamed story, the listener's
/// echoed lines, and the live cursor while the teller speaks.
pub struct StoryWidget<'a> {
    story: &'a str,
    theme: &'a StoryTheme,
    title: &'a str,
    scroll: usize,
    streaming: bool,
    error: Option<&'a str>,
}

impl<'a> StoryWidget<'a> {
    pub fn new(story: &'a str, theme: &'a StoryTheme) -> Self {
        Self {
            story,
            theme,
            title: " The Telling ",
            scroll: 0,
            streaming: false,
            error: None,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = title;
        self
    }

    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }
}

impl Widget for StoryWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(self.title)
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width < 2 || inner.height == 0 {
            return;
        }

        // Wrap here rather than in Paragraph so the scroll math sees
        // the real line count.
        let width = inner.width as usize;
        let mut lines: Vec<Line> = Vec::new();

        for source in self.story.lines() {
            if source.is_empty() {
                lines.push(Line::from(""));
                continue;
            }
            let style = if source.starts_with("👉") {
                self.theme.player_style()
            } else {
                self.theme.story_style()
            };
            for wrapped in wrap_line(source, width) {
                lines.push(Line::from(Span::styled(wrapped, style)));
            }
        }

        if self.streaming {
            lines.push(Line::from(Span::styled(
                "▌",
                self.theme.accent_style().add_modifier(Modifier::DIM),
            )));
        }

        if let Some(error) = self.error {
            lines.push(Line::from(""));
            for wrapped in wrap_line(&format!("[ {error} ]"), width) {
                lines.push(Line::from(Span::styled(wrapped, self.theme.error_style())));
            }
        }

        if lines.is_empty() {
            lines.push(Line::from(Span::styled(
                "The fire is lit. The teller waits.",
                self.theme.system_style(),
            )));
        }

        let visible_height = inner.height as usize;
        let total_lines = lines.len();
        let max_scroll = total_lines.saturating_sub(visible_height);
        let scroll = self.scroll.min(max_scroll);

        let paragraph = Paragraph::new(lines).scroll((scroll as u16, 0));
        paragraph.render(inner, buf);

        // Scrollbar and position hints when the telling has outgrown
        // the pane.
        if total_lines > visible_height {
            let scrollbar_area = Rect {
                x: inner.x + inner.width.saturating_sub(1),
                y: inner.y,
                width: 1,
                height: inner.height,
            };

            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .symbols(scrollbar::VERTICAL)
                .thumb_style(Style::default().fg(Color::DarkGray))
                .track_style(Style::default().fg(Color::Black))
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"));

            let mut scrollbar_state = ScrollbarState::new(max_scroll).position(scroll);
            scrollbar.render(scrollbar_area, buf, &mut scrollbar_state);

            if scroll < max_scroll {
                let remaining = max_scroll - scroll;
                let hint = format!(" ↓{remaining} more ");
                let hint_y = inner.y + inner.height.saturating_sub(1);
                let hint_style = Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM);
                for (i, ch) in hint.chars().enumerate() {
                    let x = inner.x + (i as u16);
                    if x < inner.x + inner.width.saturating_sub(2) {
                        buf[(x, hint_y)].set_char(ch).set_style(hint_style);
                    }
                }
            }
        }
    }
}

/// Word-wrap one source line to the given width, counting chars.
fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut wrapped = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > width {
            wrapped.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if word_len > width {
            // A single over-long word is split hard.
            for ch in word.chars() {
                if current_len == width {
                    wrapped.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
            continue;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        wrapped.push(current);
    }
    if wrapped.is_empty() {
        wrapped.push(String::new());
    }
    wrapped
}
