//! Choice list widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::ui::theme::StoryTheme;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Widget for the numbered choices offered at the end of a turn.
///
/// While the teller is still speaking the choices are withheld and a
/// spinner is shown instead.
pub struct OptionsWidget<'a> {
    options: &'a [String],
    theme: &'a StoryTheme,
    generating: bool,
    defeated: bool,
    animation_frame: u8,
}

impl<'a> OptionsWidget<'a> {
    pub fn new(options: &'a [String], theme: &'a StoryTheme) -> Self {
        Self {
            options,
            theme,
            generating: false,
            defeated: false,
            animation_frame: 0,
        }
    }

    pub fn generating(mut self, generating: bool) -> Self {
        self.generating = generating;
        self
    }

    pub fn defeated(mut self, defeated: bool) -> Self {
        self.defeated = defeated;
        self
    }

    pub fn animation_frame(mut self, frame: u8) -> Self {
        self.animation_frame = frame;
        self
    }

    /// Rows this widget wants, border included.
    pub fn height(options: &[String], generating: bool) -> u16 {
        if generating {
            return 3;
        }
        (options.len().max(1) as u16).saturating_add(2)
    }
}

impl Widget for OptionsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" At the Fork ")
            .borders(Borders::ALL)
            .border_style(self.theme.border_style(false));

        let inner = block.inner(area);
        block.render(area, buf);

        let lines: Vec<Line> = if self.generating {
            let spinner = SPINNER[self.animation_frame as usize % SPINNER.len()];
            vec![Line::from(Span::styled(
                format!("{spinner} the teller is speaking"),
                self.theme.system_style(),
            ))]
        } else if self.defeated {
            vec![Line::from(Span::styled(
                "Your hero lies still. (e for the judgement, r for a new evening)",
                self.theme.system_style(),
            ))]
        } else if self.options.is_empty() {
            vec![Line::from(Span::styled(
                "Press i and tell the teller what you want to hear.",
                self.theme.system_style(),
            ))]
        } else {
            self.options
                .iter()
                .enumerate()
                .map(|(i, option)| {
                    Line::from(vec![
                        Span::styled(format!("{}. ", i + 1), self.theme.accent_style()),
                        Span::styled(option.clone(), self.theme.story_style()),
                    ])
                })
                .collect()
        };

        Paragraph::new(lines).render(inner, buf);
    }
}
