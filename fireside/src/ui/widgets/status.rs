//! Status and hotkey bar widgets

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use fireside_core::adventure::STARTING_HP;

use crate::app::InputMode;
use crate::ui::theme::StoryTheme;

/// One-line status bar: mode, teller, hit points, messages.
pub struct StatusBarWidget<'a> {
    teller: &'a str,
    genre: &'a str,
    input_mode: InputMode,
    hit_points: Option<u32>,
    message: Option<&'a str>,
    theme: &'a StoryTheme,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(teller: &'a str, genre: &'a str, input_mode: InputMode, theme: &'a StoryTheme) -> Self {
        Self {
            teller,
            genre,
            input_mode,
            hit_points: None,
            message: None,
            theme,
        }
    }

    pub fn hit_points(mut self, hp: Option<u32>) -> Self {
        self.hit_points = hp;
        self
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mode_label = match self.input_mode {
            InputMode::Normal => " NORMAL ",
            InputMode::Insert => " INSERT ",
        };

        let mut spans = vec![
            Span::styled(
                mode_label,
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED),
            ),
            Span::raw(" "),
            Span::styled(self.teller, self.theme.accent_style()),
            Span::styled(format!(" ({})", self.genre), self.theme.system_style()),
        ];

        if let Some(hp) = self.hit_points {
            let ratio = hp as f32 / STARTING_HP as f32;
            spans.push(Span::raw("  "));
            spans.push(Span::styled(
                format!("HP {hp}/{STARTING_HP}"),
                Style::default().fg(self.theme.hp_color(ratio)),
            ));
        }

        if let Some(message) = self.message {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(message.to_string(), self.theme.story_style()));
        }

        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}

/// Context-sensitive key hints, rendered dim under the status bar.
pub struct HotkeyBarWidget<'a> {
    input_mode: InputMode,
    adventure: bool,
    encounter: bool,
    theme: &'a StoryTheme,
}

impl<'a> HotkeyBarWidget<'a> {
    pub fn new(input_mode: InputMode, theme: &'a StoryTheme) -> Self {
        Self {
            input_mode,
            adventure: false,
            encounter: false,
            theme,
        }
    }

    pub fn adventure(mut self, adventure: bool) -> Self {
        self.adventure = adventure;
        self
    }

    pub fn encounter(mut self, encounter: bool) -> Self {
        self.encounter = encounter;
        self
    }
}

impl Widget for HotkeyBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let hints = if self.encounter {
            " a attack | f flee "
        } else {
            match self.input_mode {
                InputMode::Insert => " Enter send | Esc back to normal ",
                InputMode::Normal if self.adventure => {
                    " i speak | 1-9 choose | j/k scroll | f fight | e judgement | r new evening | ? help | q quit "
                }
                InputMode::Normal => {
                    " i speak | 1-9 choose | j/k scroll | r new evening | ? help | q quit "
                }
            }
        };

        Paragraph::new(Line::from(Span::styled(hints, self.theme.system_style())))
            .render(area, buf);
    }
}
