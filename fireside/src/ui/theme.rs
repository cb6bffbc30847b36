//! Color theme and styling for the Fireside TUI

use ratatui::style::{Color, Modifier, Style};

use fireside_core::{Genre, Persona};

/// UI color theme, tinted by the evening's storyteller.
#[derive(Debug, Clone)]
pub struct StoryTheme {
    /// The teller's signature color: titles, choice numbers, the
    /// streaming cursor.
    pub accent: Color,
    pub border: Color,
    pub story_text: Color,
    pub system_text: Color,
    pub error_text: Color,

    // HP colors
    pub hp_healthy: Color,
    pub hp_wounded: Color,
    pub hp_critical: Color,
}

impl Default for StoryTheme {
    fn default() -> Self {
        Self {
            accent: Color::Yellow,
            border: Color::DarkGray,
            story_text: Color::White,
            system_text: Color::DarkGray,
            error_text: Color::Red,

            hp_healthy: Color::Green,
            hp_wounded: Color::Yellow,
            hp_critical: Color::Red,
        }
    }
}

impl StoryTheme {
    /// The theme for a given teller: ember amber for the Old Knight,
    /// violet for the Stranger, neon cyan for the Drifter.
    pub fn for_persona(persona: &Persona) -> Self {
        let accent = match persona {
            Persona::OldKnight => Color::Yellow,
            Persona::Stranger => Color::Magenta,
            Persona::Drifter => Color::Cyan,
            Persona::Custom { genre, .. } => match genre {
                Genre::Fantasy => Color::Yellow,
                Genre::Horror => Color::Magenta,
                Genre::ScienceFiction => Color::Green,
                Genre::UrbanLegend => Color::Cyan,
                Genre::HealingTale => Color::LightBlue,
            },
        };
        Self {
            accent,
            ..Self::default()
        }
    }

    /// Get style for story prose
    pub fn story_style(&self) -> Style {
        Style::default().fg(self.story_text)
    }

    /// Get style for the listener's echoed lines
    pub fn player_style(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::ITALIC)
    }

    /// Get style for system messages and hints
    pub fn system_style(&self) -> Style {
        Style::default()
            .fg(self.system_text)
            .add_modifier(Modifier::DIM)
    }

    /// Get style for stream failures
    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error_text)
    }

    /// Get style for accented UI chrome
    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    /// Get style for bold titles
    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    /// Get border style
    pub fn border_style(&self, active: bool) -> Style {
        Style::default().fg(if active { self.accent } else { self.border })
    }

    /// Get HP bar color based on ratio
    pub fn hp_color(&self, ratio: f32) -> Color {
        if ratio > 0.5 {
            self.hp_healthy
        } else if ratio > 0.25 {
            self.hp_wounded
        } else {
            self.hp_critical
        }
    }
}
