//! Tavern-night setup wizard.
//!
//! A multi-step interface for settling into the inn: pick the teller,
//! the shape of the evening, and, for a dungeon run, the hero and the
//! world it happens in.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use fireside_core::adventure::{Hero, WorldSetup, MAX_NAME_CHARS, MAX_TRAIT_CHARS};
use fireside_core::{Genre, Persona, StoryMode};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::ui::render::centered_rect_fixed;
use crate::ui::theme::StoryTheme;

const DEFAULT_TELLER_NAME: &str = "A Newcomer";
const DEFAULT_TELLER_STYLE: &str = "a newcomer whose stories no one here has heard before";
const DEFAULT_HERO_NAME: &str = "Traveler";
const DEFAULT_APPEARANCE: &str = "a travel-worn wanderer in a road-stained cloak";
const DEFAULT_BACKSTORY: &str = "left home with nothing but the clothes on their back";
const DEFAULT_WEAKNESS: &str = "too curious for their own good";
const DEFAULT_SKILL: &str = "a knack for being overlooked";
const DEFAULT_SETTING: &str = "a forgotten dungeon beneath the inn";
const DEFAULT_GOAL: &str = "find the dawn door and walk back out alive";

/// Steps in the tavern night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TavernStep {
    Welcome,
    Teller,
    TellerName,
    TellerGenre,
    TellerStyle,
    Mode,
    Topic,
    HeroName,
    Appearance,
    Backstory,
    Weakness,
    Skill,
    Setting,
    Goal,
    Review,
}

impl TavernStep {
    pub fn title(&self) -> &'static str {
        match self {
            TavernStep::Welcome => "The Wanderer's Inn",
            TavernStep::Teller => "Choose Your Teller",
            TavernStep::TellerName => "Name the Teller",
            TavernStep::TellerGenre => "Choose Their Genre",
            TavernStep::TellerStyle => "Describe Their Voice",
            TavernStep::Mode => "Shape of the Evening",
            TavernStep::Topic => "Name a Subject",
            TavernStep::HeroName => "Name Your Hero",
            TavernStep::Appearance => "Describe Your Hero",
            TavernStep::Backstory => "Where They Come From",
            TavernStep::Weakness => "Their Weakness",
            TavernStep::Skill => "Their Signature Skill",
            TavernStep::Setting => "Where the Run Happens",
            TavernStep::Goal => "What the Run Is For",
            TavernStep::Review => "The Evening Ahead",
        }
    }

    /// The step after this one. Custom tellers take a side road, and
    /// the mode decides whether hero steps appear at all.
    pub fn next(&self, custom_teller: bool, mode: StoryMode) -> Option<TavernStep> {
        match self {
            TavernStep::Welcome => Some(TavernStep::Teller),
            TavernStep::Teller => {
                if custom_teller {
                    Some(TavernStep::TellerName)
                } else {
                    Some(TavernStep::Mode)
                }
            }
            TavernStep::TellerName => Some(TavernStep::TellerGenre),
            TavernStep::TellerGenre => Some(TavernStep::TellerStyle),
            TavernStep::TellerStyle => Some(TavernStep::Mode),
            TavernStep::Mode => match mode {
                StoryMode::Tale => Some(TavernStep::Topic),
                StoryMode::Adventure => Some(TavernStep::HeroName),
            },
            TavernStep::Topic => Some(TavernStep::Review),
            TavernStep::HeroName => Some(TavernStep::Appearance),
            TavernStep::Appearance => Some(TavernStep::Backstory),
            TavernStep::Backstory => Some(TavernStep::Weakness),
            TavernStep::Weakness => Some(TavernStep::Skill),
            TavernStep::Skill => Some(TavernStep::Setting),
            TavernStep::Setting => Some(TavernStep::Goal),
            TavernStep::Goal => Some(TavernStep::Review),
            TavernStep::Review => None,
        }
    }

    pub fn prev(&self, custom_teller: bool, mode: StoryMode) -> Option<TavernStep> {
        match self {
            TavernStep::Welcome => None,
            TavernStep::Teller => Some(TavernStep::Welcome),
            TavernStep::TellerName => Some(TavernStep::Teller),
            TavernStep::TellerGenre => Some(TavernStep::TellerName),
            TavernStep::TellerStyle => Some(TavernStep::TellerGenre),
            TavernStep::Mode => {
                if custom_teller {
                    Some(TavernStep::TellerStyle)
                } else {
                    Some(TavernStep::Teller)
                }
            }
            TavernStep::Topic => Some(TavernStep::Mode),
            TavernStep::HeroName => Some(TavernStep::Mode),
            TavernStep::Appearance => Some(TavernStep::HeroName),
            TavernStep::Backstory => Some(TavernStep::Appearance),
            TavernStep::Weakness => Some(TavernStep::Backstory),
            TavernStep::Skill => Some(TavernStep::Weakness),
            TavernStep::Setting => Some(TavernStep::Skill),
            TavernStep::Goal => Some(TavernStep::Setting),
            TavernStep::Review => match mode {
                StoryMode::Tale => Some(TavernStep::Topic),
                StoryMode::Adventure => Some(TavernStep::Goal),
            },
        }
    }
}

/// What the listener asked for, ready to hand to a session.
#[derive(Debug, Clone)]
pub enum EveningPlan {
    Tale {
        persona: Persona,
        topic: String,
    },
    Adventure {
        persona: Persona,
        hero: Hero,
        world: WorldSetup,
    },
}

/// Tavern wizard state.
pub struct TavernNight {
    pub step: TavernStep,
    pub teller_index: usize,
    pub genre_index: usize,
    pub mode_index: usize,
    pub teller_name: String,
    pub teller_style: String,
    pub topic: String,
    pub hero_name: String,
    pub appearance: String,
    pub backstory: String,
    pub weakness: String,
    pub skill: String,
    pub setting: String,
    pub goal: String,
    pub narration_enabled: bool,

    // UI state
    pub theme: StoryTheme,
    pub list_state: ListState,
    pub cursor_position: usize,
    /// Set when Tab asks the model to sketch the hero; the outer loop
    /// resolves it and writes the answer back into `appearance`.
    pub pending_appearance: Option<String>,
    pub sketching: bool,
    pub error: Option<String>,
    pub finished: bool,
    pub cancelled: bool,
}

impl TavernNight {
    pub fn new(narration_enabled: bool) -> Self {
        Self {
            step: TavernStep::Welcome,
            teller_index: 0,
            genre_index: 0,
            mode_index: 0,
            teller_name: String::new(),
            teller_style: String::new(),
            topic: String::new(),
            hero_name: String::new(),
            appearance: String::new(),
            backstory: String::new(),
            weakness: String::new(),
            skill: String::new(),
            setting: String::new(),
            goal: String::new(),
            narration_enabled,
            theme: StoryTheme::default(),
            list_state: ListState::default(),
            cursor_position: 0,
            pending_appearance: None,
            sketching: false,
            error: None,
            finished: false,
            cancelled: false,
        }
    }

    /// Preselect the custom-teller genre from a saved label.
    pub fn with_default_genre(mut self, label: Option<&str>) -> Self {
        if let Some(label) = label {
            if let Some(i) = Genre::all().iter().position(|g| g.label() == label) {
                self.genre_index = i;
            }
        }
        self
    }

    pub fn custom_teller(&self) -> bool {
        self.teller_index >= Persona::presets().len()
    }

    pub fn mode(&self) -> StoryMode {
        if self.mode_index == 0 {
            StoryMode::Tale
        } else {
            StoryMode::Adventure
        }
    }

    /// The teller as currently configured.
    pub fn persona(&self) -> Persona {
        if self.custom_teller() {
            Persona::custom(
                defaulted(&self.teller_name, DEFAULT_TELLER_NAME),
                Genre::all()[self.genre_index],
                defaulted(&self.teller_style, DEFAULT_TELLER_STYLE),
            )
        } else {
            Persona::presets()[self.teller_index].clone()
        }
    }

    /// Build the plan from current selections. Blank fields fall back
    /// to stock answers so Enter-through-everything still plays.
    pub fn build_plan(&self) -> Result<EveningPlan, fireside_core::adventure::AdventureError> {
        let persona = self.persona();
        match self.mode() {
            StoryMode::Tale => Ok(EveningPlan::Tale {
                persona,
                topic: self.topic.trim().to_string(),
            }),
            StoryMode::Adventure => {
                let hero = Hero::new(
                    defaulted(&self.hero_name, DEFAULT_HERO_NAME),
                    defaulted(&self.appearance, DEFAULT_APPEARANCE),
                    defaulted(&self.backstory, DEFAULT_BACKSTORY),
                    defaulted(&self.weakness, DEFAULT_WEAKNESS),
                    defaulted(&self.skill, DEFAULT_SKILL),
                )?;
                let world = WorldSetup::new(
                    defaulted(&self.setting, DEFAULT_SETTING),
                    defaulted(&self.goal, DEFAULT_GOAL),
                );
                Ok(EveningPlan::Adventure {
                    persona,
                    hero,
                    world,
                })
            }
        }
    }

    /// Handle keyboard input.
    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind != KeyEventKind::Press {
                return;
            }
            match self.step {
                TavernStep::Welcome => self.handle_welcome(key),
                TavernStep::Teller => {
                    self.handle_list_selection(key, Persona::presets().len() + 1)
                }
                TavernStep::TellerGenre => self.handle_list_selection(key, Genre::all().len()),
                TavernStep::Mode => self.handle_list_selection(key, 2),
                TavernStep::Review => self.handle_review(key),
                _ => self.handle_text_input(key),
            }
        }
    }

    fn handle_welcome(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.advance_step(),
            KeyCode::Char('n') => self.narration_enabled = !self.narration_enabled,
            KeyCode::Esc | KeyCode::Char('q') => self.cancelled = true,
            _ => {}
        }
    }

    fn handle_list_selection(&mut self, key: KeyEvent, max_items: usize) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                let i = self.list_state.selected().unwrap_or(0);
                self.list_state
                    .select(Some(if i == 0 { max_items - 1 } else { i - 1 }));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let i = self.list_state.selected().unwrap_or(0);
                self.list_state.select(Some((i + 1) % max_items));
            }
            KeyCode::Enter => self.confirm_selection(),
            KeyCode::Esc => self.retreat_step(),
            _ => {}
        }
    }

    fn handle_text_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.type_char(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete_char(),
            KeyCode::Left => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                self.cursor_position = (self.cursor_position + 1).min(self.active_len());
            }
            KeyCode::Tab if self.step == TavernStep::Appearance => {
                let description = if self.appearance.trim().is_empty() {
                    defaulted(&self.hero_name, DEFAULT_HERO_NAME)
                } else {
                    self.appearance.clone()
                };
                self.pending_appearance = Some(description);
            }
            KeyCode::Enter => self.advance_step(),
            KeyCode::Esc => self.retreat_step(),
            _ => {}
        }
    }

    fn handle_review(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') => self.finished = true,
            KeyCode::Esc | KeyCode::Char('n') => self.retreat_step(),
            _ => {}
        }
    }

    fn confirm_selection(&mut self) {
        let Some(i) = self.list_state.selected() else {
            return;
        };
        match self.step {
            TavernStep::Teller => self.teller_index = i,
            TavernStep::TellerGenre => self.genre_index = i,
            TavernStep::Mode => self.mode_index = i,
            _ => return,
        }
        self.theme = StoryTheme::for_persona(&self.persona());
        self.advance_step();
    }

    fn advance_step(&mut self) {
        if let Some(next) = self.step.next(self.custom_teller(), self.mode()) {
            self.step = next;
            self.error = None;
            self.cursor_position = self.active_len();
            self.list_state.select(Some(self.initial_selection()));
        }
    }

    fn retreat_step(&mut self) {
        if let Some(prev) = self.step.prev(self.custom_teller(), self.mode()) {
            self.step = prev;
            self.cursor_position = self.active_len();
            self.list_state.select(Some(self.initial_selection()));
        } else {
            self.cancelled = true;
        }
    }

    /// Where the cursor lands on entering a list step. Remembered
    /// genres come back preselected.
    fn initial_selection(&self) -> usize {
        match self.step {
            TavernStep::Teller => self.teller_index,
            TavernStep::TellerGenre => self.genre_index,
            TavernStep::Mode => self.mode_index,
            _ => 0,
        }
    }

    fn active_field(&mut self) -> Option<&mut String> {
        match self.step {
            TavernStep::TellerName => Some(&mut self.teller_name),
            TavernStep::TellerStyle => Some(&mut self.teller_style),
            TavernStep::Topic => Some(&mut self.topic),
            TavernStep::HeroName => Some(&mut self.hero_name),
            TavernStep::Appearance => Some(&mut self.appearance),
            TavernStep::Backstory => Some(&mut self.backstory),
            TavernStep::Weakness => Some(&mut self.weakness),
            TavernStep::Skill => Some(&mut self.skill),
            TavernStep::Setting => Some(&mut self.setting),
            TavernStep::Goal => Some(&mut self.goal),
            _ => None,
        }
    }

    fn active_text(&self) -> &str {
        match self.step {
            TavernStep::TellerName => &self.teller_name,
            TavernStep::TellerStyle => &self.teller_style,
            TavernStep::Topic => &self.topic,
            TavernStep::HeroName => &self.hero_name,
            TavernStep::Appearance => &self.appearance,
            TavernStep::Backstory => &self.backstory,
            TavernStep::Weakness => &self.weakness,
            TavernStep::Skill => &self.skill,
            TavernStep::Setting => &self.setting,
            TavernStep::Goal => &self.goal,
            _ => "",
        }
    }

    fn active_len(&self) -> usize {
        self.active_text().chars().count()
    }

    fn field_limit(&self) -> usize {
        match self.step {
            TavernStep::HeroName => MAX_NAME_CHARS,
            _ => MAX_TRAIT_CHARS,
        }
    }

    fn type_char(&mut self, c: char) {
        let limit = self.field_limit();
        let cursor = self.cursor_position;
        let Some(field) = self.active_field() else {
            return;
        };
        if field.chars().count() >= limit {
            return;
        }
        let byte_pos = field
            .char_indices()
            .nth(cursor)
            .map(|(i, _)| i)
            .unwrap_or(field.len());
        field.insert(byte_pos, c);
        self.cursor_position += 1;
    }

    fn backspace(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let cursor = self.cursor_position - 1;
        let Some(field) = self.active_field() else {
            return;
        };
        if let Some((byte_pos, ch)) = field.char_indices().nth(cursor) {
            field.replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
            self.cursor_position = cursor;
        }
    }

    fn delete_char(&mut self) {
        let cursor = self.cursor_position;
        let Some(field) = self.active_field() else {
            return;
        };
        if let Some((byte_pos, ch)) = field.char_indices().nth(cursor) {
            field.replace_range(byte_pos..byte_pos + ch.len_utf8(), "");
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the tavern UI.
    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(Clear, area);

        if self.step == TavernStep::Welcome {
            self.render_welcome(frame, area);
            return;
        }
        if self.step == TavernStep::Review {
            self.render_review(frame, area);
            return;
        }

        // Two-column layout: current step on the left, the evening so
        // far on the right
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let left_block = Block::default()
            .title(format!(" {} ", self.step.title()))
            .borders(Borders::ALL)
            .border_style(self.theme.accent_style());

        let left_inner = left_block.inner(columns[0]);
        frame.render_widget(left_block, columns[0]);

        match self.step {
            TavernStep::Teller => self.render_teller_selection(frame, left_inner),
            TavernStep::TellerGenre => self.render_genre_selection(frame, left_inner),
            TavernStep::Mode => self.render_mode_selection(frame, left_inner),
            _ => self.render_text_step(frame, left_inner),
        }

        self.render_preview(frame, columns[1]);
    }

    fn render_welcome(&self, frame: &mut Frame, area: Rect) {
        let narration = if self.narration_enabled { "on" } else { "off" };
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "The Wanderer's Inn",
                self.theme.title_style(),
            ))
            .centered(),
            Line::from(Span::styled(
                "rest a while, and listen",
                self.theme.system_style(),
            ))
            .centered(),
            Line::from(""),
            Line::from("A fire, a teller, and a story that bends to your word.").centered(),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter", self.theme.accent_style()),
                Span::raw("  step inside"),
            ])
            .centered(),
            Line::from(vec![
                Span::styled("n", self.theme.accent_style()),
                Span::raw(format!("      narration: {narration}")),
            ])
            .centered(),
            Line::from(vec![
                Span::styled("q", self.theme.accent_style()),
                Span::raw("      back into the night"),
            ])
            .centered(),
        ];

        let panel = centered_rect_fixed(56, 13, area);
        let splash = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(self.theme.accent_style()),
        );
        frame.render_widget(splash, panel);
    }

    fn render_teller_selection(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let mut items: Vec<ListItem> = Persona::presets()
            .iter()
            .map(|p| {
                ListItem::new(format!("{} ({})", p.name(), p.genre_label()))
                    .style(Style::default().fg(Color::White))
            })
            .collect();
        items.push(
            ListItem::new("Someone new...").style(Style::default().fg(Color::White)),
        );

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Tellers "))
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, chunks[0], &mut self.list_state);

        let selected = self.list_state.selected().unwrap_or(0);
        let description = if selected < Persona::presets().len() {
            let persona = &Persona::presets()[selected];
            format!("{}\n\nTells: {}", persona.tagline(), persona.genre_label())
        } else {
            "Invent a teller of your own: a name, a genre, and a voice.".to_string()
        };
        let desc = Paragraph::new(description)
            .block(Block::default().borders(Borders::ALL).title(" About "))
            .wrap(Wrap { trim: true });
        frame.render_widget(desc, chunks[1]);
    }

    fn render_genre_selection(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = Genre::all()
            .iter()
            .map(|g| ListItem::new(g.label()).style(Style::default().fg(Color::White)))
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Genres "))
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_mode_selection(&mut self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let items = vec![
            ListItem::new("A quiet tale").style(Style::default().fg(Color::White)),
            ListItem::new("A dungeon run").style(Style::default().fg(Color::White)),
        ];

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" Evenings "))
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, chunks[0], &mut self.list_state);

        let description = match self.list_state.selected().unwrap_or(0) {
            0 => {
                "An open-ended telling. Speak at the forks, or let the teller wander. \
                 No dice, no death."
            }
            _ => {
                "A hero, a world, a goal. Hit points are real, foes bar the way, and \
                 the teller's judgement waits at the end."
            }
        };
        let desc = Paragraph::new(description)
            .block(Block::default().borders(Borders::ALL).title(" About "))
            .wrap(Wrap { trim: true });
        frame.render_widget(desc, chunks[1]);
    }

    fn render_text_step(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
            ])
            .split(area);

        let prompt = Paragraph::new(self.prompt_text())
            .style(self.theme.accent_style())
            .wrap(Wrap { trim: true });
        frame.render_widget(prompt, chunks[0]);

        let input = Paragraph::new(format!("{}█", self.active_text()))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", self.field_label())),
            )
            .style(Style::default().fg(Color::White));
        frame.render_widget(input, chunks[1]);

        let help = if self.sketching {
            Paragraph::new("The teller is sketching your hero...")
                .style(self.theme.system_style())
        } else if let Some(error) = &self.error {
            Paragraph::new(error.clone()).style(self.theme.error_style())
        } else {
            Paragraph::new(self.help_text()).style(Style::default().fg(Color::DarkGray))
        };
        frame.render_widget(help, chunks[2]);
    }

    fn prompt_text(&self) -> &'static str {
        match self.step {
            TavernStep::TellerName => "What do they call this newcomer?",
            TavernStep::TellerStyle => "How do they tell a story?",
            TavernStep::Topic => {
                "What should tonight's tale tell? Leave blank and the teller will choose."
            }
            TavernStep::HeroName => "What is your hero's name?",
            TavernStep::Appearance => "What does the firelight show of them?",
            TavernStep::Backstory => "What road brought them here?",
            TavernStep::Weakness => "What flaw do they carry?",
            TavernStep::Skill => "What are they quietly good at?",
            TavernStep::Setting => "Where does the run take place?",
            TavernStep::Goal => "What would make the night a victory?",
            _ => "",
        }
    }

    fn field_label(&self) -> &'static str {
        match self.step {
            TavernStep::TellerName | TavernStep::HeroName => "Name",
            TavernStep::TellerStyle => "Voice",
            TavernStep::Topic => "Topic",
            TavernStep::Appearance => "Appearance",
            TavernStep::Backstory => "Backstory",
            TavernStep::Weakness => "Weakness",
            TavernStep::Skill => "Skill",
            TavernStep::Setting => "Setting",
            TavernStep::Goal => "Goal",
            _ => "",
        }
    }

    fn help_text(&self) -> &'static str {
        match self.step {
            TavernStep::Appearance => {
                "Enter to continue (blank lets the teller decide), Tab to have the \
                 teller sketch them, Esc to go back"
            }
            _ => "Enter to continue (blank lets the teller decide), Esc to go back",
        }
    }

    /// The evening-so-far panel.
    fn render_preview(&self, frame: &mut Frame, area: Rect) {
        let persona = self.persona();

        let block = Block::default()
            .title(" Tonight ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let label = Style::default().fg(Color::DarkGray);
        let narration = if self.narration_enabled { "on" } else { "off" };

        let mut lines = vec![
            Line::from(vec![
                Span::styled("Teller: ", label),
                Span::styled(persona.name().to_string(), self.theme.accent_style()),
            ]),
            Line::from(Span::styled(
                format!("  {}", persona.genre_label()),
                self.theme.system_style(),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Evening: ", label),
                Span::raw(match self.mode() {
                    StoryMode::Tale => "a quiet tale",
                    StoryMode::Adventure => "a dungeon run",
                }),
            ]),
            Line::from(vec![Span::styled("Narration: ", label), Span::raw(narration)]),
            Line::from(""),
        ];

        match self.mode() {
            StoryMode::Tale => {
                lines.push(Line::from(vec![
                    Span::styled("Topic: ", label),
                    Span::raw(defaulted(&self.topic, "the teller's choice")),
                ]));
            }
            StoryMode::Adventure => {
                lines.push(Line::from(vec![
                    Span::styled("Hero: ", label),
                    Span::raw(defaulted(&self.hero_name, DEFAULT_HERO_NAME)),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("Setting: ", label),
                    Span::raw(defaulted(&self.setting, DEFAULT_SETTING)),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("Goal: ", label),
                    Span::raw(defaulted(&self.goal, DEFAULT_GOAL)),
                ]));
            }
        }

        let preview = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(preview, inner);
    }

    fn render_review(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let persona = self.persona();

        let sheet_block = Block::default()
            .title(format!(" {} ", self.step.title()))
            .borders(Borders::ALL)
            .border_style(self.theme.accent_style());
        let sheet_inner = sheet_block.inner(columns[0]);
        frame.render_widget(sheet_block, columns[0]);

        let label = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(vec![
                Span::styled("Teller: ", label),
                Span::styled(persona.name().to_string(), self.theme.accent_style()),
                Span::styled(format!("  ({})", persona.genre_label()), label),
            ]),
            Line::from(Span::styled(
                persona.tagline().to_string(),
                self.theme.system_style(),
            )),
            Line::from(""),
        ];

        match self.mode() {
            StoryMode::Tale => {
                lines.push(Line::from(vec![
                    Span::styled("A quiet tale about: ", label),
                    Span::raw(defaulted(&self.topic, "whatever the teller chooses")),
                ]));
            }
            StoryMode::Adventure => {
                lines.push(Line::from(vec![
                    Span::styled("A dungeon run for ", label),
                    Span::raw(defaulted(&self.hero_name, DEFAULT_HERO_NAME)),
                ]));
                lines.push(Line::from(""));
                for (name, value, fallback) in [
                    ("Look", &self.appearance, DEFAULT_APPEARANCE),
                    ("From", &self.backstory, DEFAULT_BACKSTORY),
                    ("Flaw", &self.weakness, DEFAULT_WEAKNESS),
                    ("Skill", &self.skill, DEFAULT_SKILL),
                    ("Setting", &self.setting, DEFAULT_SETTING),
                    ("Goal", &self.goal, DEFAULT_GOAL),
                ] {
                    lines.push(Line::from(vec![
                        Span::styled(format!("{name}: "), label),
                        Span::raw(defaulted(value, fallback)),
                    ]));
                }
            }
        }

        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Narration: ", label),
            Span::raw(if self.narration_enabled { "on" } else { "off" }),
        ]));

        frame.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: true }),
            sheet_inner,
        );

        // Confirmation panel
        let confirm_block = Block::default()
            .title(" Settle In ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));
        let confirm_inner = confirm_block.inner(columns[1]);
        frame.render_widget(confirm_block, columns[1]);

        let mut confirm_text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Ready to hear it?",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  Enter",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" or "),
                Span::styled(
                    "Y",
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" - Take your seat"),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    "  Esc",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" or "),
                Span::styled(
                    "N",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" - Go back"),
            ]),
        ];

        if let Some(error) = &self.error {
            confirm_text.push(Line::from(""));
            confirm_text.push(Line::from(Span::styled(
                error.clone(),
                self.theme.error_style(),
            )));
        }

        frame.render_widget(Paragraph::new(confirm_text), confirm_inner);
    }
}

fn defaulted(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(start: TavernStep, custom: bool, mode: StoryMode) -> Vec<TavernStep> {
        let mut steps = vec![start];
        let mut current = start;
        while let Some(next) = current.next(custom, mode) {
            steps.push(next);
            current = next;
        }
        steps
    }

    #[test]
    fn test_tale_path_skips_the_hero_steps() {
        let steps = walk(TavernStep::Welcome, false, StoryMode::Tale);
        assert_eq!(
            steps,
            vec![
                TavernStep::Welcome,
                TavernStep::Teller,
                TavernStep::Mode,
                TavernStep::Topic,
                TavernStep::Review,
            ]
        );
    }

    #[test]
    fn test_adventure_path_visits_every_hero_step() {
        let steps = walk(TavernStep::Welcome, false, StoryMode::Adventure);
        assert!(steps.contains(&TavernStep::HeroName));
        assert!(steps.contains(&TavernStep::Weakness));
        assert!(steps.contains(&TavernStep::Goal));
        assert_eq!(steps.last(), Some(&TavernStep::Review));
    }

    #[test]
    fn test_custom_teller_takes_the_side_road() {
        let steps = walk(TavernStep::Teller, true, StoryMode::Tale);
        assert_eq!(
            &steps[..5],
            &[
                TavernStep::Teller,
                TavernStep::TellerName,
                TavernStep::TellerGenre,
                TavernStep::TellerStyle,
                TavernStep::Mode,
            ]
        );
    }

    #[test]
    fn test_prev_retraces_the_adventure_path() {
        let forward = walk(TavernStep::Welcome, false, StoryMode::Adventure);
        let mut current = TavernStep::Review;
        let mut backward = vec![current];
        while let Some(prev) = current.prev(false, StoryMode::Adventure) {
            backward.push(prev);
            current = prev;
        }
        backward.reverse();
        assert_eq!(backward, forward);
    }

    #[test]
    fn test_blank_fields_fall_to_defaults() {
        let mut night = TavernNight::new(true);
        night.mode_index = 1;

        let plan = night.build_plan().unwrap();
        match plan {
            EveningPlan::Adventure { hero, world, .. } => {
                assert_eq!(hero.name, DEFAULT_HERO_NAME);
                assert_eq!(hero.weakness, DEFAULT_WEAKNESS);
                assert_eq!(world.setting, DEFAULT_SETTING);
            }
            EveningPlan::Tale { .. } => panic!("expected an adventure plan"),
        }
    }

    #[test]
    fn test_typed_fields_survive_the_plan() {
        let mut night = TavernNight::new(false);
        night.step = TavernStep::Topic;
        for c in "a lighthouse keeper".chars() {
            night.type_char(c);
        }

        let plan = night.build_plan().unwrap();
        match plan {
            EveningPlan::Tale { topic, persona } => {
                assert_eq!(topic, "a lighthouse keeper");
                assert_eq!(persona, Persona::OldKnight);
            }
            EveningPlan::Adventure { .. } => panic!("expected a tale plan"),
        }
    }

    #[test]
    fn test_custom_teller_builds_a_custom_persona() {
        let mut night = TavernNight::new(false);
        night.teller_index = Persona::presets().len();
        night.genre_index = 1;

        match night.persona() {
            Persona::Custom { name, genre, .. } => {
                assert_eq!(name, DEFAULT_TELLER_NAME);
                assert_eq!(genre, Genre::Horror);
            }
            other => panic!("expected a custom persona, got {other:?}"),
        }
    }

    #[test]
    fn test_name_input_respects_the_limit() {
        let mut night = TavernNight::new(false);
        night.step = TavernStep::HeroName;
        for c in "x".repeat(MAX_NAME_CHARS + 5).chars() {
            night.type_char(c);
        }
        assert_eq!(night.hero_name.chars().count(), MAX_NAME_CHARS);
    }
}
