//! Application state for the Fireside TUI

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use fireside_core::adventure::{AdventureSession, EvaluationReport};
use fireside_core::assets::AssetClient;
use fireside_core::{Narrator, Persona, StorySession, TurnView};

use crate::encounter::{Clash, Encounter, Retreat};
use crate::tavern::EveningPlan;
use crate::ui::theme::StoryTheme;

/// Input mode (vim-style)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Insert,
}

/// How the main loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppExit {
    Quit,
    NewEvening,
}

/// The session behind tonight's telling.
pub enum Evening {
    Tale(StorySession),
    Adventure(AdventureSession),
}

impl Evening {
    fn subscribe(&self) -> watch::Receiver<TurnView> {
        match self {
            Evening::Tale(session) => session.subscribe(),
            Evening::Adventure(session) => session.subscribe(),
        }
    }
}

/// Main application state
pub struct App {
    pub evening: Evening,
    persona: Persona,
    views: watch::Receiver<TurnView>,
    /// Snapshot rendered this frame, refreshed from the watch channel.
    pub view: TurnView,
    pub theme: StoryTheme,

    // Input state
    pub input_mode: InputMode,
    /// Line under composition, edited by character index.
    draft: String,
    cursor: usize,
    /// Everything the listener has said, newest first.
    spoken_lines: VecDeque<String>,
    recall: Option<usize>,
    shelved_draft: Option<String>,

    // Scroll state
    pub story_scroll: usize,
    pub follow_stream: bool,

    // UI state
    status_message: Option<String>,
    pub spinner_frame: u8,
    pub encounter: Option<Encounter>,
    pub evaluation: Option<EvaluationReport>,
    pub show_help: bool,

    /// Title-bar decoration once a theme track has been found.
    pub theme_track: Option<String>,
    track_rx: Option<oneshot::Receiver<String>>,
}

impl App {
    /// Seat the listener: build the session the tavern plan calls for
    /// and open its first turn.
    pub fn new(plan: EveningPlan, client: ollama::Ollama, narrator: Arc<dyn Narrator>) -> Self {
        let (evening, persona) = match plan {
            EveningPlan::Tale { persona, topic } => {
                let session = StorySession::with_ollama(client, narrator, persona.clone());
                session.begin(&topic);
                (Evening::Tale(session), persona)
            }
            EveningPlan::Adventure {
                persona,
                hero,
                world,
            } => {
                let session =
                    AdventureSession::new(client, narrator, persona.clone(), hero, world);
                session.begin();
                (Evening::Adventure(session), persona)
            }
        };
        Self::from_parts(evening, persona)
    }

    /// Wrap an already-built session. Used directly by tests.
    pub fn from_parts(evening: Evening, persona: Persona) -> Self {
        let views = evening.subscribe();
        let view = views.borrow().clone();
        let theme = StoryTheme::for_persona(&persona);

        Self {
            evening,
            persona,
            views,
            view,
            theme,
            input_mode: InputMode::Normal,
            draft: String::new(),
            cursor: 0,
            spoken_lines: VecDeque::new(),
            recall: None,
            shelved_draft: None,
            story_scroll: 0,
            follow_stream: true,
            status_message: Some("Press 'i' to speak, '?' for help".to_string()),
            spinner_frame: 0,
            encounter: None,
            evaluation: None,
            show_help: false,
            theme_track: None,
            track_rx: None,
        }
    }

    /// Pull the latest snapshot from the controller, keeping the view
    /// pinned to the bottom while new text streams in.
    pub fn refresh_view(&mut self) {
        let latest = self.views.borrow_and_update().clone();
        if latest != self.view {
            self.view = latest;
            if self.follow_stream {
                self.scroll_to_bottom();
            }
        }

        if let Some(rx) = &mut self.track_rx {
            match rx.try_recv() {
                Ok(label) => {
                    self.theme_track = Some(label);
                    self.track_rx = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => self.track_rx = None,
            }
        }
    }

    /// Look for a theme track matching the teller's genre, off the
    /// render path. Decoration only; a miss leaves the bar empty.
    pub fn fetch_theme_track(&mut self) {
        let (tx, rx) = oneshot::channel();
        let term = self.persona.genre_label().to_string();
        tokio::spawn(async move {
            let assets = AssetClient::new();
            if let Ok(track) = assets.fetch_theme_track(&term).await {
                let _ = tx.send(format!("♪ {} - {}", track.title, track.artist));
            }
        });
        self.track_rx = Some(rx);
    }

    // ========================================================================
    // The Evening
    // ========================================================================

    pub fn teller_name(&self) -> &str {
        self.persona.name()
    }

    pub fn genre_label(&self) -> &str {
        self.persona.genre_label()
    }

    pub fn is_adventure(&self) -> bool {
        matches!(self.evening, Evening::Adventure(_))
    }

    /// The hero's hit points, if tonight is an adventure.
    pub fn hit_points(&self) -> Option<u32> {
        match &self.evening {
            Evening::Tale(_) => None,
            Evening::Adventure(session) => Some(session.hit_points()),
        }
    }

    pub fn is_defeated(&self) -> bool {
        match &self.evening {
            Evening::Tale(_) => false,
            Evening::Adventure(session) => session.is_defeated(),
        }
    }

    /// Send a free-spoken line to the teller as the next turn.
    pub fn say(&mut self, line: &str) {
        if self.view.is_generating {
            self.set_status("The teller is still speaking.");
            return;
        }
        match &self.evening {
            Evening::Tale(session) => session.choose(line),
            Evening::Adventure(session) => {
                if session.is_defeated() {
                    self.set_status("Your hero is down. Press 'e' for the judgement.");
                    return;
                }
                session.choose(line);
            }
        }
        self.scroll_to_bottom();
    }

    /// Take the numbered choice at the fork, if it exists.
    pub fn choose_option(&mut self, index: usize) {
        let Some(option) = self.view.current_options.get(index).cloned() else {
            self.set_status(format!("No choice numbered {}.", index + 1));
            return;
        };
        self.say(&option);
    }

    /// Abandon the evening and clear everything tied to it.
    pub fn reset_evening(&mut self) {
        match &mut self.evening {
            Evening::Tale(session) => session.reset(),
            Evening::Adventure(session) => session.reset(),
        }
        self.encounter = None;
        self.evaluation = None;
    }

    // ========================================================================
    // Skirmishes
    // ========================================================================

    /// Roll a foe and square off. Adventures only, between turns.
    pub fn start_encounter(&mut self) {
        if !self.is_adventure() {
            self.set_status("No foes trouble a fireside tale.");
            return;
        }
        if self.encounter.is_some() {
            return;
        }
        if self.view.is_generating {
            self.set_status("Wait for the teller to finish.");
            return;
        }
        if self.is_defeated() {
            self.set_status("Your hero is down. Press 'e' for the judgement.");
            return;
        }
        let encounter = Encounter::roll();
        self.set_status(format!("{} bars the way!", encounter.enemy.name));
        self.encounter = Some(encounter);
    }

    /// One exchange of blows in the open skirmish.
    pub fn clash(&mut self) {
        let Some(encounter) = self.encounter.as_mut() else {
            return;
        };
        let outcome = encounter.clash();
        let name = encounter.enemy.name.clone();

        match outcome {
            Clash::Felled { dealt, healed } => {
                self.encounter = None;
                if let Evening::Adventure(session) = &mut self.evening {
                    let hp = session.apply_healing(healed);
                    self.set_status(format!(
                        "{name} falls to a {dealt}! You bind your wounds (HP {hp})."
                    ));
                }
            }
            Clash::Struck { dealt, taken } => {
                if let Evening::Adventure(session) = &mut self.evening {
                    let hp = session.apply_damage(taken);
                    if session.is_defeated() {
                        self.encounter = None;
                        self.set_status("You are struck down. Press 'e' for the judgement.");
                    } else {
                        self.set_status(format!(
                            "You deal {dealt}; {name} answers for {taken} (HP {hp})."
                        ));
                    }
                }
            }
        }
    }

    /// Break off the open skirmish.
    pub fn flee(&mut self) {
        let Some(encounter) = self.encounter.take() else {
            return;
        };
        let name = encounter.enemy.name.clone();

        match encounter.flee() {
            Retreat::Clean => self.set_status(format!("You slip away from {name}.")),
            Retreat::Bloodied { taken } => {
                if let Evening::Adventure(session) = &mut self.evening {
                    let hp = session.apply_damage(taken);
                    if session.is_defeated() {
                        self.set_status(
                            "The parting blow fells you. Press 'e' for the judgement.",
                        );
                    } else {
                        self.set_status(format!(
                            "{name} lands a parting blow for {taken} (HP {hp})."
                        ));
                    }
                }
            }
        }
    }

    /// Ask the model to judge the run. Adventures only.
    pub async fn run_evaluation(&mut self) {
        let Evening::Adventure(session) = &self.evening else {
            self.set_status("Only a dungeon run can be judged.");
            return;
        };
        match session.evaluate().await {
            Ok(report) => {
                self.status_message = None;
                self.evaluation = Some(report);
            }
            Err(e) => self.set_status(format!("No judgement came: {e}")),
        }
    }

    // ========================================================================
    // Scrolling
    // ========================================================================

    /// Scroll the telling to the bottom and follow new text as it lands.
    pub fn scroll_to_bottom(&mut self) {
        // The widget clamps this to the real end at draw time.
        self.story_scroll = usize::MAX / 2;
        self.follow_stream = true;
    }

    pub fn scroll_to_top(&mut self) {
        self.story_scroll = 0;
        self.follow_stream = false;
    }

    /// Worst-case guess at how far the telling can scroll. The widget
    /// knows the real wrap width only at draw time; this just keeps
    /// j/k from running far past the end.
    fn scroll_ceiling(&self) -> usize {
        const ASSUMED_COLUMNS: usize = 60;
        const ASSUMED_ROWS: usize = 20;

        let wrapped_rows: usize = self
            .view
            .displayed_story
            .lines()
            .map(|line| (line.chars().count() / ASSUMED_COLUMNS).max(1))
            .sum();
        wrapped_rows.saturating_sub(ASSUMED_ROWS)
    }

    /// Scroll up, letting go of the stream.
    pub fn scroll_up(&mut self, lines: usize) {
        let ceiling = self.scroll_ceiling();
        self.story_scroll = self.story_scroll.min(ceiling).saturating_sub(lines);
        self.follow_stream = false;
    }

    /// Scroll down. Catching the stream again takes 'G'.
    pub fn scroll_down(&mut self, lines: usize) {
        let ceiling = self.scroll_ceiling();
        self.story_scroll = self.story_scroll.saturating_add(lines).min(ceiling + 100);
    }

    // ========================================================================
    // Input Editing
    // ========================================================================

    pub fn input_buffer(&self) -> &str {
        &self.draft
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor
    }

    /// Byte offset of the character slot the cursor points at.
    fn cursor_byte(&self) -> usize {
        self.draft
            .char_indices()
            .nth(self.cursor)
            .map(|(at, _)| at)
            .unwrap_or(self.draft.len())
    }

    fn draft_chars(&self) -> usize {
        self.draft.chars().count()
    }

    /// Remove the character under the cursor, if any.
    fn erase_at_cursor(&mut self) {
        if let Some((at, ch)) = self.draft.char_indices().nth(self.cursor) {
            self.draft.replace_range(at..at + ch.len_utf8(), "");
        }
    }

    /// Swap in a whole line, cursor at its end.
    fn load_draft(&mut self, line: String) {
        self.cursor = line.chars().count();
        self.draft = line;
    }

    /// Take the current line, recording it in the spoken history.
    pub fn submit_input(&mut self) -> Option<String> {
        if self.draft.is_empty() {
            return None;
        }

        let line = std::mem::take(&mut self.draft);
        self.cursor = 0;
        self.recall = None;
        self.shelved_draft = None;

        self.spoken_lines.push_front(line.clone());
        self.spoken_lines.truncate(100);

        Some(line)
    }

    /// Insert a typed character at the cursor. The cursor counts
    /// characters, not bytes, so this stays safe for wide input.
    pub fn type_char(&mut self, c: char) {
        let at = self.cursor_byte();
        self.draft.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.erase_at_cursor();
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft_chars() {
            self.erase_at_cursor();
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft_chars());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.draft_chars();
    }

    /// Recall an older spoken line. The first step shelves whatever
    /// was being typed so history_next can bring it back.
    pub fn history_prev(&mut self) {
        let target = match self.recall {
            None => 0,
            Some(at) => (at + 1).min(self.spoken_lines.len().saturating_sub(1)),
        };
        let Some(line) = self.spoken_lines.get(target).cloned() else {
            return;
        };

        if self.recall.is_none() && !self.draft.is_empty() {
            self.shelved_draft = Some(std::mem::take(&mut self.draft));
        }
        self.recall = Some(target);
        self.load_draft(line);
    }

    /// Step back toward the newest spoken line, then the shelved draft.
    pub fn history_next(&mut self) {
        match self.recall {
            None => {}
            Some(0) => {
                self.recall = None;
                let shelved = self.shelved_draft.take().unwrap_or_default();
                self.load_draft(shelved);
            }
            Some(at) => {
                if let Some(line) = self.spoken_lines.get(at - 1).cloned() {
                    self.recall = Some(at - 1);
                    self.load_draft(line);
                }
            }
        }
    }

    // ========================================================================
    // UI State
    // ========================================================================

    /// Set status message (always overwrites)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Tick for animations
    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fireside_core::adventure::{Hero, WorldSetup, STARTING_HP};
    use fireside_core::testing::ScriptedStoryteller;
    use fireside_core::NullNarrator;

    fn tale_app() -> App {
        let session = StorySession::new(
            Arc::new(ScriptedStoryteller::new()),
            Arc::new(NullNarrator),
            Persona::OldKnight,
        );
        App::from_parts(Evening::Tale(session), Persona::OldKnight)
    }

    fn adventure_app() -> App {
        let hero = Hero::new(
            "Wren",
            "a wiry scout",
            "last of the Vale watch",
            "cannot refuse a wager",
            "reads old stone",
        )
        .unwrap();
        let session = AdventureSession::with_storyteller(
            Arc::new(ScriptedStoryteller::new()),
            ollama::Ollama::new(),
            Arc::new(NullNarrator),
            hero,
            WorldSetup::new("the drowned catacombs", "recover the tide bell"),
        );
        App::from_parts(Evening::Adventure(session), Persona::OldKnight)
    }

    #[tokio::test]
    async fn test_typing_edits_unicode_safely() {
        let mut app = tale_app();

        for c in "日本語".chars() {
            app.type_char(c);
        }
        app.cursor_left();
        app.backspace();
        assert_eq!(app.input_buffer(), "日語");
        assert_eq!(app.cursor_position(), 1);

        app.delete();
        assert_eq!(app.input_buffer(), "日");
    }

    #[tokio::test]
    async fn test_submit_records_history() {
        let mut app = tale_app();

        for c in "go north".chars() {
            app.type_char(c);
        }
        assert_eq!(app.submit_input().as_deref(), Some("go north"));
        assert_eq!(app.input_buffer(), "");

        app.history_prev();
        assert_eq!(app.input_buffer(), "go north");
        app.history_next();
        assert_eq!(app.input_buffer(), "");
    }

    #[tokio::test]
    async fn test_scroll_up_stops_following_the_stream() {
        let mut app = tale_app();
        assert!(app.follow_stream);

        app.scroll_up(1);
        assert!(!app.follow_stream);

        app.scroll_to_bottom();
        assert!(app.follow_stream);
    }

    #[tokio::test]
    async fn test_choosing_out_of_range_sets_status() {
        let mut app = tale_app();
        app.choose_option(4);
        assert_eq!(app.status_message(), Some("No choice numbered 5."));
    }

    #[tokio::test]
    async fn test_tale_evenings_have_no_skirmishes() {
        let mut app = tale_app();
        app.start_encounter();
        assert!(app.encounter.is_none());
        assert_eq!(app.status_message(), Some("No foes trouble a fireside tale."));
        assert_eq!(app.hit_points(), None);
    }

    #[tokio::test]
    async fn test_skirmish_drives_the_hp_track() {
        let mut app = adventure_app();
        app.start_encounter();
        assert!(app.encounter.is_some());

        // Clash until the skirmish resolves one way or the other.
        for _ in 0..200 {
            app.clash();
            if app.encounter.is_none() {
                break;
            }
        }
        assert!(app.encounter.is_none());
        assert!(app.hit_points().unwrap_or(0) <= STARTING_HP);
        assert!(app.status_message().is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_the_skirmish() {
        let mut app = adventure_app();
        app.start_encounter();
        app.reset_evening();
        assert!(app.encounter.is_none());
        assert!(app.evaluation.is_none());
        assert_eq!(app.hit_points(), Some(STARTING_HP));
    }
}
