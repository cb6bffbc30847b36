//! Event handling for the Fireside TUI

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

use crate::app::{App, InputMode};

/// Result of handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// Continue running
    Continue,
    /// Quit the application
    Quit,
    /// Redraw needed
    NeedsRedraw,
    /// Ask the teller to judge the run
    Evaluate,
    /// Tear the evening down and return to the tavern
    NewEvening,
}

/// Handle a terminal event
pub fn handle_event(app: &mut App, event: Event) -> EventResult {
    match event {
        Event::Key(key) => handle_key_event(app, key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => {
                app.scroll_up(3);
                EventResult::NeedsRedraw
            }
            MouseEventKind::ScrollDown => {
                app.scroll_down(3);
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        },
        Event::Resize(_, _) => EventResult::NeedsRedraw,
        _ => EventResult::Continue,
    }
}

fn handle_key_event(app: &mut App, key: KeyEvent) -> EventResult {
    if key.kind != KeyEventKind::Press {
        return EventResult::Continue;
    }

    // Global: Ctrl+C always quits
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return EventResult::Quit;
    }

    // The judgement overlay swallows keys until it is dismissed
    if app.evaluation.is_some() {
        return match key.code {
            KeyCode::Char('r') => EventResult::NewEvening,
            KeyCode::Char('q') => EventResult::Quit,
            KeyCode::Esc | KeyCode::Enter => {
                app.evaluation = None;
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        };
    }

    // Help overlay
    if app.show_help {
        return match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
                app.show_help = false;
                EventResult::NeedsRedraw
            }
            _ => EventResult::Continue,
        };
    }

    // An open skirmish is modal: stand or run
    if app.encounter.is_some() {
        return match key.code {
            KeyCode::Char('a') => {
                app.clash();
                EventResult::NeedsRedraw
            }
            KeyCode::Char('f') => {
                app.flee();
                EventResult::NeedsRedraw
            }
            KeyCode::Char('q') => EventResult::Quit,
            _ => EventResult::Continue,
        };
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode_key(app, key),
        InputMode::Insert => handle_insert_mode_key(app, key),
    }
}

fn handle_normal_mode_key(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => EventResult::Quit,

        KeyCode::Char('i') => {
            app.input_mode = InputMode::Insert;
            EventResult::NeedsRedraw
        }

        KeyCode::Char('?') => {
            app.toggle_help();
            EventResult::NeedsRedraw
        }

        // Numbered choices at the fork
        KeyCode::Char(c @ '1'..='9') => {
            let index = (c as usize) - ('1' as usize);
            app.choose_option(index);
            EventResult::NeedsRedraw
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => {
            app.scroll_down(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.scroll_up(1);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::PageDown => {
            app.scroll_down(10);
            EventResult::NeedsRedraw
        }
        KeyCode::PageUp => {
            app.scroll_up(10);
            EventResult::NeedsRedraw
        }
        KeyCode::Char('G') => {
            app.scroll_to_bottom();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('g') => {
            app.scroll_to_top();
            EventResult::NeedsRedraw
        }

        // The evening
        KeyCode::Char('f') => {
            app.start_encounter();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('e') => {
            if !app.is_adventure() {
                app.set_status("Only a dungeon run can be judged.");
                EventResult::NeedsRedraw
            } else if app.view.is_generating {
                app.set_status("Wait for the teller to finish.");
                EventResult::NeedsRedraw
            } else {
                EventResult::Evaluate
            }
        }
        KeyCode::Char('r') => EventResult::NewEvening,

        _ => EventResult::Continue,
    }
}

fn handle_insert_mode_key(app: &mut App, key: KeyEvent) -> EventResult {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            EventResult::NeedsRedraw
        }

        KeyCode::Enter => {
            if let Some(line) = app.submit_input() {
                app.say(&line);
            }
            EventResult::NeedsRedraw
        }

        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }

        KeyCode::Char(c) => {
            app.type_char(c);
            EventResult::NeedsRedraw
        }
        KeyCode::Backspace => {
            app.backspace();
            EventResult::NeedsRedraw
        }
        KeyCode::Delete => {
            app.delete();
            EventResult::NeedsRedraw
        }

        KeyCode::Left => {
            app.cursor_left();
            EventResult::NeedsRedraw
        }
        KeyCode::Right => {
            app.cursor_right();
            EventResult::NeedsRedraw
        }
        KeyCode::Home => {
            app.cursor_home();
            EventResult::NeedsRedraw
        }
        KeyCode::End => {
            app.cursor_end();
            EventResult::NeedsRedraw
        }

        KeyCode::Up => {
            app.history_prev();
            EventResult::NeedsRedraw
        }
        KeyCode::Down => {
            app.history_next();
            EventResult::NeedsRedraw
        }

        _ => EventResult::Continue,
    }
}
