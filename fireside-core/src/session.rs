//! StorySession - the fireside-tale flow, wired end to end.
//!
//! A session binds a storyteller persona, the turn controller, and a
//! narrator into the loop the front end drives: begin a tale on a topic,
//! read the streamed view, choose an option, repeat. Chosen options are
//! echoed into the story as the listener's own line before the next turn
//! begins.

use std::sync::Arc;

use tokio::sync::watch;

use crate::narrate::Narrator;
use crate::storyteller::{OllamaStoryteller, Persona, StoryMode, Storyteller};
use crate::turn::{TurnConfig, TurnController, TurnView};

/// Offered when a finished turn supplies no options of its own.
pub const DEFAULT_ENCORE: &str = "Tell me another one.";

/// One evening at the fire: a persona telling an open-ended tale.
pub struct StorySession {
    controller: TurnController,
    storyteller: Arc<dyn Storyteller>,
    persona: Persona,
}

impl StorySession {
    /// Wire a session around any storyteller. Must be called inside a
    /// tokio runtime.
    pub fn new(
        storyteller: Arc<dyn Storyteller>,
        narrator: Arc<dyn Narrator>,
        persona: Persona,
    ) -> Self {
        let controller = TurnController::new(
            Arc::clone(&storyteller),
            narrator,
            TurnConfig::default(),
        );
        Self {
            controller,
            storyteller,
            persona,
        }
    }

    /// Wire a session around a local Ollama model with the persona's
    /// tale instructions.
    pub fn with_ollama(
        client: ollama::Ollama,
        narrator: Arc<dyn Narrator>,
        persona: Persona,
    ) -> Self {
        let instructions = persona.instructions(StoryMode::Tale);
        let storyteller = Arc::new(OllamaStoryteller::new(client, instructions));
        Self::new(storyteller, narrator, persona)
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Subscribe to state snapshots for rendering.
    pub fn subscribe(&self) -> watch::Receiver<TurnView> {
        self.controller.subscribe()
    }

    /// The current state snapshot.
    pub fn view(&self) -> TurnView {
        self.controller.view()
    }

    /// Open the tale on the listener's topic. A blank topic leaves the
    /// subject to the storyteller.
    pub fn begin(&self, topic: &str) {
        self.controller.start_turn(opening_prompt(topic));
    }

    /// Take one of the offered options: echo it into the story as the
    /// listener's line, then continue the tale from it.
    pub fn choose(&self, option: &str) {
        self.controller.append_player_line(&player_echo(option));
        self.controller.start_turn(option);
    }

    /// Abandon the evening: stop generation and narration, clear the
    /// story, and forget the telling so far.
    pub fn reset(&self) {
        self.controller.reset();
        self.storyteller.reset_history();
    }
}

fn opening_prompt(topic: &str) -> String {
    let topic = topic.trim();
    if topic.is_empty() {
        "Tell me a story of your own choosing.".to_string()
    } else {
        format!("Tell me a story about {}.", topic)
    }
}

/// The listener's chosen line, rendered into the story text.
pub(crate) fn player_echo(option: &str) -> String {
    format!("\n\n👉 {}\n\n", option.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_prompt_wraps_topic() {
        assert_eq!(
            opening_prompt("a lighthouse keeper"),
            "Tell me a story about a lighthouse keeper."
        );
    }

    #[test]
    fn test_blank_topic_leaves_the_choice_open() {
        assert_eq!(opening_prompt("   "), "Tell me a story of your own choosing.");
        assert_eq!(opening_prompt(""), "Tell me a story of your own choosing.");
    }

    #[test]
    fn test_player_echo_is_set_off_from_the_prose() {
        assert_eq!(player_echo("Follow the light"), "\n\n👉 Follow the light\n\n");
        assert_eq!(player_echo("  trimmed  "), "\n\n👉 trimmed\n\n");
    }

    #[test]
    fn test_default_encore_is_a_single_sentence() {
        assert_eq!(DEFAULT_ENCORE, "Tell me another one.");
    }
}
