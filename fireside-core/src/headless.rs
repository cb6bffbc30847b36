//! Headless story interface for programmatic use.
//!
//! This module runs the fireside-tale flow without a terminal front
//! end. It's designed for:
//! - Automated testing with real model responses
//! - Scripted smoke runs
//! - Agents listening at the inn
//!
//! # Example
//!
//! ```ignore
//! use fireside_core::headless::{HeadlessConfig, HeadlessStory};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = HeadlessConfig::quick_start();
//!     let mut story = HeadlessStory::new(config);
//!
//!     let turn = story.begin("a lighthouse keeper").await;
//!     println!("{}", turn.story);
//!     for (i, option) in turn.options.iter().enumerate() {
//!         println!("{}. {}", i + 1, option);
//!     }
//!
//!     if let Some(turn) = story.choose(0).await {
//!         println!("{}", turn.story);
//!     }
//! }
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use crate::narrate::NullNarrator;
use crate::session::StorySession;
use crate::storyteller::{Persona, Storyteller};
use crate::turn::TurnView;

/// Configuration for a headless story session.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Who tells tonight's tale.
    pub persona: Persona,
    /// Ollama host override; the environment's default otherwise.
    pub host: Option<String>,
    /// Model override; the environment's default otherwise.
    pub model: Option<String>,
}

impl HeadlessConfig {
    /// The Old Knight against the environment's Ollama defaults.
    pub fn quick_start() -> Self {
        Self {
            persona: Persona::OldKnight,
            host: None,
            model: None,
        }
    }

    /// A configuration for a chosen persona.
    pub fn with_persona(persona: Persona) -> Self {
        Self {
            persona,
            host: None,
            model: None,
        }
    }

    /// Set the Ollama host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// What one completed turn left behind.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The full story text now on screen.
    pub story: String,
    /// The options offered for the next turn.
    pub options: Vec<String>,
    /// The failure that ended the turn, if any.
    pub error: Option<String>,
}

/// One exchange in the headless transcript.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// What the listener asked for.
    pub prompt: String,
    /// The text this turn added to the story.
    pub story: String,
    /// Exchange number, from 1.
    pub turn: usize,
}

/// A story session that can be driven programmatically.
///
/// Wraps [`StorySession`] with a call-and-wait interface: `begin` and
/// `choose` resolve once the turn has finished streaming. Narration is
/// off; headless runs are silent.
pub struct HeadlessStory {
    session: StorySession,
    views: watch::Receiver<TurnView>,
    transcript: Vec<Exchange>,
    /// Characters of the displayed story already attributed to an
    /// exchange.
    seen_chars: usize,
}

impl HeadlessStory {
    /// Create a headless story against a local Ollama model.
    pub fn new(config: HeadlessConfig) -> Self {
        let mut client = ollama::Ollama::from_env();
        if let Some(host) = config.host {
            client = client.with_host(host);
        }
        if let Some(model) = config.model {
            client = client.with_model(model);
        }

        let session = StorySession::with_ollama(client, Arc::new(NullNarrator), config.persona);
        Self::wrap(session)
    }

    /// Create a headless story around any storyteller.
    pub fn with_storyteller(storyteller: Arc<dyn Storyteller>, persona: Persona) -> Self {
        let session = StorySession::new(storyteller, Arc::new(NullNarrator), persona);
        Self::wrap(session)
    }

    fn wrap(session: StorySession) -> Self {
        let views = session.subscribe();
        Self {
            session,
            views,
            transcript: Vec::new(),
            seen_chars: 0,
        }
    }

    /// Open the tale on a topic and wait for the first turn to finish.
    /// A blank topic leaves the subject to the storyteller.
    pub async fn begin(&mut self, topic: &str) -> TurnReport {
        self.session.begin(topic);
        self.wait_turn(topic).await
    }

    /// Take the offered option at `index` and wait for the turn it
    /// starts. Returns `None` when no such option is on offer.
    pub async fn choose(&mut self, index: usize) -> Option<TurnReport> {
        let option = self.session.view().current_options.get(index)?.clone();
        Some(self.say(&option).await)
    }

    /// Continue the tale with a free-form line instead of an offered
    /// option.
    pub async fn say(&mut self, line: &str) -> TurnReport {
        self.session.choose(line);
        self.wait_turn(line).await
    }

    /// Abandon the evening and clear the transcript.
    pub fn reset(&mut self) {
        self.session.reset();
        self.transcript.clear();
        self.seen_chars = 0;
    }

    async fn wait_turn(&mut self, prompt: &str) -> TurnReport {
        loop {
            {
                let view = self.views.borrow_and_update();
                if !view.is_generating {
                    break;
                }
            }
            if self.views.changed().await.is_err() {
                break;
            }
        }

        let view = self.views.borrow().clone();
        let added: String = view.displayed_story.chars().skip(self.seen_chars).collect();
        self.seen_chars = view.displayed_story.chars().count();

        self.transcript.push(Exchange {
            prompt: prompt.to_string(),
            story: added,
            turn: self.transcript.len() + 1,
        });

        TurnReport {
            story: view.displayed_story,
            options: view.current_options,
            error: view.error_message,
        }
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    /// The full story text so far.
    pub fn story(&self) -> String {
        self.session.view().displayed_story
    }

    /// The options currently on offer.
    pub fn options(&self) -> Vec<String> {
        self.session.view().current_options
    }

    /// The persona telling the tale.
    pub fn persona(&self) -> &Persona {
        self.session.persona()
    }

    /// The transcript of all exchanges.
    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    /// The text the most recent exchange added, if any.
    pub fn last_story(&self) -> Option<&str> {
        self.transcript.last().map(|e| e.story.as_str())
    }

    /// How many exchanges have completed.
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// The underlying session for advanced use.
    pub fn session(&self) -> &StorySession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStoryteller;

    #[test]
    fn test_quick_start_config() {
        let config = HeadlessConfig::quick_start();
        assert_eq!(config.persona, Persona::OldKnight);
        assert!(config.host.is_none());
        assert!(config.model.is_none());
    }

    #[test]
    fn test_config_builders() {
        let config = HeadlessConfig::with_persona(Persona::Drifter)
            .with_host("http://localhost:11434")
            .with_model("llama3.2");

        assert_eq!(config.persona, Persona::Drifter);
        assert_eq!(config.host.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.model.as_deref(), Some("llama3.2"));
    }

    #[tokio::test]
    async fn test_scripted_story_flows_through_reports() {
        let teller = Arc::new(ScriptedStoryteller::new());
        teller.push_turn("The fox waited.", &["Follow the fox"]);
        teller.push_turn("It ran.", &[]);

        let mut story = HeadlessStory::with_storyteller(teller.clone(), Persona::Stranger);

        let report = story.begin("a fox").await;
        assert_eq!(report.story, "The fox waited.");
        assert_eq!(report.options, vec!["Follow the fox"]);
        assert!(report.error.is_none());

        let report = story.choose(0).await.unwrap();
        assert!(report.story.contains("👉 Follow the fox"));
        assert!(report.story.ends_with("It ran."));
        // No options scripted, so the default encore is offered.
        assert_eq!(report.options, vec![crate::session::DEFAULT_ENCORE]);

        assert_eq!(story.turn_count(), 2);
        assert_eq!(story.transcript()[0].prompt, "a fox");
        assert_eq!(story.transcript()[1].prompt, "Follow the fox");
        assert_eq!(
            teller.prompts(),
            vec!["Tell me a story about a fox.", "Follow the fox"]
        );
    }

    #[tokio::test]
    async fn test_choose_out_of_range_is_none() {
        let teller = Arc::new(ScriptedStoryteller::new());
        teller.push_turn("A tale.", &["Only option"]);

        let mut story = HeadlessStory::with_storyteller(teller, Persona::OldKnight);
        story.begin("").await;

        assert!(story.choose(5).await.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let teller = Arc::new(ScriptedStoryteller::new());
        teller.push_turn("A tale.", &[]);

        let mut story = HeadlessStory::with_storyteller(teller.clone(), Persona::OldKnight);
        story.begin("anything").await;
        assert_eq!(story.turn_count(), 1);

        story.reset();
        assert_eq!(story.turn_count(), 0);
        assert!(story.story().is_empty());
        assert_eq!(teller.reset_count(), 1);
    }
}
