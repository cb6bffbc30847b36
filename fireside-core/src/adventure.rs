//! Adventure mode: heroes, worlds, hit points, and the final reckoning.
//!
//! The dungeon-crawl variant runs on the same turn controller as the
//! fireside tale. What it adds is a hero sheet and world setup folded
//! into the instructions, a hit-point track the front end drives from
//! encounter arithmetic, and a closing model-judged evaluation of the
//! playthrough.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;

use crate::narrate::Narrator;
use crate::session::player_echo;
use crate::storyteller::{OllamaStoryteller, Persona, StoryMode, Storyteller};
use crate::turn::{TurnConfig, TurnController, TurnView};

/// Hero names stay short enough for the status bar.
pub const MAX_NAME_CHARS: usize = 15;
/// Free-text hero traits are capped to one dense line each.
pub const MAX_TRAIT_CHARS: usize = 150;
/// Every hero starts whole.
pub const STARTING_HP: u32 = 100;

const APPEARANCE_ATTEMPTS: usize = 5;

/// Errors from adventure setup and evaluation.
#[derive(Debug, Error)]
pub enum AdventureError {
    #[error("Chat API error: {0}")]
    Chat(#[from] ollama::Error),

    #[error("{field} is over {limit} characters")]
    FieldTooLong { field: &'static str, limit: usize },

    #[error("Evaluation invalid: {0}")]
    Report(#[from] serde_json::Error),
}

/// The player's hero, as fed to the storyteller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hero {
    pub name: String,
    pub appearance: String,
    pub backstory: String,
    pub weakness: String,
    pub skill: String,
}

impl Hero {
    /// Build a hero, enforcing the field length limits.
    pub fn new(
        name: impl Into<String>,
        appearance: impl Into<String>,
        backstory: impl Into<String>,
        weakness: impl Into<String>,
        skill: impl Into<String>,
    ) -> Result<Self, AdventureError> {
        Ok(Self {
            name: limited("name", name.into(), MAX_NAME_CHARS)?,
            appearance: limited("appearance", appearance.into(), MAX_TRAIT_CHARS)?,
            backstory: limited("backstory", backstory.into(), MAX_TRAIT_CHARS)?,
            weakness: limited("weakness", weakness.into(), MAX_TRAIT_CHARS)?,
            skill: limited("skill", skill.into(), MAX_TRAIT_CHARS)?,
        })
    }

    /// One line for status bars and evaluation prompts.
    pub fn summary(&self) -> String {
        format!(
            "{}, {} (weakness: {}, skill: {})",
            self.name, self.appearance, self.weakness, self.skill
        )
    }

    /// The sheet block appended to the adventure instructions.
    pub fn sheet(&self) -> String {
        let mut sheet = String::new();
        sheet.push_str(&format!("Name: {}\n", self.name));
        sheet.push_str(&format!("Appearance: {}\n", self.appearance));
        sheet.push_str(&format!("Backstory: {}\n", self.backstory));
        sheet.push_str(&format!("Weakness: {}\n", self.weakness));
        sheet.push_str(&format!("Signature skill: {}\n", self.skill));
        sheet
    }
}

fn limited(
    field: &'static str,
    value: String,
    limit: usize,
) -> Result<String, AdventureError> {
    let value = value.trim().to_string();
    if value.chars().count() > limit {
        return Err(AdventureError::FieldTooLong { field, limit });
    }
    Ok(value)
}

/// Ask the model for a portrait-ready appearance line.
///
/// Over-length answers are retried a few times, then the last answer is
/// cut to the limit rather than failing hero creation.
pub async fn generate_appearance(
    client: &ollama::Ollama,
    description: &str,
) -> Result<String, AdventureError> {
    let instructions = format!(
        "In one line of at most {} characters, describe this hero's appearance \
         for an illustrated portrait. Plain text only, no quotes.",
        MAX_TRAIT_CHARS
    );

    let mut last = String::new();
    for _ in 0..APPEARANCE_ATTEMPTS {
        let request = ollama::ChatRequest::new(vec![
            ollama::Message::system(&instructions),
            ollama::Message::user(description),
        ]);
        let response = client.chat(request).await?;
        last = response.text().trim().to_string();
        if !last.is_empty() && last.chars().count() <= MAX_TRAIT_CHARS {
            return Ok(last);
        }
    }
    Ok(truncate_chars(&last, MAX_TRAIT_CHARS))
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Where the adventure happens and what it is for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSetup {
    pub setting: String,
    pub goal: String,
}

impl WorldSetup {
    pub fn new(setting: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
            goal: goal.into(),
        }
    }

    /// The block appended to the adventure instructions.
    pub fn briefing(&self) -> String {
        format!("Setting: {}\nStory goal: {}\n", self.setting, self.goal)
    }
}

const ENEMY_NAMES: &[&str] = &[
    "Gloom Wraith",
    "Barrow Troll",
    "Rust Knight",
    "Pale Stalker",
    "Cinder Drake",
    "Hollow King's Guard",
];

/// A foe rolled for one encounter.
#[derive(Debug, Clone)]
pub struct Enemy {
    pub name: String,
    pub hp: u32,
    pub attack: u32,
}

impl Enemy {
    pub fn roll() -> Self {
        let mut rng = rand::thread_rng();
        let name = ENEMY_NAMES[rng.gen_range(0..ENEMY_NAMES.len())].to_string();
        Self {
            name,
            hp: rng.gen_range(20..=100),
            attack: rng.gen_range(5..=15),
        }
    }
}

/// The model's judgement of a finished playthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rating: u8,
    pub verdict: String,
    pub highlight: String,
}

impl EvaluationReport {
    fn normalized(mut self) -> Self {
        self.rating = self.rating.clamp(1, 10);
        self
    }
}

/// JSON schema for [`EvaluationReport`], sent as the request `format`.
pub fn evaluation_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "rating": {
                "type": "integer",
                "minimum": 1,
                "maximum": 10,
                "description": "How the playthrough rates overall, 1 to 10."
            },
            "verdict": {
                "type": "string",
                "description": "One or two sentences judging the whole run."
            },
            "highlight": {
                "type": "string",
                "description": "The single best moment of the run."
            }
        },
        "required": ["rating", "verdict", "highlight"]
    })
}

/// One dungeon run: a hero, a world, a hit-point track, and the tale.
pub struct AdventureSession {
    controller: TurnController,
    storyteller: Arc<dyn Storyteller>,
    client: ollama::Ollama,
    hero: Hero,
    world: WorldSetup,
    hp: u32,
}

impl AdventureSession {
    /// Wire an adventure against a local Ollama model. The hero sheet
    /// and world briefing are folded into the persona's instructions.
    /// Must be called inside a tokio runtime.
    pub fn new(
        client: ollama::Ollama,
        narrator: Arc<dyn Narrator>,
        persona: Persona,
        hero: Hero,
        world: WorldSetup,
    ) -> Self {
        let mut instructions = persona.instructions(StoryMode::Adventure);
        instructions.push_str("\n## The Hero\n");
        instructions.push_str(&hero.sheet());
        instructions.push_str("\n## The World\n");
        instructions.push_str(&world.briefing());

        let storyteller: Arc<dyn Storyteller> =
            Arc::new(OllamaStoryteller::new(client.clone(), instructions));
        Self::with_storyteller(storyteller, client, narrator, hero, world)
    }

    /// Wire an adventure around any storyteller.
    pub fn with_storyteller(
        storyteller: Arc<dyn Storyteller>,
        client: ollama::Ollama,
        narrator: Arc<dyn Narrator>,
        hero: Hero,
        world: WorldSetup,
    ) -> Self {
        let controller = TurnController::new(
            Arc::clone(&storyteller),
            narrator,
            TurnConfig {
                default_options: vec!["Press on.".to_string()],
            },
        );
        Self {
            controller,
            storyteller,
            client,
            hero,
            world,
            hp: STARTING_HP,
        }
    }

    pub fn hero(&self) -> &Hero {
        &self.hero
    }

    pub fn world(&self) -> &WorldSetup {
        &self.world
    }

    pub fn subscribe(&self) -> watch::Receiver<TurnView> {
        self.controller.subscribe()
    }

    pub fn view(&self) -> TurnView {
        self.controller.view()
    }

    /// Open the run at its first scene.
    pub fn begin(&self) {
        self.controller
            .start_turn("Begin the adventure at its first scene.");
    }

    /// Take one of the offered options. Ignored once the hero is down.
    pub fn choose(&self, option: &str) {
        if self.is_defeated() {
            return;
        }
        self.controller.append_player_line(&player_echo(option));
        self.controller.start_turn(option);
    }

    pub fn hit_points(&self) -> u32 {
        self.hp
    }

    /// Subtract damage, stopping at zero. Returns the new total.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        self.hp
    }

    /// Restore hit points, capped at the starting total.
    pub fn apply_healing(&mut self, amount: u32) -> u32 {
        self.hp = (self.hp + amount).min(STARTING_HP);
        self.hp
    }

    pub fn is_defeated(&self) -> bool {
        self.hp == 0
    }

    /// Ask the model to judge the finished run.
    pub async fn evaluate(&self) -> Result<EvaluationReport, AdventureError> {
        let story = self.controller.view().displayed_story;

        let mut prompt = String::new();
        prompt.push_str("The adventure is over. Judge the playthrough below.\n");
        prompt.push_str(&format!("Hero: {}\n", self.hero.summary()));
        prompt.push_str(&format!("Story goal: {}\n", self.world.goal));
        prompt.push_str(&format!("Final hit points: {}\n\n", self.hp));
        prompt.push_str(&story);

        let request = ollama::ChatRequest::new(vec![
            ollama::Message::system(
                "You rate finished dungeon adventures. Reply with a JSON document: \
                 rating is 1 to 10, verdict is one or two sentences on the whole \
                 run, highlight names its single best moment.",
            ),
            ollama::Message::user(prompt),
        ])
        .with_format(evaluation_schema());

        let response = self.client.chat(request).await?;
        let report: EvaluationReport = serde_json::from_str(response.text().trim())?;
        Ok(report.normalized())
    }

    /// Abandon the run: stop generation, clear the story and context,
    /// restore the hero to full.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.storyteller.reset_history();
        self.hp = STARTING_HP;
    }
}
