//! Storyteller personas and the Ollama-backed generation loop.
//!
//! A [`Storyteller`] turns one prompt into a stream of [`TurnPartial`]s.
//! The Ollama implementation drives a multi-round conversation under the
//! hood: rounds that end in tool calls are executed and answered, and
//! the first round that finishes without tool calls carries the turn's
//! structured document. Only completed turns enter the rolling
//! transcript, so an abandoned turn leaves no trace in later context.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::structured::{story_turn_schema, TurnExtractor};
use crate::tools::{self, StoryTools};
use crate::turn::{OptionRelay, TurnPartial};

/// Rounds of tool calls allowed within a single turn.
const MAX_TOOL_ROUNDS: usize = 6;

const BASE_PROMPT: &str = include_str!("prompts/base.txt");
const TALE_PROMPT: &str = include_str!("prompts/tale.txt");
const ADVENTURE_PROMPT: &str = include_str!("prompts/adventure.txt");

/// Errors from a storyteller implementation.
#[derive(Debug, Error)]
pub enum StorytellerError {
    #[error("Chat API error: {0}")]
    Chat(#[from] ollama::Error),

    #[error("Turn document invalid: {0}")]
    Document(#[from] serde_json::Error),

    #[error("The storyteller fell silent without telling a story")]
    EmptyTurn,

    #[error("Turn exceeded {0} rounds of tool calls")]
    ToolRounds(usize),
}

/// The partial results of one turn, in emission order.
pub type TurnStream = Pin<Box<dyn Stream<Item = Result<TurnPartial, StorytellerError>> + Send>>;

/// A source of streamed story turns.
pub trait Storyteller: Send + Sync {
    /// Begin one turn for `prompt`. The `relay` is handed to any tool
    /// executor so mid-turn option deliveries reach the controller
    /// tagged with the issuing turn's epoch.
    fn stream_turn(&self, prompt: &str, relay: OptionRelay) -> TurnStream;

    /// Forget any rolling context carried over from completed turns.
    /// Implementations without context keep the default no-op.
    fn reset_history(&self) {}
}

/// The shape of a session: an open-ended tale or a dungeon adventure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryMode {
    Tale,
    Adventure,
}

/// A genre for custom-built storytellers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genre {
    Fantasy,
    Horror,
    ScienceFiction,
    UrbanLegend,
    HealingTale,
}

impl Genre {
    pub fn all() -> [Genre; 5] {
        [
            Genre::Fantasy,
            Genre::Horror,
            Genre::ScienceFiction,
            Genre::UrbanLegend,
            Genre::HealingTale,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Genre::Fantasy => "fantasy",
            Genre::Horror => "horror",
            Genre::ScienceFiction => "science fiction",
            Genre::UrbanLegend => "urban legend",
            Genre::HealingTale => "a healing tale",
        }
    }
}

/// Who is telling tonight's story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persona {
    OldKnight,
    Stranger,
    Drifter,
    Custom {
        name: String,
        genre: Genre,
        style: String,
    },
}

impl Persona {
    /// The three built-in storytellers of the inn.
    pub fn presets() -> [Persona; 3] {
        [Persona::OldKnight, Persona::Stranger, Persona::Drifter]
    }

    pub fn custom(name: impl Into<String>, genre: Genre, style: impl Into<String>) -> Self {
        Persona::Custom {
            name: name.into(),
            genre,
            style: style.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Persona::OldKnight => "The Old Knight",
            Persona::Stranger => "The Stranger",
            Persona::Drifter => "The Drifter",
            Persona::Custom { name, .. } => name,
        }
    }

    /// One-line description for persona pickers.
    pub fn tagline(&self) -> &str {
        match self {
            Persona::OldKnight => "keeper of the hearth, teller of oaths and embers",
            Persona::Stranger => "quiet tales from beyond the firelight",
            Persona::Drifter => "rain-soaked stories from the road",
            Persona::Custom { style, .. } => style,
        }
    }

    pub fn genre_label(&self) -> &str {
        match self {
            Persona::OldKnight => "medieval fantasy",
            Persona::Stranger => "cosmic horror",
            Persona::Drifter => "neon-noir mystery",
            Persona::Custom { genre, .. } => genre.label(),
        }
    }

    fn voice(&self) -> &str {
        match self {
            Persona::OldKnight => {
                "an old knight who hung up his sword long ago and keeps the inn's fire \
                 now. Your telling is warm and unhurried, full of oaths kept and \
                 ember-light, and you address the listener as 'friend'."
            }
            Persona::Stranger => {
                "a stranger at the edge of the fire whose face the light never quite \
                 reaches. Your telling is quiet and precise, the ordinary keeps going \
                 slightly wrong in it, and you never raise your voice."
            }
            Persona::Drifter => {
                "a drifter who blew in with the rain and pays for a bunk in stories. \
                 Your telling is wry and street-level, neon on wet asphalt, and you \
                 call the listener 'kid'."
            }
            Persona::Custom { style, .. } => style,
        }
    }

    /// Assemble the system instructions for this persona and mode.
    pub fn instructions(&self, mode: StoryMode) -> String {
        let mut prompt = String::new();
        prompt.push_str(BASE_PROMPT);

        prompt.push_str("\n## Your Voice\n");
        prompt.push_str(&format!("You are {}, {}\n", self.name(), self.voice()));
        prompt.push_str(&format!(
            "Tonight's telling is {}.\n",
            self.genre_label()
        ));

        prompt.push_str("\n## Tonight's Table\n");
        prompt.push_str(match mode {
            StoryMode::Tale => TALE_PROMPT,
            StoryMode::Adventure => ADVENTURE_PROMPT,
        });

        prompt
    }
}

/// A [`Storyteller`] backed by a local Ollama model.
///
/// Holds the system instructions and the rolling transcript of completed
/// turns. Turns run on a spawned task; the returned stream yields
/// extracted partials as the structured document grows.
pub struct OllamaStoryteller {
    client: ollama::Ollama,
    transcript: Arc<Mutex<Vec<ollama::Message>>>,
    model_options: Option<ollama::ModelOptions>,
}

impl OllamaStoryteller {
    pub fn new(client: ollama::Ollama, instructions: impl Into<String>) -> Self {
        Self {
            client,
            transcript: Arc::new(Mutex::new(vec![ollama::Message::system(instructions)])),
            model_options: None,
        }
    }

    pub fn with_model_options(mut self, options: ollama::ModelOptions) -> Self {
        self.model_options = Some(options);
        self
    }

    /// Messages in the rolling transcript, the system prompt included.
    pub fn transcript_len(&self) -> usize {
        self.lock_transcript().len()
    }

    /// Forget every completed turn, keeping only the system prompt.
    pub fn reset_transcript(&self) {
        let mut transcript = self.lock_transcript();
        transcript.truncate(1);
    }

    fn lock_transcript(&self) -> MutexGuard<'_, Vec<ollama::Message>> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storyteller for OllamaStoryteller {
    fn reset_history(&self) {
        self.reset_transcript();
    }

    fn stream_turn(&self, prompt: &str, relay: OptionRelay) -> TurnStream {
        let mut messages = self.lock_transcript().clone();
        messages.push(ollama::Message::user(prompt));

        let (tx, rx) = mpsc::channel(32);
        let driver = TurnDriver {
            client: self.client.clone(),
            messages,
            prompt: prompt.to_string(),
            transcript: Arc::clone(&self.transcript),
            model_options: self.model_options.clone(),
            relay,
            tx,
        };
        tokio::spawn(driver.run());

        Box::pin(ReceiverStream::new(rx))
    }
}

/// Runs the rounds of one turn and feeds results to the listener.
///
/// A closed listener means the turn was superseded; the driver exits
/// without committing anything to the transcript.
struct TurnDriver {
    client: ollama::Ollama,
    messages: Vec<ollama::Message>,
    prompt: String,
    transcript: Arc<Mutex<Vec<ollama::Message>>>,
    model_options: Option<ollama::ModelOptions>,
    relay: OptionRelay,
    tx: mpsc::Sender<Result<TurnPartial, StorytellerError>>,
}

impl TurnDriver {
    async fn run(mut self) {
        for _ in 0..MAX_TOOL_ROUNDS {
            let mut request = ollama::ChatRequest::new(self.messages.clone())
                .with_format(story_turn_schema())
                .with_tools(StoryTools::all());
            if let Some(options) = self.model_options.clone() {
                request = request.with_options(options);
            }

            let mut stream = match self.client.stream_chat(request).await {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = self.tx.send(Err(error.into())).await;
                    return;
                }
            };

            // The document restarts on every round; only the round that
            // ends without tool calls carries the turn's real document.
            let mut extractor = TurnExtractor::new();
            let mut tool_calls: Vec<ollama::ToolCall> = Vec::new();

            while let Some(item) = stream.next().await {
                if self.tx.is_closed() {
                    return;
                }
                match item {
                    Ok(chunk) => {
                        tool_calls.extend(chunk.tool_calls().iter().cloned());
                        let text = chunk.text();
                        if text.is_empty() {
                            continue;
                        }
                        let partial = extractor.push(text);
                        if partial == TurnPartial::default() {
                            continue;
                        }
                        if self.tx.send(Ok(partial)).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = self.tx.send(Err(error.into())).await;
                        return;
                    }
                }
            }

            if tool_calls.is_empty() {
                self.finish(extractor).await;
                return;
            }

            let mut assistant = ollama::Message::assistant(extractor.raw());
            assistant.tool_calls = tool_calls.clone();
            self.messages.push(assistant);

            for call in &tool_calls {
                let result =
                    tools::execute_tool(&call.function.name, &call.function.arguments, &self.relay);
                self.messages.push(ollama::Message::tool(result));
            }
        }

        let _ = self
            .tx
            .send(Err(StorytellerError::ToolRounds(MAX_TOOL_ROUNDS)))
            .await;
    }

    /// Validate the final document, emit it as the closing partial, and
    /// commit the turn to the transcript.
    async fn finish(self, extractor: TurnExtractor) {
        if extractor.raw().trim().is_empty() {
            let _ = self.tx.send(Err(StorytellerError::EmptyTurn)).await;
            return;
        }

        match extractor.finish() {
            Ok(turn) => {
                let partial = TurnPartial {
                    story: Some(turn.story.clone()),
                    options: Some(turn.options.clone()),
                };
                if self.tx.send(Ok(partial)).await.is_err() {
                    return;
                }

                let mut transcript = self
                    .transcript
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                transcript.push(ollama::Message::user(&self.prompt));
                transcript.push(ollama::Message::assistant(extractor.raw()));
            }
            Err(error) => {
                let _ = self
                    .tx
                    .send(Err(StorytellerError::Document(error)))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_presets_with_distinct_names() {
        let presets = Persona::presets();
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[0].name(), "The Old Knight");
        assert_eq!(presets[1].name(), "The Stranger");
        assert_eq!(presets[2].name(), "The Drifter");
    }

    #[test]
    fn test_five_custom_genres() {
        let genres = Genre::all();
        assert_eq!(genres.len(), 5);
        for genre in genres {
            assert!(!genre.label().is_empty());
        }
    }

    #[test]
    fn test_instructions_carry_document_contract() {
        let prompt = Persona::OldKnight.instructions(StoryMode::Tale);
        assert!(prompt.contains("\"story\""));
        assert!(prompt.contains("\"options\""));
        assert!(prompt.contains("The Old Knight"));
        assert!(prompt.contains("medieval fantasy"));
    }

    #[test]
    fn test_modes_swap_the_table_section() {
        let tale = Persona::Drifter.instructions(StoryMode::Tale);
        let adventure = Persona::Drifter.instructions(StoryMode::Adventure);
        assert!(tale.contains("fireside tale"));
        assert!(adventure.contains("dungeon adventure"));
        assert!(!tale.contains("dungeon adventure"));
    }

    #[test]
    fn test_custom_persona_uses_given_voice() {
        let persona = Persona::custom(
            "Aunt Maren",
            Genre::HealingTale,
            "a retired lighthouse keeper who speaks in tides",
        );
        let prompt = persona.instructions(StoryMode::Tale);
        assert!(prompt.contains("Aunt Maren"));
        assert!(prompt.contains("a healing tale"));
        assert!(prompt.contains("lighthouse keeper"));
        assert_eq!(persona.tagline(), "a retired lighthouse keeper who speaks in tides");
    }

    #[test]
    fn test_transcript_starts_with_system_and_resets_to_it() {
        let teller = OllamaStoryteller::new(ollama::Ollama::new(), "instructions");
        assert_eq!(teller.transcript_len(), 1);

        {
            let mut transcript = teller.lock_transcript();
            transcript.push(ollama::Message::user("tell me a story"));
            transcript.push(ollama::Message::assistant("{\"story\":\"...\"}"));
        }
        assert_eq!(teller.transcript_len(), 3);

        teller.reset_transcript();
        assert_eq!(teller.transcript_len(), 1);
    }

    #[test]
    fn test_tool_round_errors_name_the_bound() {
        let error = StorytellerError::ToolRounds(MAX_TOOL_ROUNDS);
        assert_eq!(error.to_string(), "Turn exceeded 6 rounds of tool calls");
    }
}
