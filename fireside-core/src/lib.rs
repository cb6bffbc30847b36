//! Interactive storytelling engine with streaming narration.
//!
//! This crate provides:
//! - A streaming turn controller that survives turns being superseded
//!   mid-generation
//! - Storyteller personas driving a local Ollama model with tool calls
//!   and structured output
//! - Tale and adventure session flows with sentence-by-sentence speech
//!   narration
//! - Headless sessions for scripts and integration tests
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use fireside_core::narrate::CommandNarrator;
//! use fireside_core::{Persona, StorySession};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ollama::Ollama::from_env();
//!     let narrator = Arc::new(CommandNarrator::new());
//!     let session = StorySession::with_ollama(client, narrator, Persona::OldKnight);
//!
//!     let mut views = session.subscribe();
//!     session.begin("a lighthouse keeper");
//!
//!     while views.changed().await.is_ok() {
//!         let view = views.borrow().clone();
//!         println!("{}", view.displayed_story);
//!         if !view.is_generating {
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod adventure;
pub mod assets;
pub mod headless;
pub mod narrate;
pub mod session;
pub mod settings;
pub mod storyteller;
pub mod structured;
pub mod testing;
pub mod tools;
pub mod turn;

// Primary public API
pub use adventure::{AdventureSession, Hero, WorldSetup};
pub use headless::{HeadlessConfig, HeadlessStory};
pub use narrate::{CommandNarrator, Narrator, NullNarrator};
pub use session::StorySession;
pub use settings::{load_settings, save_settings, AppSettings};
pub use storyteller::{Genre, OllamaStoryteller, Persona, StoryMode, Storyteller};
pub use turn::{TurnController, TurnPartial, TurnView};
