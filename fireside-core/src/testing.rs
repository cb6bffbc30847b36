//! Testing utilities for the storytelling engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedStoryteller` for deterministic sessions without a model
//! - `ManualStoryteller` for hand-driving a turn one event at a time
//! - `RecordingNarrator` for asserting on narrated segments
//! - `TurnHarness` plus assertion helpers for controller scenarios

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::narrate::Narrator;
use crate::storyteller::{Storyteller, StorytellerError, TurnStream};
use crate::turn::{OptionRelay, TurnConfig, TurnController, TurnPartial, TurnView};

/// One scripted turn: the partials its stream yields, in order.
pub type Script = Vec<Result<TurnPartial, StorytellerError>>;

/// A storyteller that replays scripted turns.
///
/// Each `stream_turn` call consumes the next queued script. With no
/// script queued the stream ends immediately, which completes the turn
/// with no text and the caller's default options.
#[derive(Default)]
pub struct ScriptedStoryteller {
    /// Scripts to play, one per turn, in queue order.
    scripts: Mutex<VecDeque<Script>>,
    /// Every prompt this storyteller has been asked to tell.
    prompts: Mutex<Vec<String>>,
    /// How many times the rolling context was reset.
    resets: AtomicUsize,
}

impl ScriptedStoryteller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the partials for one future turn.
    pub fn push_script(&self, script: Script) {
        self.lock_scripts().push_back(script);
    }

    /// Queue a turn that streams `story` and closes with `options`.
    pub fn push_turn(&self, story: &str, options: &[&str]) {
        self.push_script(vec![Ok(TurnPartial {
            story: Some(story.to_string()),
            options: Some(options.iter().map(|s| s.to_string()).collect()),
        })]);
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `reset_history` was called.
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn lock_scripts(&self) -> MutexGuard<'_, VecDeque<Script>> {
        self.scripts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storyteller for ScriptedStoryteller {
    fn stream_turn(&self, prompt: &str, _relay: OptionRelay) -> TurnStream {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let script = self.lock_scripts().pop_front().unwrap_or_default();
        Box::pin(futures::stream::iter(script))
    }

    fn reset_history(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// A storyteller whose streams are fed by the test, event by event.
///
/// Every `stream_turn` call registers a [`ManualTurn`]; the test picks
/// it up with [`next_turn`] and pushes partials, errors, or the end of
/// the stream whenever the scenario calls for it.
///
/// [`next_turn`]: ManualStoryteller::next_turn
#[derive(Default)]
pub struct ManualStoryteller {
    turns: Mutex<VecDeque<ManualTurn>>,
}

/// The test-side handle to one manually driven turn.
pub struct ManualTurn {
    /// The prompt the turn was started with.
    pub prompt: String,
    /// The relay issued for this turn, for tool-delivery scenarios.
    pub relay: OptionRelay,
    tx: mpsc::UnboundedSender<Result<TurnPartial, StorytellerError>>,
}

impl ManualTurn {
    /// Emit a partial carrying the full story text so far.
    pub fn story(&self, text: &str) {
        self.partial(TurnPartial {
            story: Some(text.to_string()),
            options: None,
        });
    }

    /// Emit a partial carrying an in-progress options list.
    pub fn options(&self, options: &[&str]) {
        self.partial(TurnPartial {
            story: None,
            options: Some(options.iter().map(|s| s.to_string()).collect()),
        });
    }

    /// Emit an arbitrary partial. Sends into a superseded turn are
    /// silently dropped, as they would be in production.
    pub fn partial(&self, partial: TurnPartial) {
        let _ = self.tx.send(Ok(partial));
    }

    /// Fail the turn and end its stream.
    pub fn fail(self, error: StorytellerError) {
        let _ = self.tx.send(Err(error));
    }

    /// End the stream, completing the turn.
    pub fn end(self) {}
}

impl ManualStoryteller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest turn not yet claimed by the test.
    pub fn next_turn(&self) -> Option<ManualTurn> {
        self.lock_turns().pop_front()
    }

    fn lock_turns(&self) -> MutexGuard<'_, VecDeque<ManualTurn>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storyteller for ManualStoryteller {
    fn stream_turn(&self, prompt: &str, relay: OptionRelay) -> TurnStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_turns().push_back(ManualTurn {
            prompt: prompt.to_string(),
            relay,
            tx,
        });
        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// A narrator that records everything instead of speaking.
#[derive(Default)]
pub struct RecordingNarrator {
    spoken: Mutex<Vec<String>>,
    stops: AtomicUsize,
}

impl RecordingNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments spoken so far, in submission order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times narration was stopped.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Narrator for RecordingNarrator {
    fn speak(&self, text: &str) {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test harness wiring a controller to a manual storyteller and a
/// recording narrator.
///
/// Scenarios run on the single-threaded test runtime: after each batch
/// of events, [`settle`] lets the controller's tasks drain before the
/// test reads state.
///
/// [`settle`]: TurnHarness::settle
pub struct TurnHarness {
    /// The controller under test.
    pub controller: TurnController,
    /// The storyteller feeding it.
    pub storyteller: Arc<ManualStoryteller>,
    /// The narrator recording its speech.
    pub narrator: Arc<RecordingNarrator>,
}

impl TurnHarness {
    /// Create a harness with the default turn configuration.
    pub fn new() -> Self {
        Self::with_config(TurnConfig::default())
    }

    /// Create a harness whose finished turns fall back to `options`.
    pub fn with_default_options(options: &[&str]) -> Self {
        Self::with_config(TurnConfig {
            default_options: options.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn with_config(config: TurnConfig) -> Self {
        let storyteller = Arc::new(ManualStoryteller::new());
        let narrator = Arc::new(RecordingNarrator::new());
        let controller = TurnController::new(storyteller.clone(), narrator.clone(), config);
        Self {
            controller,
            storyteller,
            narrator,
        }
    }

    /// Start a turn and hand back its manual feed.
    ///
    /// Panics if the controller never opened a turn with the
    /// storyteller.
    pub async fn start(&self, prompt: &str) -> ManualTurn {
        self.controller.start_turn(prompt);
        self.settle().await;
        match self.storyteller.next_turn() {
            Some(turn) => turn,
            None => panic!("controller did not open a turn with the storyteller"),
        }
    }

    /// Let the controller's tasks process everything sent so far.
    pub async fn settle(&self) {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    /// The current state snapshot.
    pub fn view(&self) -> TurnView {
        self.controller.view()
    }
}

impl Default for TurnHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the displayed story is exactly `expected`.
#[track_caller]
pub fn assert_story(harness: &TurnHarness, expected: &str) {
    let view = harness.view();
    assert_eq!(
        view.displayed_story, expected,
        "Expected displayed story {expected:?}, got {:?}",
        view.displayed_story
    );
}

/// Assert the published options are exactly `expected`.
#[track_caller]
pub fn assert_options(harness: &TurnHarness, expected: &[&str]) {
    let view = harness.view();
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        view.current_options, expected,
        "Expected options {expected:?}, got {:?}",
        view.current_options
    );
}

/// Assert a turn is in flight.
#[track_caller]
pub fn assert_generating(harness: &TurnHarness) {
    assert!(harness.view().is_generating, "Expected a turn in flight");
}

/// Assert no turn is in flight.
#[track_caller]
pub fn assert_idle(harness: &TurnHarness) {
    assert!(!harness.view().is_generating, "Expected no turn in flight");
}

/// Assert the narrated segments so far are exactly `expected`.
#[track_caller]
pub fn assert_spoken(harness: &TurnHarness, expected: &[&str]) {
    let spoken = harness.narrator.spoken();
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(
        spoken, expected,
        "Expected narration {expected:?}, got {spoken:?}"
    );
}

/// Assert the view carries an error mentioning `needle`.
#[track_caller]
pub fn assert_error_contains(harness: &TurnHarness, needle: &str) {
    let view = harness.view();
    match view.error_message {
        Some(message) => assert!(
            message.contains(needle),
            "Expected error mentioning {needle:?}, got {message:?}"
        ),
        None => panic!("Expected an error mentioning {needle:?}, got none"),
    }
}
