//! The streaming turn controller.
//!
//! One turn is one structured-generation request whose partial results
//! are reconciled into the displayed story, narrated sentence by
//! sentence, and resolved into a set of player options. The controller
//! survives turns being superseded mid-stream: every asynchronous
//! callback carries the epoch it was started under, and a callback whose
//! epoch is no longer current is discarded without touching state.
//!
//! Partials carry the *full* story text generated so far this turn, not
//! a delta. Display therefore replaces (`baseline + story`) rather than
//! appends, while the narration cursor converts the same text into true
//! deltas so nothing is spoken twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::narrate::Narrator;
use crate::storyteller::{Storyteller, StorytellerError};

/// Sentence-terminating delimiters for narration, ASCII and full-width.
pub const SENTENCE_DELIMITERS: &[char] = &['.', '!', '?', '\n', '…', '。', '！', '？'];

/// One incremental emission from the generation capability.
///
/// `story`, when present, is the full text generated so far for the
/// current turn. `options`, when present, is the in-progress choice list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnPartial {
    pub story: Option<String>,
    pub options: Option<Vec<String>>,
}

/// A read-only snapshot of the controller's user-visible state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnView {
    pub displayed_story: String,
    pub is_generating: bool,
    pub current_options: Vec<String>,
    pub error_message: Option<String>,
}

/// A choice list delivered by a tool call, tagged with the epoch of the
/// turn that asked for it.
#[derive(Debug, Clone)]
pub struct OptionSignal {
    pub epoch: u64,
    pub options: Vec<String>,
}

/// Sending half of the option relay, handed to tool executors.
///
/// The controller owns the receiving end exclusively; signals from turns
/// that have since been superseded are dropped there.
#[derive(Debug, Clone)]
pub struct OptionRelay {
    epoch: u64,
    tx: mpsc::UnboundedSender<OptionSignal>,
}

impl OptionRelay {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<OptionSignal>) -> Self {
        Self { epoch, tx }
    }

    /// The epoch of the turn this relay was issued for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Deliver a choice list for that turn.
    pub fn deliver(&self, options: Vec<String>) {
        let _ = self.tx.send(OptionSignal {
            epoch: self.epoch,
            options,
        });
    }
}

/// Configuration for a [`TurnController`].
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Options substituted when a finished turn supplies none.
    pub default_options: Vec<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            default_options: vec![crate::session::DEFAULT_ENCORE.to_string()],
        }
    }
}

/// Drives turns against a [`Storyteller`] and owns all turn state.
///
/// State flows out exclusively through [`TurnView`] snapshots on a watch
/// channel; callers express intent through [`start_turn`],
/// [`append_player_line`] and [`reset`]. Must be created inside a tokio
/// runtime.
///
/// [`start_turn`]: TurnController::start_turn
/// [`append_player_line`]: TurnController::append_player_line
/// [`reset`]: TurnController::reset
pub struct TurnController {
    inner: Arc<Inner>,
    relay_tx: mpsc::UnboundedSender<OptionSignal>,
}

struct Inner {
    epoch: AtomicU64,
    state: Mutex<TurnState>,
    views: watch::Sender<TurnView>,
    narrator: Arc<dyn Narrator>,
    storyteller: Arc<dyn Storyteller>,
    default_options: Vec<String>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct TurnState {
    /// Committed story text at the moment the current turn began.
    baseline: String,
    /// What the user sees: baseline plus the current turn's text so far.
    displayed: String,
    /// Characters of the current turn's story already sent to narration.
    cursor: usize,
    /// Text accumulated since the last sentence boundary.
    speech: String,
    /// Options seen mid-stream, withheld until the turn completes.
    pending_options: Vec<String>,
    /// Options published to the user after the last completed turn.
    current_options: Vec<String>,
    generating: bool,
    error: Option<String>,
}

impl TurnState {
    fn view(&self) -> TurnView {
        TurnView {
            displayed_story: self.displayed.clone(),
            is_generating: self.generating,
            current_options: self.current_options.clone(),
            error_message: self.error.clone(),
        }
    }
}

impl TurnController {
    pub fn new(
        storyteller: Arc<dyn Storyteller>,
        narrator: Arc<dyn Narrator>,
        config: TurnConfig,
    ) -> Self {
        let (views, _) = watch::channel(TurnView::default());
        let (relay_tx, mut relay_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            epoch: AtomicU64::new(0),
            state: Mutex::new(TurnState::default()),
            views,
            narrator,
            storyteller,
            default_options: config.default_options,
            task: Mutex::new(None),
        });

        // The controller owns the receiving end of the option relay for
        // its whole lifetime; the task ends when the last sender is gone.
        let relay_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(signal) = relay_rx.recv().await {
                relay_inner.on_option_signal(signal);
            }
        });

        Self { inner, relay_tx }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<TurnView> {
        self.inner.views.subscribe()
    }

    /// The current state snapshot.
    pub fn view(&self) -> TurnView {
        self.inner.views.borrow().clone()
    }

    /// Begin a new turn, superseding any turn still in flight.
    ///
    /// The superseded turn is not cancelled out-of-band: its consumer
    /// notices the new epoch at its next yield point and exits, and every
    /// callback it had in flight is discarded by the epoch guard.
    pub fn start_turn(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = self.inner.lock_state();
            // A superseded turn may never reach its end; rebase on what
            // is actually on screen so no displayed text is lost.
            state.baseline = state.displayed.clone();
            state.cursor = 0;
            state.speech.clear();
            state.pending_options.clear();
            state.current_options.clear();
            state.generating = true;
            state.error = None;
            self.inner.views.send_replace(state.view());
        }

        let relay = OptionRelay::new(epoch, self.relay_tx.clone());
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut stream = inner.storyteller.stream_turn(&prompt, relay);
            loop {
                // Check before the await as well as inside each handler:
                // a supersession can land on either side of the yield.
                if inner.epoch.load(Ordering::SeqCst) != epoch {
                    return;
                }
                match stream.next().await {
                    Some(Ok(partial)) => inner.on_partial(epoch, partial),
                    Some(Err(error)) => {
                        inner.on_stream_error(epoch, error);
                        return;
                    }
                    None => {
                        inner.on_stream_end(epoch);
                        return;
                    }
                }
            }
        });

        let mut task = self.inner.lock_task();
        // A replaced handle is dropped, not aborted: the old consumer
        // exits on its own at the next epoch check.
        *task = Some(handle);
    }

    /// Commit text to the story outside any turn, e.g. the player's
    /// chosen option echoed into the transcript. Ignored while a turn is
    /// generating.
    pub fn append_player_line(&self, text: &str) {
        let mut state = self.inner.lock_state();
        if state.generating {
            return;
        }
        state.displayed.push_str(text);
        state.baseline = state.displayed.clone();
        self.inner.views.send_replace(state.view());
    }

    /// Abandon everything: bump the epoch, abort the consumer task, stop
    /// narration, and clear all state. Safe to call at any time, any
    /// number of times.
    pub fn reset(&self) {
        // Invalidate first so a callback racing with the abort below is
        // already stale.
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.inner.lock_task().take() {
            handle.abort();
        }
        self.inner.narrator.stop();

        let mut state = self.inner.lock_state();
        *state = TurnState::default();
        self.inner.views.send_replace(state.view());
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_partial(&self, epoch: u64, partial: TurnPartial) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        let mut state = self.lock_state();
        // Re-check under the lock: the supersession may have landed
        // between the check above and acquiring the lock.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        if let Some(story) = partial.story {
            state.displayed = format!("{}{}", state.baseline, story);

            let new_len = story.chars().count();
            if new_len > state.cursor {
                let delta: String = story.chars().skip(state.cursor).collect();
                state.speech.push_str(&delta);
                state.cursor = new_len;
                for segment in split_sentences(&mut state.speech) {
                    self.narrator.speak(&segment);
                }
            }
            self.views.send_replace(state.view());
        }

        if let Some(options) = partial.options {
            state.pending_options = options;
        }
    }

    fn on_stream_end(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        let mut state = self.lock_state();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        // This turn's output becomes the committed history.
        state.baseline = state.displayed.clone();

        // Whatever remains in the buffer is spoken even without a
        // terminating delimiter.
        let tail = std::mem::take(&mut state.speech);
        let tail = tail.trim();
        if !tail.is_empty() {
            self.narrator.speak(tail);
        }

        let mut options: Vec<String> = state
            .pending_options
            .iter()
            .filter(|option| !option.trim().is_empty())
            .cloned()
            .collect();
        if options.is_empty() {
            options = self.default_options.clone();
        }
        state.current_options = options;
        state.generating = false;
        self.views.send_replace(state.view());
    }

    fn on_stream_error(&self, epoch: u64, error: StorytellerError) {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        let mut state = self.lock_state();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        state.error = Some(error.to_string());
        state.generating = false;
        self.views.send_replace(state.view());
    }

    /// Tool-delivered options join the pending set under the same
    /// withholding rules as schema-extracted ones. Late signals for a
    /// turn that already completed are dropped.
    fn on_option_signal(&self, signal: OptionSignal) {
        if self.epoch.load(Ordering::SeqCst) != signal.epoch {
            return;
        }
        let mut state = self.lock_state();
        if self.epoch.load(Ordering::SeqCst) != signal.epoch {
            return;
        }
        if !state.generating {
            return;
        }
        state.pending_options = signal.options;
    }
}

/// Split every delimiter-terminated sentence off the front of the buffer.
///
/// Returns the trimmed, non-empty segments in text order; the
/// unterminated tail stays in the buffer.
fn split_sentences(buffer: &mut String) -> Vec<String> {
    let mut segments = Vec::new();
    while let Some(pos) = buffer.find(SENTENCE_DELIMITERS) {
        let delimiter_len = buffer[pos..].chars().next().map_or(1, char::len_utf8);
        let sentence: String = buffer.drain(..pos + delimiter_len).collect();
        let trimmed = sentence.trim();
        if !trimmed.is_empty() {
            segments.push(trimmed.to_string());
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_at_each_delimiter_kind() {
        let mut buffer = "One. Two! Three? Four\nFive…".to_string();
        let segments = split_sentences(&mut buffer);
        assert_eq!(segments, vec!["One.", "Two!", "Three?", "Four", "Five…"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unterminated_tail_stays_buffered() {
        let mut buffer = "Hello world. How are".to_string();
        let segments = split_sentences(&mut buffer);
        assert_eq!(segments, vec!["Hello world."]);
        assert_eq!(buffer, " How are");
    }

    #[test]
    fn test_full_width_delimiters() {
        let mut buffer = "你回來了。還好嗎？".to_string();
        let segments = split_sentences(&mut buffer);
        assert_eq!(segments, vec!["你回來了。", "還好嗎？"]);
    }

    #[test]
    fn test_whitespace_only_segments_dropped() {
        let mut buffer = "\n\nFirst line.\n".to_string();
        let segments = split_sentences(&mut buffer);
        assert_eq!(segments, vec!["First line."]);
    }

    #[test]
    fn test_relay_signal_carries_epoch() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay = OptionRelay::new(7, tx);
        assert_eq!(relay.epoch(), 7);

        relay.deliver(vec!["North".to_string(), "South".to_string()]);
        let signal = rx.try_recv().expect("signal delivered");
        assert_eq!(signal.epoch, 7);
        assert_eq!(signal.options.len(), 2);
    }

    #[test]
    fn test_default_config_offers_an_encore() {
        let config = TurnConfig::default();
        assert_eq!(config.default_options.len(), 1);
        assert!(!config.default_options[0].is_empty());
    }
}
