//! Speech narration.
//!
//! Narration is best effort: segments are queued to an external
//! speech-synthesis command, one utterance at a time, and any failure
//! turns narration off rather than disturbing the story.

use std::collections::VecDeque;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// A sink for narration segments.
///
/// `speak` must not block: implementations queue internally and speak in
/// submission order. `stop` discards the queue and silences any current
/// utterance.
pub trait Narrator: Send + Sync {
    fn speak(&self, text: &str);
    fn stop(&self);
}

/// A narrator that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNarrator;

impl Narrator for NullNarrator {
    fn speak(&self, _text: &str) {}
    fn stop(&self) {}
}

enum NarrateCmd {
    Speak(String),
    Stop,
}

/// Narrates by running a speech-synthesis command per segment.
///
/// A queue task runs at most one synthesis subprocess at a time, in
/// submission order. Must be created inside a tokio runtime.
pub struct CommandNarrator {
    tx: mpsc::UnboundedSender<NarrateCmd>,
}

impl CommandNarrator {
    /// Use the platform's synthesis command (`say` on macOS, `espeak`
    /// elsewhere), or the FIRESIDE_NARRATOR override.
    pub fn new() -> Self {
        Self::with_command(default_command())
    }

    /// Use a specific synthesis program. The segment text is passed as
    /// the final argument.
    pub fn with_command(program: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(program.into(), rx));
        Self { tx }
    }
}

impl Default for CommandNarrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Narrator for CommandNarrator {
    fn speak(&self, text: &str) {
        let _ = self.tx.send(NarrateCmd::Speak(text.to_string()));
    }

    fn stop(&self) {
        let _ = self.tx.send(NarrateCmd::Stop);
    }
}

fn default_command() -> String {
    if let Ok(command) = std::env::var("FIRESIDE_NARRATOR") {
        return command;
    }
    if cfg!(target_os = "macos") {
        "say".to_string()
    } else {
        "espeak".to_string()
    }
}

async fn run_queue(program: String, mut rx: mpsc::UnboundedReceiver<NarrateCmd>) {
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut current: Option<Child> = None;
    let mut disabled = false;

    loop {
        if current.is_none() && !disabled {
            if let Some(text) = queue.pop_front() {
                match Command::new(&program)
                    .arg(&text)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(child) => current = Some(child),
                    Err(_) => {
                        // Synthesis command unavailable; stay quiet from
                        // here on.
                        disabled = true;
                        queue.clear();
                    }
                }
            }
        }

        tokio::select! {
            cmd = rx.recv() => match cmd {
                None => {
                    if let Some(mut child) = current.take() {
                        let _ = child.start_kill();
                    }
                    return;
                }
                Some(NarrateCmd::Speak(text)) => {
                    if !disabled {
                        queue.push_back(text);
                    }
                }
                Some(NarrateCmd::Stop) => {
                    queue.clear();
                    if let Some(mut child) = current.take() {
                        let _ = child.start_kill();
                    }
                }
            },
            _ = wait_current(&mut current) => {
                current = None;
            }
        }
    }
}

/// Resolve when the running utterance finishes; never while idle.
async fn wait_current(current: &mut Option<Child>) {
    match current {
        Some(child) => {
            let _ = child.wait().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_narrator_is_silent() {
        let narrator = NullNarrator;
        narrator.speak("Nothing happens.");
        narrator.stop();
    }

    #[tokio::test]
    async fn test_command_narrator_queue_survives_stop() {
        // `true` exits immediately, which exercises the queue/reap cycle
        // without making a sound.
        let narrator = CommandNarrator::with_command("true");
        narrator.speak("First sentence.");
        narrator.speak("Second sentence.");
        narrator.stop();
        narrator.speak("After the stop.");
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_missing_command_disables_quietly() {
        let narrator = CommandNarrator::with_command("definitely-not-a-real-synth");
        narrator.speak("One.");
        narrator.speak("Two.");
        tokio::task::yield_now().await;
        narrator.stop();
    }
}
