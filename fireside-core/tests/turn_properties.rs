//! Controller behavior under streaming, supersession, and reset.
//!
//! Every scenario runs on the single-threaded test runtime with a
//! manually driven storyteller, so each stream event and its effect on
//! the view can be checked in isolation.

use fireside_core::session::DEFAULT_ENCORE;
use fireside_core::storyteller::StorytellerError;
use fireside_core::testing::{
    assert_error_contains, assert_generating, assert_idle, assert_options, assert_spoken,
    assert_story, TurnHarness,
};

#[tokio::test]
async fn test_partials_replace_rather_than_append() {
    let harness = TurnHarness::new();

    // Text committed before the turn stays as the baseline.
    harness.controller.append_player_line("X");
    let turn = harness.start("prompt").await;

    turn.story("a");
    turn.story("ab");
    turn.story("abc");
    harness.settle().await;
    assert_story(&harness, "Xabc");

    turn.end();
    harness.settle().await;
    assert_story(&harness, "Xabc");
    assert_idle(&harness);
}

#[tokio::test]
async fn test_growing_partials_narrate_each_word_once() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.story("The fire");
    harness.settle().await;
    assert_spoken(&harness, &[]);

    turn.story("The fire burned low.");
    harness.settle().await;
    assert_spoken(&harness, &["The fire burned low."]);

    turn.story("The fire burned low. Sparks rose");
    turn.end();
    harness.settle().await;

    // The unterminated tail is flushed when the stream ends.
    assert_spoken(&harness, &["The fire burned low.", "Sparks rose"]);
}

#[tokio::test]
async fn test_sentences_split_across_chunk_boundaries() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.story("Hello wor");
    turn.story("Hello world. How are ");
    turn.story("Hello world. How are you? Fi");
    turn.story("Hello world. How are you? Fine.");
    turn.end();
    harness.settle().await;

    assert_spoken(&harness, &["Hello world.", "How are you?", "Fine."]);
    assert_story(&harness, "Hello world. How are you? Fine.");
}

#[tokio::test]
async fn test_options_withheld_until_the_turn_ends() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.story("A choice nears.");
    turn.options(&["Run", "", "   ", "Hide"]);
    harness.settle().await;
    assert_options(&harness, &[]);
    assert_generating(&harness);

    turn.end();
    harness.settle().await;
    // Blank entries are dropped; the survivors keep their exact text.
    assert_options(&harness, &["Run", "Hide"]);
}

#[tokio::test]
async fn test_turns_without_options_fall_back_to_the_default() {
    let harness = TurnHarness::with_default_options(&["Press on."]);
    let turn = harness.start("prompt").await;

    turn.story("Darkness ahead.");
    turn.end();
    harness.settle().await;

    assert_options(&harness, &["Press on."]);
}

#[tokio::test]
async fn test_tool_delivered_options_survive_to_the_end() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.relay
        .deliver(vec!["North".to_string(), "South".to_string()]);
    harness.settle().await;
    assert_options(&harness, &[]);

    turn.story("The road forks.");
    turn.end();
    harness.settle().await;
    assert_options(&harness, &["North", "South"]);
}

#[tokio::test]
async fn test_superseding_turn_silences_the_first() {
    let harness = TurnHarness::new();

    let first = harness.start("first prompt").await;
    first.story("The first tale began.");
    harness.settle().await;
    assert_story(&harness, "The first tale began.");

    // A new turn takes over mid-stream, rebasing on the displayed text.
    let second = harness.start("second prompt").await;
    assert_generating(&harness);

    // Emissions from the first turn are stale and change nothing.
    first.story("The first tale began. And went on and on.");
    first.options(&["Stale choice"]);
    first.relay.deliver(vec!["Stale relay".to_string()]);
    harness.settle().await;
    assert_story(&harness, "The first tale began.");

    second.story(" A second voice spoke.");
    second.end();
    harness.settle().await;

    assert_idle(&harness);
    assert_story(&harness, "The first tale began. A second voice spoke.");
    assert_options(&harness, &[DEFAULT_ENCORE]);
    assert_spoken(&harness, &["The first tale began.", "A second voice spoke."]);
}

#[tokio::test]
async fn test_stream_error_ends_the_turn_in_place() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.story("It began well.");
    harness.settle().await;

    turn.fail(StorytellerError::EmptyTurn);
    harness.settle().await;

    assert_idle(&harness);
    assert_error_contains(&harness, "fell silent");
    // The text that did arrive stays on screen.
    assert_story(&harness, "It began well.");

    // Starting over clears the error.
    let _turn = harness.start("again").await;
    assert_generating(&harness);
    assert!(harness.view().error_message.is_none());
}

#[tokio::test]
async fn test_reset_clears_state_and_silences_the_stream() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;

    turn.story("Something was said. More");
    harness.settle().await;
    assert_spoken(&harness, &["Something was said."]);

    harness.controller.reset();
    harness.settle().await;

    assert_story(&harness, "");
    assert_idle(&harness);
    assert_options(&harness, &[]);
    assert_eq!(harness.narrator.stop_count(), 1);

    // Emissions from the aborted turn land nowhere.
    turn.story("Something was said. More words arrive.");
    harness.settle().await;
    assert_story(&harness, "");

    // Reset twice is as good as once.
    harness.controller.reset();
    harness.settle().await;
    assert_story(&harness, "");
    assert_eq!(harness.narrator.stop_count(), 2);
}

#[tokio::test]
async fn test_player_lines_ignored_mid_generation() {
    let harness = TurnHarness::new();
    let turn = harness.start("prompt").await;
    assert_generating(&harness);

    harness.controller.append_player_line("an intruding line");
    harness.settle().await;
    assert_story(&harness, "");

    turn.story("The tale.");
    turn.end();
    harness.settle().await;
    assert_story(&harness, "The tale.");

    // Once the turn is over the line is committed and becomes baseline.
    harness.controller.append_player_line("\n\nAgain?\n\n");
    assert_story(&harness, "The tale.\n\nAgain?\n\n");
}
