//! QA tests against a live Ollama server using the headless API.
//!
//! These tests verify the full storytelling flow with real model
//! responses:
//! - Opening a tale and receiving streamed text plus options
//! - Multi-exchange continuations
//! - Adventure setup, appearance generation, and evaluation
//!
//! Run with: `OLLAMA_MODEL=llama3.2 cargo test -p fireside-core --test qa_live -- --ignored --nocapture`

use std::sync::Arc;

use fireside_core::adventure::{generate_appearance, AdventureSession, Hero, WorldSetup};
use fireside_core::headless::{HeadlessConfig, HeadlessStory};
use fireside_core::narrate::NullNarrator;
use fireside_core::storyteller::Persona;
use fireside_core::turn::TurnView;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

/// Check if a live model is configured
fn has_model() -> bool {
    std::env::var("OLLAMA_MODEL").is_ok()
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Wait for the session's current turn to finish streaming.
async fn wait_idle(mut views: tokio::sync::watch::Receiver<TurnView>) {
    loop {
        {
            let view = views.borrow_and_update();
            if !view.is_generating {
                break;
            }
        }
        if views.changed().await.is_err() {
            break;
        }
    }
}

// =============================================================================
// TALE FLOW TESTS
// =============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test -p fireside-core --test qa_live -- --ignored
async fn test_tale_first_turn() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing First Tale Turn ===\n");

    let mut story = HeadlessStory::new(HeadlessConfig::quick_start());
    let report = story.begin("a lighthouse keeper who hears singing").await;

    println!("Story length: {} chars", report.story.chars().count());
    println!("Story preview: {}...", preview(&report.story));
    println!("Options: {:?}", report.options);

    assert!(report.error.is_none(), "Turn failed: {:?}", report.error);
    assert!(!report.story.is_empty(), "Story should not be empty");
    assert!(!report.options.is_empty(), "Options should never be empty");

    println!("\nSUCCESS: First turn completed");
}

#[tokio::test]
#[ignore]
async fn test_tale_multi_exchange_flow() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing Multi-Exchange Tale ===\n");

    let mut story = HeadlessStory::new(HeadlessConfig::with_persona(Persona::Drifter));

    println!("--- Exchange 1: opening ---");
    let report = story.begin("a locked arcade after midnight").await;
    assert!(report.error.is_none(), "Turn failed: {:?}", report.error);
    println!("{}...", preview(&report.story));
    println!("Options: {:?}", report.options);

    println!("\n--- Exchange 2: first choice ---");
    let report = story.choose(0).await.expect("an option should be on offer");
    assert!(report.error.is_none(), "Turn failed: {:?}", report.error);
    println!("{}...", preview(&report.story));

    assert_eq!(story.turn_count(), 2, "Should have 2 exchanges");
    assert!(
        story.transcript()[1].story.contains("👉"),
        "The chosen option should be echoed into the story"
    );

    println!("\nSUCCESS: Multi-exchange flow completed");
}

#[tokio::test]
#[ignore]
async fn test_blank_topic_tale() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing Blank Topic ===\n");

    let mut story = HeadlessStory::new(HeadlessConfig::with_persona(Persona::Stranger));
    let report = story.begin("").await;

    println!("Story preview: {}...", preview(&report.story));

    assert!(report.error.is_none(), "Turn failed: {:?}", report.error);
    assert!(
        !report.story.is_empty(),
        "The teller should pick a subject on their own"
    );
}

// =============================================================================
// ADVENTURE TESTS
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_adventure_first_scene() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing Adventure First Scene ===\n");

    let hero = Hero::new(
        "Wren",
        "a wiry scout in a patched grey cloak",
        "last survivor of the Vale watch",
        "cannot refuse a wager",
        "reads ruins like open books",
    )
    .expect("hero fields within limits");
    let world = WorldSetup::new("the drowned catacombs", "recover the tide bell");

    let session = AdventureSession::new(
        ollama::Ollama::from_env(),
        Arc::new(NullNarrator),
        Persona::OldKnight,
        hero,
        world,
    );

    let views = session.subscribe();
    session.begin();
    wait_idle(views).await;

    let view = session.view();
    println!("Scene preview: {}...", preview(&view.displayed_story));
    println!("Options: {:?}", view.current_options);

    assert!(view.error_message.is_none(), "Turn failed: {:?}", view.error_message);
    assert!(!view.displayed_story.is_empty(), "Scene should not be empty");
    assert!(!view.current_options.is_empty(), "Options should never be empty");

    println!("\nSUCCESS: Adventure opened");
}

#[tokio::test]
#[ignore]
async fn test_appearance_generation_respects_the_limit() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing Appearance Generation ===\n");

    let client = ollama::Ollama::from_env();
    let appearance = generate_appearance(&client, "a retired clockmaker turned tomb robber")
        .await
        .expect("appearance generation should succeed");

    println!("Appearance: {}", appearance);
    println!("Length: {} chars", appearance.chars().count());

    assert!(!appearance.is_empty());
    assert!(appearance.chars().count() <= 150);
}

#[tokio::test]
#[ignore]
async fn test_evaluation_reports_a_rating() {
    setup();
    if !has_model() {
        eprintln!("Skipping test: OLLAMA_MODEL not set");
        return;
    }

    println!("\n=== Testing Playthrough Evaluation ===\n");

    let hero = Hero::new("Brakk", "broad", "a dockhand", "greedy", "strong grip")
        .expect("hero fields within limits");
    let world = WorldSetup::new("a rotting lighthouse", "douse the false beacon");

    let session = AdventureSession::new(
        ollama::Ollama::from_env(),
        Arc::new(NullNarrator),
        Persona::Stranger,
        hero,
        world,
    );

    let views = session.subscribe();
    session.begin();
    wait_idle(views).await;

    let report = session.evaluate().await.expect("evaluation should succeed");

    println!("Rating: {}/10", report.rating);
    println!("Verdict: {}", report.verdict);
    println!("Highlight: {}", report.highlight);

    assert!((1..=10).contains(&report.rating));
    assert!(!report.verdict.is_empty());
}
