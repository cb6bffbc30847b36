//! Fireside storytelling TUI.
//!
//! A vim-style terminal interface for an evening at the Wanderer's Inn:
//! pick a teller, name a topic or roll a hero, and watch the story
//! stream in.
//!
//! # Headless Mode
//!
//! Run with `--headless` for a text-based interface suitable for
//! scripted runs:
//!
//! ```bash
//! cargo run -p fireside -- --headless --persona drifter --topic "a locked door"
//! ```

mod app;
mod encounter;
mod events;
mod headless;
mod tavern;
mod ui;

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fireside_core::adventure::generate_appearance;
use fireside_core::settings::DEFAULT_SETTINGS_FILE;
use fireside_core::storyteller::Genre;
use fireside_core::{
    load_settings, save_settings, AppSettings, CommandNarrator, Narrator, NullNarrator,
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::{App, AppExit};
use events::{handle_event, EventResult};
use tavern::{EveningPlan, TavernNight};
use ui::render::render;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--headless") {
        let (config, topic) = headless::parse_config_from_args(&args);
        return headless::run_headless(config, topic).await.map_err(|e| e.into());
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let mut settings = match load_settings(DEFAULT_SETTINGS_FILE).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Could not read settings, using defaults: {e}");
            AppSettings::default()
        }
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut settings).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;

    if let Err(e) = save_settings(&settings, DEFAULT_SETTINGS_FILE).await {
        eprintln!("Could not save settings: {e}");
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

/// Tavern, evening, tavern again, until the listener leaves.
async fn run<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    settings: &mut AppSettings,
) -> io::Result<()> {
    let client = ollama::Ollama::from_env();

    loop {
        let Some(plan) = run_tavern(terminal, &client, settings).await? else {
            return Ok(());
        };

        let narrator = narrator_from(settings);
        let mut app = App::new(plan, client.clone(), narrator);
        if settings.music_enabled {
            app.fetch_theme_track();
        }

        match run_app(terminal, app).await? {
            AppExit::Quit => return Ok(()),
            AppExit::NewEvening => continue,
        }
    }
}

/// Run the tavern wizard. Returns `None` when the listener walks out.
async fn run_tavern<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    client: &ollama::Ollama,
    settings: &mut AppSettings,
) -> io::Result<Option<EveningPlan>> {
    let mut tavern = TavernNight::new(settings.narration_enabled)
        .with_default_genre(settings.default_genre.as_deref());

    loop {
        terminal.draw(|f| {
            let area = f.area();
            tavern.render(f, area);
        })?;

        // Resolve a requested hero sketch before reading more input
        if let Some(description) = tavern.pending_appearance.take() {
            tavern.sketching = true;
            terminal.draw(|f| {
                let area = f.area();
                tavern.render(f, area);
            })?;
            match generate_appearance(client, &description).await {
                Ok(appearance) => {
                    tavern.cursor_position = appearance.chars().count();
                    tavern.appearance = appearance;
                }
                Err(e) => tavern.error = Some(format!("No sketch came: {e}")),
            }
            tavern.sketching = false;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            tavern.handle_event(ev);
        }

        if tavern.cancelled {
            return Ok(None);
        }

        if tavern.finished {
            settings.narration_enabled = tavern.narration_enabled;
            if tavern.custom_teller() {
                settings.default_genre =
                    Some(Genre::all()[tavern.genre_index].label().to_string());
            }
            match tavern.build_plan() {
                Ok(plan) => return Ok(Some(plan)),
                Err(e) => {
                    // Show the problem and let them fix it
                    tavern.finished = false;
                    tavern.error = Some(e.to_string());
                }
            }
        }
    }
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> io::Result<AppExit> {
    let mut pending_evaluation = false;

    loop {
        app.refresh_view();

        terminal.draw(|f| render(f, &app))?;

        // Ask for the judgement with a frame already on screen, then
        // block on the answer. The stream is idle while judging.
        if pending_evaluation {
            pending_evaluation = false;
            app.set_status("The teller weighs your run...");
            terminal.draw(|f| render(f, &app))?;
            app.run_evaluation().await;
            continue;
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            match handle_event(&mut app, ev) {
                EventResult::Quit => return Ok(AppExit::Quit),
                EventResult::NewEvening => {
                    app.reset_evening();
                    return Ok(AppExit::NewEvening);
                }
                EventResult::Evaluate => {
                    pending_evaluation = true;
                }
                EventResult::NeedsRedraw | EventResult::Continue => {}
            }
        } else {
            app.tick();
        }
    }
}

fn narrator_from(settings: &AppSettings) -> Arc<dyn Narrator> {
    if !settings.narration_enabled {
        return Arc::new(NullNarrator);
    }
    match &settings.narrator_command {
        Some(command) => Arc::new(CommandNarrator::with_command(command)),
        None => Arc::new(CommandNarrator::new()),
    }
}

fn print_help() {
    println!("Fireside - an evening of streamed storytelling at the Wanderer's Inn");
    println!();
    println!("USAGE:");
    println!("  fireside [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help       Show this help message");
    println!("  --headless       Run in headless mode (text-only, no TUI)");
    println!();
    println!("HEADLESS OPTIONS (only with --headless):");
    println!("  --persona <NAME>   Teller: knight, stranger, drifter (default: knight)");
    println!("  --topic <TOPIC>    Open the tale on this topic immediately");
    println!("  --host <URL>       Ollama host (default: OLLAMA_HOST or http://localhost:11434)");
    println!("  --model <MODEL>    Ollama model (default: OLLAMA_MODEL or llama3.2)");
    println!();
    println!("ENVIRONMENT:");
    println!("  OLLAMA_HOST          Ollama server address");
    println!("  OLLAMA_MODEL         Model used for storytelling");
    println!("  UNSPLASH_ACCESS_KEY  Enables scene photos (optional)");
    println!();
    println!("EXAMPLES:");
    println!("  fireside                                   # Interactive TUI mode");
    println!("  fireside --headless                        # Headless with defaults");
    println!("  fireside --headless --persona drifter --topic \"a locked door\"");
}
