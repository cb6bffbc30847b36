//! Headless mode for the fireside teller.
//!
//! A line-oriented interface for running an evening without a TUI.
//! It's designed for scripted smoke runs and agents listening at the
//! inn.

use std::io::{self, BufRead, Write};

use fireside_core::headless::{HeadlessConfig, HeadlessStory, TurnReport};
use fireside_core::Persona;

/// Run an evening in headless mode.
///
/// The protocol is line-oriented:
/// - The first plain line opens the tale as its topic
/// - A bare number takes that option at the fork
/// - Lines starting with `#` are commands (quit, reset, story, status)
/// - Anything else is spoken to the teller as free input
pub async fn run_headless(config: HeadlessConfig, topic: Option<String>) -> io::Result<()> {
    let mut story = HeadlessStory::new(config);

    println!("=== The Wanderer's Inn (headless) ===");
    println!(
        "Teller: {} ({})",
        story.persona().name(),
        story.persona().genre_label()
    );
    println!();
    println!("Commands:");
    println!("  #quit    - Leave the inn");
    println!("  #reset   - Abandon the evening and start fresh");
    println!("  #story   - Reprint the whole story so far");
    println!("  #status  - Show the teller and turn count");
    println!("  #help    - Show this help");
    println!();

    let mut stdout = io::stdout();
    let mut started = false;

    // A topic given on the command line opens the tale immediately
    if let Some(topic) = topic {
        let report = story.begin(&topic).await;
        print_report(&story, report);
        started = true;
    } else {
        println!("Name a topic to begin (or press Enter for the teller's choice):");
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() && started {
            continue;
        }

        // Handle commands
        if line.starts_with('#') {
            let parts: Vec<&str> = line[1..].split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("The fire burns low. Goodnight.");
                    break;
                }
                Some("reset") => {
                    story.reset();
                    started = false;
                    println!("[RESET] The teller clears their throat.");
                    println!("Name a topic to begin:");
                }
                Some("story") => {
                    println!("[STORY]");
                    let full = story.story();
                    if full.is_empty() {
                        println!("(nothing told yet)");
                    } else {
                        println!("{full}");
                    }
                    println!();
                }
                Some("status") => {
                    println!("[STATUS]");
                    println!(
                        "  Teller: {} ({})",
                        story.persona().name(),
                        story.persona().genre_label()
                    );
                    println!("  Turns: {}", story.turn_count());
                    println!("  Options on offer: {}", story.options().len());
                }
                Some("help") => {
                    println!("[HELP]");
                    println!("  #quit    - Leave the inn");
                    println!("  #reset   - Abandon the evening and start fresh");
                    println!("  #story   - Reprint the whole story so far");
                    println!("  #status  - Show the teller and turn count");
                    println!("  #help    - Show this help");
                    println!("  (a bare number takes that fork; anything else is spoken)");
                }
                _ => {
                    println!("[ERROR] Unknown command. Type #help for help.");
                }
            }
            stdout.flush().ok();
            continue;
        }

        print!("[LISTENING]");
        stdout.flush().ok();

        let report = if !started {
            started = true;
            story.begin(line).await
        } else if let Ok(number) = line.parse::<usize>() {
            let picked = match number.checked_sub(1) {
                Some(index) => story.choose(index).await,
                None => None,
            };
            match picked {
                Some(report) => report,
                None => {
                    print!("\r           \r");
                    stdout.flush().ok();
                    println!("[ERROR] No option numbered {number}.");
                    continue;
                }
            }
        } else {
            story.say(line).await
        };

        // Clear the listening indicator
        print!("\r           \r");
        stdout.flush().ok();

        print_report(&story, report);
    }

    Ok(())
}

/// Print what one turn added, then the fork it left behind.
fn print_report(story: &HeadlessStory, report: TurnReport) {
    if let Some(error) = &report.error {
        println!("[ERROR] {error}");
    }

    println!("[TELLER]");
    let added = story.last_story().unwrap_or(&report.story);
    for para in added.trim().split("\n\n") {
        println!("{para}");
    }
    println!();

    if !report.options.is_empty() {
        println!("[FORK]");
        for (i, option) in report.options.iter().enumerate() {
            println!("  {}. {}", i + 1, option);
        }
        println!();
    }
}

/// Parse headless configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> (HeadlessConfig, Option<String>) {
    let mut config = HeadlessConfig::quick_start();
    let mut topic = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--persona" => {
                if let Some(name) = args.get(i + 1) {
                    config.persona = parse_persona(name).unwrap_or(Persona::OldKnight);
                    i += 1;
                }
            }
            "--host" => {
                if let Some(host) = args.get(i + 1) {
                    config.host = Some(host.clone());
                    i += 1;
                }
            }
            "--model" => {
                if let Some(model) = args.get(i + 1) {
                    config.model = Some(model.clone());
                    i += 1;
                }
            }
            "--topic" => {
                if let Some(t) = args.get(i + 1) {
                    topic = Some(t.clone());
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    (config, topic)
}

fn parse_persona(s: &str) -> Option<Persona> {
    match s.to_lowercase().as_str() {
        "knight" | "old-knight" | "oldknight" => Some(Persona::OldKnight),
        "stranger" => Some(Persona::Stranger),
        "drifter" => Some(Persona::Drifter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_persona_and_topic() {
        let (config, topic) = parse_config_from_args(&args(&[
            "fireside",
            "--headless",
            "--persona",
            "drifter",
            "--topic",
            "a locked door",
        ]));
        assert_eq!(config.persona, Persona::Drifter);
        assert_eq!(topic.as_deref(), Some("a locked door"));
    }

    #[test]
    fn test_unknown_persona_falls_back_to_the_knight() {
        let (config, topic) =
            parse_config_from_args(&args(&["fireside", "--persona", "the-landlord"]));
        assert_eq!(config.persona, Persona::OldKnight);
        assert!(topic.is_none());
    }

    #[test]
    fn test_host_and_model_overrides() {
        let (config, _) = parse_config_from_args(&args(&[
            "fireside",
            "--host",
            "http://inn:11434",
            "--model",
            "llama3.2",
        ]));
        assert_eq!(config.host.as_deref(), Some("http://inn:11434"));
        assert_eq!(config.model.as_deref(), Some("llama3.2"));
    }
}
