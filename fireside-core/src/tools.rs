//! Tools the storyteller model can call mid-turn.
//!
//! Tool results are plain strings fed straight back into the
//! conversation as tool messages. `present_options` is the exception:
//! it also routes the choice list to the turn controller through the
//! [`OptionRelay`] issued for the current turn.

use rand::Rng;
use serde_json::{json, Value};

use crate::turn::OptionRelay;

const MIN_DICE_SIDES: u64 = 4;
const MAX_DICE_SIDES: u64 = 100;
const MAX_DICE_COUNT: u64 = 10;

/// Collection of tools offered to the storyteller model.
pub struct StoryTools;

impl StoryTools {
    /// All tool definitions for the chat API.
    pub fn all() -> Vec<ollama::Tool> {
        vec![
            Self::roll_dice(),
            Self::current_context(),
            Self::present_options(),
        ]
    }

    fn roll_dice() -> ollama::Tool {
        ollama::Tool::function(
            "roll_dice",
            "Roll dice to decide an uncertain outcome in the story. Use this for \
             fights, escapes, games of chance, or anything fate should settle.",
            json!({
                "type": "object",
                "properties": {
                    "sides": {
                        "type": "integer",
                        "minimum": MIN_DICE_SIDES,
                        "maximum": MAX_DICE_SIDES,
                        "description": "Number of sides on each die (default 20)"
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_DICE_COUNT,
                        "description": "How many dice to roll (default 1)"
                    }
                },
                "required": []
            }),
        )
    }

    fn current_context() -> ollama::Tool {
        ollama::Tool::function(
            "current_context",
            "Look up the listener's real-world moment: the local time of day and \
             the day of the week. Use this to colour the telling, e.g. a quieter \
             tone late at night.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    fn present_options() -> ollama::Tool {
        ollama::Tool::function(
            "present_options",
            "Offer the player their next choices. Provide two to four short, \
             distinct actions written in the second person.",
            json!({
                "type": "object",
                "properties": {
                    "options": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 2,
                        "maxItems": 4,
                        "description": "The choices to show the player"
                    }
                },
                "required": ["options"]
            }),
        )
    }
}

/// Execute a tool call and return the result text for the conversation.
///
/// Invalid arguments produce an explanatory string rather than an error
/// so the model can correct itself on the next round.
pub fn execute_tool(name: &str, arguments: &Value, relay: &OptionRelay) -> String {
    match name {
        "roll_dice" => roll_dice(arguments),
        "current_context" => current_context(),
        "present_options" => present_options(arguments, relay),
        _ => format!("Unknown tool: {}", name),
    }
}

fn roll_dice(arguments: &Value) -> String {
    let sides = arguments["sides"]
        .as_u64()
        .unwrap_or(20)
        .clamp(MIN_DICE_SIDES, MAX_DICE_SIDES) as u32;
    let count = arguments["count"].as_u64().unwrap_or(1).clamp(1, MAX_DICE_COUNT) as usize;

    let mut rng = rand::thread_rng();
    let rolls: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();
    format_rolls(sides, &rolls)
}

fn format_rolls(sides: u32, rolls: &[u32]) -> String {
    let listed: Vec<String> = rolls.iter().map(|r| r.to_string()).collect();
    if rolls.len() == 1 {
        format!("Rolled 1d{}: {}", sides, listed[0])
    } else {
        let total: u32 = rolls.iter().sum();
        format!(
            "Rolled {}d{}: {} (total {})",
            rolls.len(),
            sides,
            listed.join(", "),
            total
        )
    }
}

fn current_context() -> String {
    use chrono::{Local, Timelike};

    let now = Local::now();
    describe_context(now.hour(), &now.format("%A").to_string())
}

fn describe_context(hour: u32, weekday: &str) -> String {
    format!(
        "It is {} on {}, around {}:00 local time.",
        part_of_day(hour),
        weekday,
        hour
    )
}

fn part_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

fn present_options(arguments: &Value, relay: &OptionRelay) -> String {
    let values = match arguments["options"].as_array() {
        Some(values) => values,
        None => return "present_options requires an 'options' array of strings".to_string(),
    };

    let options: Vec<String> = values
        .iter()
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();

    if options.is_empty() {
        return "No usable options were provided; give two to four short choices".to_string();
    }

    let count = options.len();
    relay.deliver(options);
    format!("Presented {} choices to the player.", count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_all_tools_have_valid_schemas() {
        let tools = StoryTools::all();
        assert_eq!(tools.len(), 3);

        for tool in &tools {
            assert_eq!(tool.r#type, "function");
            assert!(!tool.function.name.is_empty());
            assert!(!tool.function.description.is_empty());
            assert!(
                tool.function.parameters.get("type").is_some(),
                "Tool {} should have a type in its schema",
                tool.function.name
            );
        }
    }

    #[test]
    fn test_present_options_schema_requires_options() {
        let tools = StoryTools::all();
        let tool = tools
            .iter()
            .find(|t| t.function.name == "present_options")
            .unwrap();

        let required = tool.function.parameters["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v.as_str() == Some("options")));
    }

    fn test_relay() -> (OptionRelay, mpsc::UnboundedReceiver<crate::turn::OptionSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (OptionRelay::new(7, tx), rx)
    }

    #[test]
    fn test_roll_dice_respects_limits() {
        let (relay, _rx) = test_relay();

        let result = execute_tool("roll_dice", &json!({"sides": 6, "count": 3}), &relay);
        assert!(result.starts_with("Rolled 3d6:"), "got {result}");
        assert!(result.contains("total"));

        // Out-of-range arguments are clamped, not rejected.
        let result = execute_tool("roll_dice", &json!({"sides": 1000, "count": 99}), &relay);
        assert!(result.starts_with("Rolled 10d100:"), "got {result}");
    }

    #[test]
    fn test_roll_dice_defaults_to_one_d20() {
        let (relay, _rx) = test_relay();
        let result = execute_tool("roll_dice", &json!({}), &relay);
        assert!(result.starts_with("Rolled 1d20:"), "got {result}");
    }

    #[test]
    fn test_format_single_roll_has_no_total() {
        assert_eq!(format_rolls(20, &[14]), "Rolled 1d20: 14");
        assert_eq!(format_rolls(6, &[4, 2, 5]), "Rolled 3d6: 4, 2, 5 (total 11)");
    }

    #[test]
    fn test_part_of_day_boundaries() {
        assert_eq!(part_of_day(0), "night");
        assert_eq!(part_of_day(4), "night");
        assert_eq!(part_of_day(5), "morning");
        assert_eq!(part_of_day(11), "morning");
        assert_eq!(part_of_day(12), "afternoon");
        assert_eq!(part_of_day(16), "afternoon");
        assert_eq!(part_of_day(17), "evening");
        assert_eq!(part_of_day(20), "evening");
        assert_eq!(part_of_day(21), "night");
        assert_eq!(part_of_day(23), "night");
    }

    #[test]
    fn test_describe_context_reads_naturally() {
        let text = describe_context(14, "Saturday");
        assert_eq!(text, "It is afternoon on Saturday, around 14:00 local time.");
    }

    #[test]
    fn test_present_options_delivers_through_relay() {
        let (relay, mut rx) = test_relay();

        let result = execute_tool(
            "present_options",
            &json!({"options": ["Walk north", "  Rest by the fire  ", ""]}),
            &relay,
        );
        assert_eq!(result, "Presented 2 choices to the player.");

        let signal = rx.try_recv().expect("options relayed");
        assert_eq!(signal.epoch, 7);
        assert_eq!(signal.options, vec!["Walk north", "Rest by the fire"]);
    }

    #[test]
    fn test_present_options_rejects_missing_array() {
        let (relay, mut rx) = test_relay();

        let result = execute_tool("present_options", &json!({}), &relay);
        assert!(result.contains("requires"));
        assert!(rx.try_recv().is_err(), "nothing should be relayed");
    }

    #[test]
    fn test_present_options_rejects_all_blank() {
        let (relay, mut rx) = test_relay();

        let result = execute_tool("present_options", &json!({"options": ["", "  "]}), &relay);
        assert!(result.contains("No usable options"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_tool_names_the_tool() {
        let (relay, _rx) = test_relay();
        let result = execute_tool("fly_to_the_moon", &json!({}), &relay);
        assert_eq!(result, "Unknown tool: fly_to_the_moon");
    }
}
