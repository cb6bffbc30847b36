//! Incremental extraction of structured turn output.
//!
//! The chat stream delivers token deltas of one JSON document shaped by
//! [`story_turn_schema`]. The UI and narration want the full story text so
//! far on every tick, long before the document closes. [`TurnExtractor`]
//! keeps the raw text and re-reads it after each delta with a small
//! escape-aware scanner: the `story` string is decoded as far as it has
//! arrived, and only fully terminated elements of the `options` array are
//! reported. A strict decode at the end validates the finished document.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::turn::TurnPartial;

/// The document the model produces each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryTurn {
    pub story: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// JSON schema for [`StoryTurn`], sent as the request `format`.
pub fn story_turn_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "story": {
                "type": "string",
                "description": "The next passage of the story, in the narrator's voice."
            },
            "options": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Two to four short choices for what the listener does next."
            }
        },
        "required": ["story", "options"]
    })
}

/// Accumulates raw model output and produces full-so-far snapshots.
#[derive(Debug, Default)]
pub struct TurnExtractor {
    buf: String,
}

impl TurnExtractor {
    pub fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Append a delta and re-read the document so far.
    pub fn push(&mut self, chunk: &str) -> TurnPartial {
        self.buf.push_str(chunk);
        self.snapshot()
    }

    /// Read the current buffer without appending.
    pub fn snapshot(&self) -> TurnPartial {
        scan_document(&self.buf)
    }

    /// The raw accumulated document text.
    pub fn raw(&self) -> &str {
        &self.buf
    }

    /// Drop everything, ready for the next round.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Strict decode of the finished document.
    pub fn finish(&self) -> Result<StoryTurn, serde_json::Error> {
        serde_json::from_str(self.buf.trim())
    }
}

/// Best-effort read of a possibly unfinished `StoryTurn` document.
///
/// Unknown keys are skipped (string-aware, so braces inside story text do
/// not confuse the scan). The scan stops at the first value the buffer
/// cuts off mid-way; everything decoded before that point stands.
fn scan_document(raw: &str) -> TurnPartial {
    let mut partial = TurnPartial::default();

    // The document starts at the first brace; anything before it is noise.
    let Some(start) = raw.find('{') else {
        return partial;
    };
    let mut s = Scanner::new(&raw[start..]);
    s.bump();

    loop {
        s.skip_ws();
        match s.peek() {
            None | Some('}') => break,
            Some(',') => {
                s.bump();
                continue;
            }
            Some('"') => {}
            Some(_) => break,
        }
        s.bump();
        let key = s.scan_string();
        if !key.terminated {
            break;
        }
        s.skip_ws();
        if !s.eat(':') {
            // The colon has not arrived yet.
            break;
        }
        s.skip_ws();
        match s.peek() {
            Some('"') => {
                s.bump();
                let value = s.scan_string();
                if key.value == "story" {
                    partial.story = Some(value.value);
                }
                if !value.terminated {
                    break;
                }
            }
            Some('[') => {
                s.bump();
                let (items, complete) = s.scan_string_array();
                if key.value == "options" {
                    partial.options = Some(items);
                }
                if !complete {
                    break;
                }
            }
            Some('{') => {
                if !s.skip_compound() {
                    break;
                }
            }
            Some(_) => {
                if !s.skip_scalar() {
                    break;
                }
            }
            None => break,
        }
    }

    partial
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

struct StringScan {
    value: String,
    terminated: bool,
}

enum Escaped {
    Char(char),
    /// The escape sequence runs past the end of the buffer.
    Incomplete,
    /// The escape sequence can never become valid.
    Invalid,
}

enum Hex4 {
    Value(u32),
    Short,
    Bad,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn bump(&mut self) {
        self.chars.next();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Decode a string body, the opening quote already consumed.
    ///
    /// An incomplete trailing escape is held back entirely rather than
    /// emitted half-decoded; the next delta completes it.
    fn scan_string(&mut self) -> StringScan {
        let mut value = String::new();
        loop {
            match self.next() {
                None => {
                    return StringScan {
                        value,
                        terminated: false,
                    }
                }
                Some('"') => {
                    return StringScan {
                        value,
                        terminated: true,
                    }
                }
                Some('\\') => match self.decode_escape() {
                    Escaped::Char(c) => value.push(c),
                    Escaped::Incomplete => {
                        return StringScan {
                            value,
                            terminated: false,
                        }
                    }
                    Escaped::Invalid => value.push(char::REPLACEMENT_CHARACTER),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn decode_escape(&mut self) -> Escaped {
        let Some(c) = self.next() else {
            return Escaped::Incomplete;
        };
        match c {
            '"' => Escaped::Char('"'),
            '\\' => Escaped::Char('\\'),
            '/' => Escaped::Char('/'),
            'b' => Escaped::Char('\u{0008}'),
            'f' => Escaped::Char('\u{000C}'),
            'n' => Escaped::Char('\n'),
            'r' => Escaped::Char('\r'),
            't' => Escaped::Char('\t'),
            'u' => self.decode_unicode_escape(),
            _ => Escaped::Invalid,
        }
    }

    fn decode_unicode_escape(&mut self) -> Escaped {
        let first = match self.hex4() {
            Hex4::Value(v) => v,
            Hex4::Short => return Escaped::Incomplete,
            Hex4::Bad => return Escaped::Invalid,
        };
        if (0xD800..=0xDBFF).contains(&first) {
            // A high surrogate is only meaningful with its partner; hold
            // the whole pair back until both units have arrived.
            if !self.eat('\\') {
                return if self.peek().is_none() {
                    Escaped::Incomplete
                } else {
                    Escaped::Invalid
                };
            }
            if !self.eat('u') {
                return if self.peek().is_none() {
                    Escaped::Incomplete
                } else {
                    Escaped::Invalid
                };
            }
            let second = match self.hex4() {
                Hex4::Value(v) => v,
                Hex4::Short => return Escaped::Incomplete,
                Hex4::Bad => return Escaped::Invalid,
            };
            if !(0xDC00..=0xDFFF).contains(&second) {
                return Escaped::Invalid;
            }
            let code = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
            match char::from_u32(code) {
                Some(c) => Escaped::Char(c),
                None => Escaped::Invalid,
            }
        } else {
            match char::from_u32(first) {
                Some(c) => Escaped::Char(c),
                None => Escaped::Invalid,
            }
        }
    }

    fn hex4(&mut self) -> Hex4 {
        let mut code = 0u32;
        for _ in 0..4 {
            match self.next() {
                None => return Hex4::Short,
                Some(c) => match c.to_digit(16) {
                    Some(d) => code = code * 16 + d,
                    None => return Hex4::Bad,
                },
            }
        }
        Hex4::Value(code)
    }

    /// Collect terminated string elements of an array, skipping values of
    /// other types. Returns the elements and whether the closing bracket
    /// was seen.
    fn scan_string_array(&mut self) -> (Vec<String>, bool) {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return (items, false),
                Some(']') => {
                    self.bump();
                    return (items, true);
                }
                Some(',') => {
                    self.bump();
                }
                Some('"') => {
                    self.bump();
                    let s = self.scan_string();
                    if s.terminated {
                        items.push(s.value);
                    } else {
                        return (items, false);
                    }
                }
                Some('{') | Some('[') => {
                    if !self.skip_compound() {
                        return (items, false);
                    }
                }
                Some(_) => {
                    if !self.skip_scalar() {
                        return (items, false);
                    }
                }
            }
        }
    }

    /// Skip a balanced object or array, strings respected. Returns false
    /// if the buffer ends first.
    fn skip_compound(&mut self) -> bool {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => return false,
                Some('{') | Some('[') => {
                    depth += 1;
                    self.bump();
                }
                Some('}') | Some(']') => {
                    depth = depth.saturating_sub(1);
                    self.bump();
                    if depth == 0 {
                        return true;
                    }
                }
                Some('"') => {
                    self.bump();
                    if !self.scan_string().terminated {
                        return false;
                    }
                }
                Some(_) => self.bump(),
            }
        }
    }

    /// Skip a bare scalar (number, true, false, null). Returns false if
    /// the buffer ends before a delimiter does, since the scalar might
    /// still be growing.
    fn skip_scalar(&mut self) -> bool {
        loop {
            match self.peek() {
                None => return false,
                Some(c) if c == ',' || c == '}' || c == ']' || c.is_whitespace() => return true,
                Some(_) => self.bump(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(raw: &str) -> TurnPartial {
        scan_document(raw)
    }

    #[test]
    fn test_empty_buffer_yields_nothing() {
        let partial = scan("");
        assert_eq!(partial.story, None);
        assert_eq!(partial.options, None);
    }

    #[test]
    fn test_story_grows_across_pushes() {
        let mut extractor = TurnExtractor::new();
        let p1 = extractor.push("{\"story\": \"Once upo");
        assert_eq!(p1.story.as_deref(), Some("Once upo"));

        let p2 = extractor.push("n a time");
        assert_eq!(p2.story.as_deref(), Some("Once upon a time"));

        let p3 = extractor.push(".\", \"options\": [\"Go on\"]}");
        assert_eq!(p3.story.as_deref(), Some("Once upon a time."));
        assert_eq!(p3.options, Some(vec!["Go on".to_string()]));
    }

    #[test]
    fn test_escapes_decoded() {
        let partial = scan("{\"story\": \"Line one.\\nShe said \\\"run\\\".");
        assert_eq!(partial.story.as_deref(), Some("Line one.\nShe said \"run\"."));
    }

    #[test]
    fn test_incomplete_escape_held_back() {
        let partial = scan("{\"story\": \"wait\\");
        assert_eq!(partial.story.as_deref(), Some("wait"));

        let partial = scan("{\"story\": \"wait\\n");
        assert_eq!(partial.story.as_deref(), Some("wait\n"));
    }

    #[test]
    fn test_unicode_escape_split_across_pushes() {
        let mut extractor = TurnExtractor::new();
        let p1 = extractor.push("{\"story\": \"caf\\u00e");
        assert_eq!(p1.story.as_deref(), Some("caf"));

        let p2 = extractor.push("9!\"}");
        assert_eq!(p2.story.as_deref(), Some("café!"));
    }

    #[test]
    fn test_surrogate_pair_held_until_complete() {
        let mut extractor = TurnExtractor::new();
        let p1 = extractor.push("{\"story\": \"magic \\ud83d");
        assert_eq!(p1.story.as_deref(), Some("magic "));

        let p2 = extractor.push("\\ude00 end\"}");
        assert_eq!(p2.story.as_deref(), Some("magic 😀 end"));
    }

    #[test]
    fn test_only_complete_options_reported() {
        let partial = scan("{\"story\": \"S.\", \"options\": [\"Fight\", \"Fle");
        assert_eq!(partial.options, Some(vec!["Fight".to_string()]));

        let partial = scan("{\"story\": \"S.\", \"options\": [\"Fight\", \"Flee\"]}");
        assert_eq!(
            partial.options,
            Some(vec!["Fight".to_string(), "Flee".to_string()])
        );
    }

    #[test]
    fn test_options_before_story() {
        let partial = scan("{\"options\": [\"A\", \"B\"], \"story\": \"tale");
        assert_eq!(partial.options, Some(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(partial.story.as_deref(), Some("tale"));
    }

    #[test]
    fn test_unknown_keys_skipped() {
        let partial = scan("{\"mood\": \"grim\", \"depth\": 3, \"story\": \"He knocked.\"}");
        assert_eq!(partial.story.as_deref(), Some("He knocked."));
    }

    #[test]
    fn test_braces_inside_story_text() {
        let partial = scan("{\"story\": \"a map {x: 1} of sorts\", \"options\": []}");
        assert_eq!(partial.story.as_deref(), Some("a map {x: 1} of sorts"));
        assert_eq!(partial.options, Some(Vec::new()));
    }

    #[test]
    fn test_nested_object_value_skipped() {
        let partial = scan("{\"meta\": {\"inner\": [1, 2]}, \"story\": \"on we go");
        assert_eq!(partial.story.as_deref(), Some("on we go"));
    }

    #[test]
    fn test_noise_before_document_ignored() {
        let partial = scan("json\n{\"story\": \"clean\"}");
        assert_eq!(partial.story.as_deref(), Some("clean"));
    }

    #[test]
    fn test_finish_strict_decode() {
        let mut extractor = TurnExtractor::new();
        extractor.push("{\"story\": \"Done.\", \"options\": [\"More\"]}");
        let turn = extractor.finish().unwrap();
        assert_eq!(turn.story, "Done.");
        assert_eq!(turn.options, vec!["More".to_string()]);
    }

    #[test]
    fn test_finish_rejects_truncated_document() {
        let mut extractor = TurnExtractor::new();
        extractor.push("{\"story\": \"Done.\", \"opti");
        assert!(extractor.finish().is_err());
    }

    #[test]
    fn test_clear_resets_buffer() {
        let mut extractor = TurnExtractor::new();
        extractor.push("{\"story\": \"round one\"}");
        extractor.clear();
        assert_eq!(extractor.raw(), "");
        assert_eq!(extractor.snapshot().story, None);
    }

    #[test]
    fn test_schema_names_both_fields() {
        let schema = story_turn_schema();
        assert!(schema["properties"]["story"].is_object());
        assert!(schema["properties"]["options"].is_object());
        assert_eq!(schema["required"][0], "story");
    }
}
