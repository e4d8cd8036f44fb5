//! Structured reply parsing
//!
//! Turns raw model text into a [`StructuredReply`]. The model is asked for
//! JSON but may wrap it in a markdown fence, use an older field name, or
//! ignore the format entirely. Parsing never fails: anything that is not a
//! usable JSON reply becomes the plain-text response.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Canonical field names of the reply schema
pub const RESPONSE_FIELD: &str = "response";
pub const FEEDBACK_FIELD: &str = "feedback";
pub const SUGGESTIONS_FIELD: &str = "suggestions";
pub const SCORE_FIELD: &str = "pronunciationScore";

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^```(?P<tag>[A-Za-z0-9_+.-]*)[ \t]*(?P<newline>\r?\n)?").unwrap()
});

static CLOSING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\r?\n?[ \t]*```[ \t]*$").unwrap()
});

/// The normalized reply record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReply {
    pub response: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, rename = "pronunciationScore")]
    pub pronunciation_score: u8,
}

impl StructuredReply {
    /// Reply with only a response and every other field at its default
    pub fn plain(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }
}

/// Alternate field names accepted for each canonical field.
///
/// The canonical name always wins when both are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAliases {
    #[serde(default = "default_response_aliases")]
    pub response: Vec<String>,
    #[serde(default = "default_feedback_aliases")]
    pub feedback: Vec<String>,
    #[serde(default = "default_suggestions_aliases")]
    pub suggestions: Vec<String>,
    #[serde(default = "default_score_aliases")]
    pub pronunciation_score: Vec<String>,
}

fn default_response_aliases() -> Vec<String> {
    vec!["reply".to_string(), "message".to_string()]
}

fn default_feedback_aliases() -> Vec<String> {
    vec!["correction".to_string(), "adjust".to_string()]
}

fn default_suggestions_aliases() -> Vec<String> {
    vec!["alternatives".to_string()]
}

fn default_score_aliases() -> Vec<String> {
    vec!["pronunciation_score".to_string(), "score".to_string()]
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            response: default_response_aliases(),
            feedback: default_feedback_aliases(),
            suggestions: default_suggestions_aliases(),
            pronunciation_score: default_score_aliases(),
        }
    }
}

impl FieldAliases {
    /// No aliases: only canonical names are recognized
    pub fn none() -> Self {
        Self {
            response: Vec::new(),
            feedback: Vec::new(),
            suggestions: Vec::new(),
            pronunciation_score: Vec::new(),
        }
    }
}

/// Parser for raw model replies
#[derive(Debug, Clone, Default)]
pub struct ReplyParser {
    aliases: FieldAliases,
}

impl ReplyParser {
    pub fn new(aliases: FieldAliases) -> Self {
        Self { aliases }
    }

    /// Parse raw model text. Never fails.
    pub fn parse(&self, raw: &str) -> StructuredReply {
        let cleaned = strip_code_fence(raw);

        match serde_json::from_str::<Value>(cleaned) {
            Ok(Value::Object(map)) => match self.from_object(&map) {
                Some(reply) => reply,
                None => {
                    debug!("Reply JSON has no response field, using raw text");
                    StructuredReply::plain(cleaned)
                }
            },
            Ok(Value::String(text)) => StructuredReply::plain(text),
            Ok(_) => StructuredReply::plain(cleaned),
            Err(e) => {
                debug!("Reply is not JSON ({}), using raw text", e);
                StructuredReply::plain(cleaned)
            }
        }
    }

    fn from_object(&self, map: &Map<String, Value>) -> Option<StructuredReply> {
        let response = lookup(map, RESPONSE_FIELD, &self.aliases.response)
            .and_then(Value::as_str)?
            .to_string();

        let feedback = lookup(map, FEEDBACK_FIELD, &self.aliases.feedback)
            .map(value_to_text)
            .unwrap_or_default();

        let suggestions = lookup(map, SUGGESTIONS_FIELD, &self.aliases.suggestions)
            .map(value_to_list)
            .unwrap_or_default();

        let pronunciation_score = lookup(map, SCORE_FIELD, &self.aliases.pronunciation_score)
            .map(value_to_score)
            .unwrap_or(0);

        Some(StructuredReply {
            response,
            feedback,
            suggestions,
            pronunciation_score,
        })
    }
}

/// Parse with the default aliases
pub fn parse_reply(raw: &str) -> StructuredReply {
    ReplyParser::default().parse(raw)
}

/// Remove a surrounding markdown code fence, whatever its language tag.
///
/// A word right after the backticks is only a language tag when a line break
/// follows it, or when the fenced body starts on the same line with `{` or `[`.
/// Otherwise it is the first word of the fenced text and is kept.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let start = match OPENING_FENCE.captures(trimmed) {
        Some(caps) => {
            let end = caps.get(0).map_or(3, |m| m.end());
            let has_tag = caps.name("tag").is_some_and(|t| !t.as_str().is_empty());
            let inline_json = trimmed[end..].starts_with(['{', '[']);
            if caps.name("newline").is_some() || !has_tag || inline_json {
                end
            } else {
                3
            }
        }
        None => 0,
    };
    let body = &trimmed[start..];
    let end = CLOSING_FENCE.find(body).map(|m| m.start()).unwrap_or(body.len());
    body[..end].trim()
}

fn lookup<'a>(map: &'a Map<String, Value>, canonical: &str, aliases: &[String]) -> Option<&'a Value> {
    let present = |name: &str| map.get(name).filter(|v| !v.is_null());
    present(canonical).or_else(|| aliases.iter().find_map(|alias| present(alias.as_str())))
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn value_to_score(value: &Value) -> u8 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };

    match number {
        Some(n) if n.is_finite() => n.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}
