//! Parsing helpers for AI backend responses
//!
//! Models often wrap JSON in prose or code fences, and number their lists in
//! a variety of ways.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

use super::types::StageReply;

/// Shorten text for log and error messages without splitting a character
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Slice out the outermost `{...}` in a response
fn json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parse the structured stage answer from a model response
pub fn parse_stage_reply(response: &str) -> Result<StageReply> {
    let response = response.trim();

    match json_object(response) {
        Some(json_str) => serde_json::from_str(json_str).map_err(|e| {
            Error::InvalidData(format!(
                "Invalid JSON from AI: {} | Raw: {}",
                e,
                truncate(json_str, 200)
            ))
        }),
        None => Err(Error::InvalidData(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))),
    }
}

fn numbering() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "1." / "2)" with optional whitespace after
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s*").expect("valid numbering regex"))
}

/// Pull up to three advice items out of free-form model output
///
/// Uses the first non-empty lines with bullets and numbering stripped. Only
/// when no line survives cleaning does it fall back to splitting on `.`.
pub fn extract_top_advices(text: &str) -> Vec<String> {
    let from_lines: Vec<String> = text
        .lines()
        .map(|line| line.trim_matches(|c| c == ' ' || c == '-' || c == '*' || c == '\t'))
        .map(|line| numbering().replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(3)
        .collect();

    if !from_lines.is_empty() {
        return from_lines;
    }

    text.split('.')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(3)
        .collect()
}
