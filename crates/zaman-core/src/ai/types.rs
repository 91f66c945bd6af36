//! AI backend request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Deserializer, Serialize};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// One message in a chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Structured answer the assistant is asked to produce at each stage
///
/// Every field is optional: models routinely omit keys or send numbers as
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StageReply {
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub stage_complete: bool,
    #[serde(default)]
    pub goal_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub goal_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timeline: Option<i64>,
    #[serde(default)]
    pub products: Option<Vec<String>>,
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse().ok()
        }
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.filter(|v| v.is_finite()))
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|v| v.is_finite())
        .map(|v| v.round() as i64))
}
