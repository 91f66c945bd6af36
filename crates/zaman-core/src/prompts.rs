//! Prompt Library for the assistant
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in the override dir (~/.local/share/zaman/prompts/)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ChatStage;

/// Environment variable pointing at a prompt override directory
pub const PROMPTS_DIR_ENV: &str = "ZAMAN_PROMPTS_DIR";

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const ASSISTANT: &str = include_str!("../../../prompts/assistant.md");
    pub const STAGE_DISCOVERY: &str = include_str!("../../../prompts/stage_discovery.md");
    pub const STAGE_CLARIFICATION: &str = include_str!("../../../prompts/stage_clarification.md");
    pub const STAGE_RECOMMENDATION: &str =
        include_str!("../../../prompts/stage_recommendation.md");
    pub const STAGE_CONFIRMATION: &str = include_str!("../../../prompts/stage_confirmation.md");
    pub const STAGE_CTA: &str = include_str!("../../../prompts/stage_cta.md");
    pub const FINANCE_ADVICE: &str = include_str!("../../../prompts/finance_advice.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Base persona and answer format
    Assistant,
    StageDiscovery,
    StageClarification,
    StageRecommendation,
    StageConfirmation,
    StageCta,
    /// Three tips from recent transactions
    FinanceAdvice,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::StageDiscovery => "stage_discovery",
            Self::StageClarification => "stage_clarification",
            Self::StageRecommendation => "stage_recommendation",
            Self::StageConfirmation => "stage_confirmation",
            Self::StageCta => "stage_cta",
            Self::FinanceAdvice => "finance_advice",
        }
    }

    /// Get all known prompt IDs
    #[cfg(test)]
    fn all() -> &'static [PromptId] {
        &[
            Self::Assistant,
            Self::StageDiscovery,
            Self::StageClarification,
            Self::StageRecommendation,
            Self::StageConfirmation,
            Self::StageCta,
            Self::FinanceAdvice,
        ]
    }

    /// The instruction prompt for a conversation stage
    pub fn for_stage(stage: ChatStage) -> Self {
        match stage {
            ChatStage::Discovery => Self::StageDiscovery,
            ChatStage::Clarification => Self::StageClarification,
            ChatStage::Recommendation => Self::StageRecommendation,
            ChatStage::Confirmation => Self::StageConfirmation,
            ChatStage::Cta => Self::StageCta,
        }
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::Assistant => defaults::ASSISTANT,
            Self::StageDiscovery => defaults::STAGE_DISCOVERY,
            Self::StageClarification => defaults::STAGE_CLARIFICATION,
            Self::StageRecommendation => defaults::STAGE_RECOMMENDATION,
            Self::StageConfirmation => defaults::STAGE_CONFIRMATION,
            Self::StageCta => defaults::STAGE_CTA,
            Self::FinanceAdvice => defaults::FINANCE_ADVICE,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
}

impl Prompt {
    /// Render the prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        let mut result = self.content.clone();

        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }

        remove_unmatched_conditionals(&result, vars).trim().to_string()
    }
}

/// Prompt library for loading prompts
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Create a prompt library using `ZAMAN_PROMPTS_DIR` or the platform data dir
    pub fn new() -> Self {
        let override_dir = std::env::var(PROMPTS_DIR_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_prompts_dir);
        Self { override_dir }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    /// Load a prompt, checking the override dir first
    pub fn get(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id).filter(|p| p.exists()) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
            });
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
        })
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", id.as_str())))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("zaman").join("prompts"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)?;

    Ok((metadata, body.to_string()))
}

/// Resolve `{{#if var}}...{{/if}}` blocks: keep the body when `var` is non-empty
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = &result[var_start..var_start + var_end];
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_content = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let should_include = vars.get(var_name).is_some_and(|v| !v.is_empty());

        result = if should_include {
            format!(
                "{}{}{}",
                &result[..if_start],
                block_content,
                &result[full_end..]
            )
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}
