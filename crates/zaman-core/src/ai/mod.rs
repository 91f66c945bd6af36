//! Pluggable AI backend abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: chat completion and speech transcription
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Chat model (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_STT_MODEL`: Transcription model (default: whisper-1)
//! - `OPENAI_COMPATIBLE_API_KEY`: Bearer key (optional)
//! - `LITELLM_API_KEY`: Sent as `x-litellm-api-key` when routing through LiteLLM (optional)

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all AI backends
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Run a chat completion and return the first choice's text
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;

    /// Transcribe an audio file to text
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the chat model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible backend (OpenAI, LiteLLM proxy, vLLM, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend is not configured.
    pub fn from_env() -> Option<Self> {
        let backend =
            std::env::var("AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "litellm" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to openai_compatible");
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.chat(messages, temperature).await,
            AIClient::Mock(b) => b.chat(messages, temperature).await,
        }
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.transcribe(audio, filename).await,
            AIClient::Mock(b) => b.transcribe(audio, filename).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
