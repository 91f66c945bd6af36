//! OpenAI-compatible backend implementation
//!
//! Works with OpenAI itself and with any proxy or server implementing the
//! `/v1/chat/completions` and `/v1/audio/transcriptions` endpoints (LiteLLM,
//! vLLM, LocalAI).
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Chat model (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_STT_MODEL`: Transcription model (default: whisper-1)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `LITELLM_API_KEY`: LiteLLM proxy key (optional)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::types::ChatMessage;
use super::AIBackend;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Generous upper bound; transcription of long recordings is slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    stt_model: String,
    api_key: Option<String>,
    litellm_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            stt_model: DEFAULT_STT_MODEL.to_string(),
            api_key: None,
            litellm_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Add a LiteLLM proxy key, sent as `x-litellm-api-key`
    pub fn with_litellm_key(mut self, key: &str) -> Self {
        self.litellm_key = Some(key.to_string());
        self
    }

    /// Use a different transcription model
    pub fn with_stt_model(mut self, model: &str) -> Self {
        self.stt_model = model.to_string();
        self
    }

    /// Create from environment variables
    ///
    /// Returns None when `OPENAI_COMPATIBLE_HOST` is unset.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        backend.litellm_key = std::env::var("LITELLM_API_KEY").ok();
        if let Ok(stt) = std::env::var("OPENAI_COMPATIBLE_STT_MODEL") {
            backend.stt_model = stt;
        }
        Some(backend)
    }

    /// Attach the configured auth headers
    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Some(ref key) = self.litellm_key {
            req = req.header("x-litellm-api-key", key);
        }
        req
    }

    /// Turn a non-2xx response into an error carrying the body
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "AI API returned an error");
        Err(Error::Ai(format!("API error {}: {}", status, body)))
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// Chat completion choice
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Chat response message
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Transcription response
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            stream: false,
        };

        debug!(model = %self.model, messages = messages.len(), "Sending chat completion");

        let req = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);
        let response = Self::check_status(self.authorize(req).send().await?).await?;

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Ai("No response from chat completion API".into()))
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        if audio.is_empty() {
            return Err(Error::InvalidData("Empty audio file".to_string()));
        }

        debug!(model = %self.stt_model, bytes = audio.len(), "Sending transcription");

        let form = multipart::Form::new()
            .part(
                "file",
                multipart::Part::bytes(audio).file_name(filename.to_string()),
            )
            .text("model", self.stt_model.clone());

        let req = self
            .http_client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form);
        let response = Self::check_status(self.authorize(req).send().await?).await?;

        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text)
    }

    async fn health_check(&self) -> bool {
        let req = self
            .http_client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(Duration::from_secs(5));

        match self.authorize(req).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "AI health check failed");
                false
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockOpenAIServer;

    #[test]
    fn test_chat_request_serialization() {
        let messages = [ChatMessage::system("Ты ассистент"), ChatMessage::user("Привет")];
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: 0.7,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Привет");
        assert!((json["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = OpenAICompatibleBackend::new("http://localhost:4000/", "gpt-4o-mini");
        assert_eq!(backend.host(), "http://localhost:4000");
        assert_eq!(backend.model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://127.0.0.1:1", "gpt-4o-mini");
        assert!(!backend.health_check().await);
    }

    #[tokio::test]
    async fn test_chat_against_mock_server() {
        let server = MockOpenAIServer::start().await;
        server.push_reply("Здравствуйте!");

        let backend = OpenAICompatibleBackend::with_api_key(&server.url(), "gpt-4o-mini", "sk-test")
            .with_litellm_key("lite");
        assert!(backend.health_check().await);

        let reply = backend
            .chat(&[ChatMessage::user("Привет")], 0.7)
            .await
            .unwrap();
        assert_eq!(reply, "Здравствуйте!");

        let seen = server.last_chat_request().unwrap();
        assert_eq!(seen["model"], "gpt-4o-mini");
        assert_eq!(seen["messages"][0]["content"], "Привет");
        assert_eq!(server.last_litellm_key().as_deref(), Some("lite"));
    }

    #[tokio::test]
    async fn test_transcribe_against_mock_server() {
        let server = MockOpenAIServer::start().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4o-mini");

        let text = backend
            .transcribe(b"RIFF....WAVE".to_vec(), "voice.wav")
            .await
            .unwrap();
        assert_eq!(text, MockOpenAIServer::TRANSCRIPT);
    }

    #[tokio::test]
    async fn test_upstream_error_is_ai_error() {
        let server = MockOpenAIServer::start_failing().await;
        let backend = OpenAICompatibleBackend::new(&server.url(), "gpt-4o-mini");

        let err = backend
            .chat(&[ChatMessage::user("Привет")], 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ai(_)));
    }
}
