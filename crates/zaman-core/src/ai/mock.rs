//! Mock backend for testing
//!
//! Replies come from a scripted queue; every chat request is recorded so
//! tests can inspect the prompts that were sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::ChatMessage;
use super::AIBackend;

/// Reply used once the scripted queue is empty
const DEFAULT_REPLY: &str = r#"{"reply": "Расскажите, на что вы хотите накопить?", "stage_complete": false}"#;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// When set, chat and transcribe fail like an unreachable upstream
    pub failing: bool,
    /// Text returned by `transcribe`
    pub transcript: String,
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            failing: false,
            transcript: "Хочу накопить на квартиру".to_string(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Create a backend whose calls all fail
    pub fn failing() -> Self {
        Self {
            healthy: false,
            failing: true,
            ..Self::new()
        }
    }

    /// Create a backend that answers with `replies` in order
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for reply in replies {
            backend.push_reply(reply);
        }
        backend
    }

    /// Queue another reply
    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(reply.into());
        }
    }

    /// Every chat request received so far
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        if self.failing {
            return Err(Error::Ai("mock backend unavailable".to_string()));
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        Ok(next.unwrap_or_else(|| DEFAULT_REPLY.to_string()))
    }

    async fn transcribe(&self, audio: Vec<u8>, _filename: &str) -> Result<String> {
        if self.failing {
            return Err(Error::Ai("mock backend unavailable".to_string()));
        }
        if audio.is_empty() {
            return Err(Error::InvalidData("Empty audio file".to_string()));
        }
        Ok(self.transcript.clone())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
