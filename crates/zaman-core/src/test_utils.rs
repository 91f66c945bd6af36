//! Test utilities for zaman-core
//!
//! A mock OpenAI-compatible server for integration tests of the HTTP
//! backend and of anything that drives it.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Default)]
struct MockState {
    failing: bool,
    replies: Mutex<VecDeque<String>>,
    last_chat_request: Mutex<Option<Value>>,
    last_litellm_key: Mutex<Option<String>>,
}

/// Mock OpenAI-compatible server
pub struct MockOpenAIServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOpenAIServer {
    /// Text returned by the transcription endpoint
    pub const TRANSCRIPT: &'static str = "Хочу накопить на квартиру";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(MockState::default()).await
    }

    /// Start a server whose completion and transcription endpoints return 500
    pub async fn start_failing() -> Self {
        Self::start_with(MockState {
            failing: true,
            ..Default::default()
        })
        .await
    }

    async fn start_with(state: MockState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .route("/v1/audio/transcriptions", post(handle_transcription))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue the content of the next chat completion
    pub fn push_reply(&self, reply: &str) {
        self.state
            .replies
            .lock()
            .unwrap()
            .push_back(reply.to_string());
    }

    /// Body of the most recent chat completion request
    pub fn last_chat_request(&self) -> Option<Value> {
        self.state.last_chat_request.lock().unwrap().clone()
    }

    /// `x-litellm-api-key` header of the most recent chat request
    pub fn last_litellm_key(&self) -> Option<String> {
        self.state.last_litellm_key.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOpenAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "gpt-4o-mini", "object": "model"}]
    }))
}

async fn handle_chat(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> impl IntoResponse {
    if state.failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "upstream down"}})),
        );
    }

    *state.last_litellm_key.lock().unwrap() = headers
        .get("x-litellm-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *state.last_chat_request.lock().unwrap() = Some(request);

    let content = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| r#"{"reply": "Чем могу помочь?", "stage_complete": false}"#.to_string());

    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })),
    )
}

async fn handle_transcription(
    State(state): State<Arc<MockState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if state.failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"message": "upstream down"}})),
        );
    }

    let mut has_file = false;
    let mut has_model = false;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => has_file = field.bytes().await.map(|b| !b.is_empty()).unwrap_or(false),
            Some("model") => has_model = true,
            _ => {}
        }
    }

    if !has_file || !has_model {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "file and model are required"}})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({"text": MockOpenAIServer::TRANSCRIPT})),
    )
}
