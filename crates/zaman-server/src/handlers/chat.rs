//! Assistant chat and finance advice handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{current_user, read_json, AppError, AppState};
use zaman_core::advice::{finance_advice as generate_advice, FinanceAdvice};
use zaman_core::models::{ChatRecord, ChatSession};
use zaman_core::{Assistant, ChatReply};

/// Stored turns returned with a session
const SESSION_MESSAGE_LIMIT: i64 = 100;

/// Request body for a chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Session state with its stored turns
#[derive(Debug, Serialize)]
pub struct ChatSessionResponse {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatRecord>,
}

/// POST /api/chat - Send a message to the goal assistant
pub async fn chat(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ChatReply>, AppError> {
    let user = current_user(&request)?;
    let req: ChatRequest = read_json(request).await?;
    let ai = state.require_ai()?;

    let reply = Assistant::new(&state.db, ai, &state.prompts)
        .handle_message(user.id, req.session_id.as_deref(), &req.message)
        .await
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "chat",
        Some("chat_session"),
        None,
        Some(&format!("session={}, stage={}", reply.session_id, reply.stage)),
    )?;

    Ok(Json(reply))
}

/// GET /api/chat/sessions/:session_id - Session state and history
pub async fn get_chat_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    request: Request,
) -> Result<Json<ChatSessionResponse>, AppError> {
    let user = current_user(&request)?;
    let session = state
        .db
        .get_chat_session(user.id, &session_id)?
        .ok_or_else(|| AppError::not_found("Chat session not found"))?;
    let messages = state
        .db
        .recent_chat_messages(session.id, SESSION_MESSAGE_LIMIT)?;

    state.db.log_audit(
        &user.username,
        "view",
        Some("chat_session"),
        Some(session.id),
        None,
    )?;

    Ok(Json(ChatSessionResponse { session, messages }))
}

/// DELETE /api/chat/sessions/:session_id - Forget a conversation
pub async fn delete_chat_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    request: Request,
) -> Result<StatusCode, AppError> {
    let user = current_user(&request)?;

    if !state.db.delete_chat_session(user.id, &session_id)? {
        return Err(AppError::not_found("Chat session not found"));
    }

    state.db.log_audit(
        &user.username,
        "delete",
        Some("chat_session"),
        None,
        Some(&format!("session={}", session_id)),
    )?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/chat/advice - Three tips based on recent transactions
pub async fn finance_advice(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<FinanceAdvice>, AppError> {
    let user = current_user(&request)?;
    let ai = state.require_ai()?;

    let advice = generate_advice(&state.db, ai, &state.prompts, user.id)
        .await
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "advice",
        Some("transaction"),
        None,
        Some(&format!("transactions={}", advice.transactions_count)),
    )?;

    Ok(Json(advice))
}
