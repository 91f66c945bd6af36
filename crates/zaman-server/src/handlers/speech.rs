//! Speech-to-text handler

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde::Serialize;

use crate::{AppError, AppState, CurrentUser, MAX_UPLOAD_SIZE};
use zaman_core::ai::AIBackend;

const DEFAULT_AUDIO_FILENAME: &str = "audio.webm";

/// Transcription result
#[derive(Debug, Serialize)]
pub struct SpeechToTextResponse {
    pub text: String,
}

/// POST /api/speech-to-text - Transcribe an uploaded recording
///
/// Expects multipart form with:
/// - audio_file: audio recording (required, max 10MB)
pub async fn speech_to_text(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<SpeechToTextResponse>, AppError> {
    let ai = state.require_ai()?;

    let mut audio: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != "audio_file" {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_AUDIO_FILENAME)
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|_| AppError::bad_request("Failed to read audio data"))?;

        // Check file size limit
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::bad_request(&format!(
                "File too large. Maximum size is {} MB",
                MAX_UPLOAD_SIZE / 1024 / 1024
            )));
        }

        audio = Some((bytes.to_vec(), filename));
    }

    let (data, filename) = audio.ok_or_else(|| AppError::bad_request("Missing audio_file field"))?;
    if data.is_empty() {
        return Err(AppError::bad_request("Empty audio file"));
    }
    let size = data.len();

    let text = ai
        .transcribe(data, &filename)
        .await
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "transcribe",
        Some("speech"),
        None,
        Some(&format!("bytes={}", size)),
    )?;

    Ok(Json(SpeechToTextResponse { text }))
}
