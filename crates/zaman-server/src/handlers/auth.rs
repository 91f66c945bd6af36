//! Signup, login and session handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{current_user, read_json, AccessToken, AppError, AppState, CurrentUser};
use zaman_core::auth::{hash_password, verify_password, MIN_PASSWORD_LEN};

/// Request body for signup
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for the health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai_configured: bool,
}

/// GET /api/health - Liveness probe
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_configured: state.ai.is_some(),
    })
}

/// POST /api/auth/signup - Register and receive an access token
pub async fn signup(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AccessToken>, AppError> {
    let req: SignupRequest = read_json(request).await?;

    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("Username is required"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("A valid email is required"));
    }
    if req.password.is_empty() {
        return Err(AppError::bad_request("Password is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(&format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state
        .db
        .create_user(username, email, &password_hash, state.config.opening_balance)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&user.username, "signup", Some("user"), Some(user.id), None)?;

    info!(user_id = user.id, "User signed up");
    Ok(Json(state.tokens.issue(&user.username)?))
}

/// POST /api/auth/login - Exchange credentials for an access token
pub async fn login(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AccessToken>, AppError> {
    let req: LoginRequest = read_json(request).await?;

    let credentials = state.db.get_user_credentials(req.username.trim())?;
    let Some(credentials) = credentials.filter(|c| verify_password(&req.password, &c.password_hash))
    else {
        warn!("Failed login attempt");
        return Err(AppError::unauthorized("Invalid credentials"));
    };

    state.db.log_audit(
        &credentials.username,
        "login",
        Some("user"),
        Some(credentials.id),
        None,
    )?;

    Ok(Json(state.tokens.issue(&credentials.username)?))
}

/// GET /api/users/me - The authenticated user
pub async fn get_me(request: Request) -> Result<Json<CurrentUser>, AppError> {
    Ok(Json(current_user(&request)?))
}
