//! Financial aim handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Json,
};

use crate::{current_user, read_json, AppError, AppState};
use zaman_core::models::{FinancialAim, FinancialAimUpdate, NewFinancialAim};

/// GET /api/financial-aims - List the current user's aims
pub async fn list_aims(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<FinancialAim>>, AppError> {
    let user = current_user(&request)?;
    let aims = state.db.list_aims(user.id)?;

    // Audit log - read access
    state.db.log_audit(
        &user.username,
        "list",
        Some("financial_aim"),
        None,
        Some(&format!("count={}", aims.len())),
    )?;

    Ok(Json(aims))
}

/// POST /api/financial-aims - Create an aim
pub async fn create_aim(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<FinancialAim>), AppError> {
    let user = current_user(&request)?;
    let req: NewFinancialAim = read_json(request).await?;

    let aim = state
        .db
        .create_aim(user.id, &req)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "create",
        Some("financial_aim"),
        Some(aim.id),
        Some(&format!("target={:.2}", aim.target_amount)),
    )?;

    Ok((StatusCode::CREATED, Json(aim)))
}

/// GET /api/financial-aims/:id - Get one aim
pub async fn get_aim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<FinancialAim>, AppError> {
    let user = current_user(&request)?;
    let aim = state
        .db
        .get_aim(user.id, id)?
        .ok_or_else(|| AppError::not_found("Financial aim not found"))?;

    state
        .db
        .log_audit(&user.username, "view", Some("financial_aim"), Some(id), None)?;

    Ok(Json(aim))
}

/// PUT /api/financial-aims/:id - Update provided fields of an aim
pub async fn update_aim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<FinancialAim>, AppError> {
    let user = current_user(&request)?;
    let req: FinancialAimUpdate = read_json(request).await?;

    let aim = state
        .db
        .update_aim(user.id, id, &req)
        .map_err(AppError::from_core)?
        .ok_or_else(|| AppError::not_found("Financial aim not found"))?;

    state
        .db
        .log_audit(&user.username, "update", Some("financial_aim"), Some(id), None)?;

    Ok(Json(aim))
}

/// DELETE /api/financial-aims/:id - Delete an aim, refunding its balance
pub async fn delete_aim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<StatusCode, AppError> {
    let user = current_user(&request)?;

    if !state.db.delete_aim(user.id, id)? {
        return Err(AppError::not_found("Financial aim not found"));
    }

    state
        .db
        .log_audit(&user.username, "delete", Some("financial_aim"), Some(id), None)?;

    Ok(StatusCode::NO_CONTENT)
}
