//! Financial similarity handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::Deserialize;

use crate::{current_user, AppError, AppState};
use zaman_core::similarity::{SimilarUsersReport, UserComparison};
use zaman_core::{SimilarityService, UserFinancialProfile};

/// Most neighbours a single request may ask for
const MAX_TOP_N: usize = 50;

/// Query parameters for neighbour search
#[derive(Debug, Deserialize)]
pub struct FindSimilarQuery {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    5
}

/// GET /api/similarity/find-similar/:user_id - Most similar users
pub async fn find_similar_users(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<FindSimilarQuery>,
    request: Request,
) -> Result<Json<SimilarUsersReport>, AppError> {
    let user = current_user(&request)?;
    if !(1..=MAX_TOP_N).contains(&params.top_n) {
        return Err(AppError::bad_request(&format!(
            "top_n must be between 1 and {}",
            MAX_TOP_N
        )));
    }

    let report = SimilarityService::new(&state.db)
        .similar_users_report(user_id, params.top_n)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "similar",
        Some("user"),
        Some(user_id),
        Some(&format!(
            "top_n={}, found={}",
            params.top_n,
            report.similar_users.len()
        )),
    )?;

    Ok(Json(report))
}

/// GET /api/similarity/compare/:user1_id/:user2_id - Feature-by-feature comparison
pub async fn compare_users(
    State(state): State<Arc<AppState>>,
    Path((user1_id, user2_id)): Path<(i64, i64)>,
    request: Request,
) -> Result<Json<UserComparison>, AppError> {
    let user = current_user(&request)?;

    let comparison = SimilarityService::new(&state.db)
        .compare_users(user1_id, user2_id)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "compare",
        Some("user"),
        Some(user1_id),
        Some(&format!("other={}", user2_id)),
    )?;

    Ok(Json(comparison))
}

/// GET /api/similarity/profile/:user_id - Raw financial profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    request: Request,
) -> Result<Json<UserFinancialProfile>, AppError> {
    let user = current_user(&request)?;

    let profile = SimilarityService::new(&state.db)
        .profile(user_id)
        .map_err(AppError::from_core)?;

    state
        .db
        .log_audit(&user.username, "view", Some("profile"), Some(user_id), None)?;

    Ok(Json(profile))
}
