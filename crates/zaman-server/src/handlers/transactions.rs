//! Bank transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{current_user, read_json, AppError, AppState};
use zaman_core::models::{CategoryCount, Transaction, TransactionQuery, TransactionType};

/// Number of categories returned by the categories endpoint
const TOP_CATEGORIES: i64 = 10;

/// Query parameters for listing transactions
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub description: Option<String>,
    pub tx_type: Option<String>,
}

/// Request body for generating transactions
#[derive(Debug, Deserialize)]
pub struct GenerateTransactionsRequest {
    pub count: usize,
}

/// GET /api/transactions - List transactions with optional filters
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionListQuery>,
    request: Request,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let user = current_user(&request)?;

    let transaction_type = params
        .tx_type
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<TransactionType>())
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    let query = TransactionQuery {
        date_from: params.date_from,
        date_to: params.date_to,
        description: params.description.filter(|d| !d.is_empty()),
        transaction_type,
    };
    let transactions = state.db.list_transactions(user.id, &query)?;

    // Audit log - read access
    state.db.log_audit(
        &user.username,
        "list",
        Some("transaction"),
        None,
        Some(&format!("count={}", transactions.len())),
    )?;

    Ok(Json(transactions))
}

/// GET /api/transactions/categories - Most frequent descriptions
pub async fn list_transaction_categories(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<CategoryCount>>, AppError> {
    let user = current_user(&request)?;
    let categories = state.db.top_transaction_categories(user.id, TOP_CATEGORIES)?;

    state
        .db
        .log_audit(&user.username, "list", Some("transaction_category"), None, None)?;

    Ok(Json(categories))
}

/// GET /api/transactions/:id - Get one transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let user = current_user(&request)?;
    let transaction = state
        .db
        .get_transaction(user.id, id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    state
        .db
        .log_audit(&user.username, "view", Some("transaction"), Some(id), None)?;

    Ok(Json(transaction))
}

/// POST /api/transactions/generate - Generate synthetic transactions
pub async fn generate_transactions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let user = current_user(&request)?;
    let req: GenerateTransactionsRequest = read_json(request).await?;

    let last = state
        .db
        .generate_transactions(user.id, req.count)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "generate",
        Some("transaction"),
        Some(last.id),
        Some(&format!("count={}", req.count)),
    )?;

    Ok((StatusCode::CREATED, Json(last)))
}
