//! Ledger handlers: moving funds between the bank account and aims

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{current_user, read_json, AppError, AppState};
use zaman_core::models::{BankAccount, FinancialTransaction, FinancialTransactionType};

/// Request body for a ledger move
#[derive(Debug, Deserialize)]
pub struct CreateFinancialTransactionRequest {
    pub amount: f64,
    pub transaction_type: FinancialTransactionType,
    pub aim_id: i64,
}

/// POST /api/financial-transaction - Move funds to or from an aim
pub async fn create_financial_transaction(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<FinancialTransaction>), AppError> {
    let user = current_user(&request)?;
    let req: CreateFinancialTransactionRequest = read_json(request).await?;

    let row = state
        .db
        .apply_financial_transaction(user.id, req.aim_id, req.amount, req.transaction_type)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "create",
        Some("financial_transaction"),
        Some(row.id),
        Some(&format!(
            "aim_id={}, type={}, amount={:.2}",
            req.aim_id, req.transaction_type, req.amount
        )),
    )?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/financial-transaction - All ledger rows for the user's aims
pub async fn list_financial_transactions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<FinancialTransaction>>, AppError> {
    let user = current_user(&request)?;
    let rows = state.db.list_user_aim_transactions(user.id)?;

    state.db.log_audit(
        &user.username,
        "list",
        Some("financial_transaction"),
        None,
        Some(&format!("count={}", rows.len())),
    )?;

    Ok(Json(rows))
}

/// GET /api/financial-transaction/:aim_id - Ledger rows for one aim
pub async fn list_aim_financial_transactions(
    State(state): State<Arc<AppState>>,
    Path(aim_id): Path<i64>,
    request: Request,
) -> Result<Json<Vec<FinancialTransaction>>, AppError> {
    let user = current_user(&request)?;
    let rows = state
        .db
        .list_aim_transactions(user.id, aim_id)
        .map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "list",
        Some("financial_transaction"),
        Some(aim_id),
        Some(&format!("count={}", rows.len())),
    )?;

    Ok(Json(rows))
}

/// GET /api/bank-account - The user's bank account
pub async fn get_bank_account(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BankAccount>, AppError> {
    let user = current_user(&request)?;
    let account = state
        .db
        .get_bank_account_for_user(user.id)?
        .ok_or_else(|| AppError::not_found("Bank account not found"))?;

    state.db.log_audit(
        &user.username,
        "view",
        Some("bank_account"),
        Some(account.id),
        None,
    )?;

    Ok(Json(account))
}
