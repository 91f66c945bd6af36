//! Bank account operations

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::BankAccount;

pub(crate) fn row_to_bank_account(row: &rusqlite::Row) -> rusqlite::Result<BankAccount> {
    let created_at: String = row.get(3)?;
    Ok(BankAccount {
        id: row.get(0)?,
        user_id: row.get(1)?,
        balance: row.get(2)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Load the user's primary (oldest) bank account on an open connection
pub(crate) fn primary_bank_account(
    conn: &rusqlite::Connection,
    user_id: i64,
) -> Result<Option<BankAccount>> {
    let account = conn
        .query_row(
            "SELECT id, user_id, balance, created_at FROM bank_accounts
             WHERE user_id = ? ORDER BY id LIMIT 1",
            params![user_id],
            row_to_bank_account,
        )
        .optional()?;
    Ok(account)
}

impl Database {
    /// Get the user's primary bank account
    pub fn get_bank_account_for_user(&self, user_id: i64) -> Result<Option<BankAccount>> {
        let conn = self.conn()?;
        primary_bank_account(&conn, user_id)
    }

    /// Add `delta` (may be negative) to the user's primary bank balance
    ///
    /// Used for top-ups from the CLI. Fails with `InsufficientFunds` when the
    /// result would go negative.
    pub fn adjust_bank_balance(&self, user_id: i64, delta: f64) -> Result<BankAccount> {
        if !delta.is_finite() {
            return Err(Error::InvalidData("Amount must be a number".to_string()));
        }

        let account = self.with_write_transaction(|conn| {
            let account = primary_bank_account(conn, user_id)?
                .ok_or_else(|| Error::NotFound("Bank account not found".to_string()))?;

            let new_balance = account.balance + delta;
            if new_balance < 0.0 {
                return Err(Error::InsufficientFunds(
                    "Insufficient funds in bank account".to_string(),
                ));
            }

            conn.execute(
                "UPDATE bank_accounts SET balance = ? WHERE id = ?",
                params![new_balance, account.id],
            )?;

            Ok(BankAccount {
                balance: new_balance,
                ..account
            })
        })?;

        info!(user_id, delta, balance = account.balance, "Bank balance adjusted");
        Ok(account)
    }
}
