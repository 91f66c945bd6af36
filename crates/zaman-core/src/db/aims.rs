//! Financial aim CRUD
//!
//! Every lookup is scoped by owner: another user's aim is indistinguishable
//! from a missing one.

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::accounts::primary_bank_account;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{FinancialAim, FinancialAimUpdate, NewFinancialAim};

const AIM_COLUMNS: &str =
    "id, user_id, title, description, target_amount, current_amount, created_at";

pub(crate) fn row_to_aim(row: &rusqlite::Row) -> rusqlite::Result<FinancialAim> {
    let target_amount: f64 = row.get(4)?;
    let current_amount: f64 = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(FinancialAim {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        target_amount,
        current_amount,
        is_completed: FinancialAim::completed(target_amount, current_amount),
        created_at: parse_datetime(&created_at),
    })
}

/// Load an aim owned by `user_id` on an open connection
pub(crate) fn owned_aim(
    conn: &rusqlite::Connection,
    user_id: i64,
    aim_id: i64,
) -> Result<Option<FinancialAim>> {
    let aim = conn
        .query_row(
            &format!(
                "SELECT {} FROM financial_aims WHERE id = ? AND user_id = ?",
                AIM_COLUMNS
            ),
            params![aim_id, user_id],
            row_to_aim,
        )
        .optional()?;
    Ok(aim)
}

fn validate_amounts(target_amount: f64, current_amount: f64) -> Result<()> {
    if !target_amount.is_finite() || target_amount <= 0.0 {
        return Err(Error::InvalidData(
            "Target amount must be greater than zero".to_string(),
        ));
    }
    if !current_amount.is_finite() || current_amount < 0.0 {
        return Err(Error::InvalidData(
            "Current amount cannot be negative".to_string(),
        ));
    }
    Ok(())
}

impl Database {
    /// Create an aim for a user
    pub fn create_aim(&self, user_id: i64, aim: &NewFinancialAim) -> Result<FinancialAim> {
        let title = aim.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidData("Title is required".to_string()));
        }
        validate_amounts(aim.target_amount, aim.current_amount)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO financial_aims (user_id, title, description, target_amount, current_amount)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                title,
                aim.description,
                aim.target_amount,
                aim.current_amount
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        info!(user_id, aim_id = id, "Financial aim created");

        self.get_aim(user_id, id)?
            .ok_or_else(|| Error::NotFound("Financial aim not found".to_string()))
    }

    /// List a user's aims, oldest first
    pub fn list_aims(&self, user_id: i64) -> Result<Vec<FinancialAim>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM financial_aims WHERE user_id = ? ORDER BY id",
            AIM_COLUMNS
        ))?;

        let aims = stmt
            .query_map(params![user_id], row_to_aim)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(aims)
    }

    /// Get one aim if the user owns it
    pub fn get_aim(&self, user_id: i64, aim_id: i64) -> Result<Option<FinancialAim>> {
        let conn = self.conn()?;
        owned_aim(&conn, user_id, aim_id)
    }

    /// Apply a partial update; `None` when the aim is missing or not owned
    pub fn update_aim(
        &self,
        user_id: i64,
        aim_id: i64,
        update: &FinancialAimUpdate,
    ) -> Result<Option<FinancialAim>> {
        let updated = self.with_write_transaction(|conn| {
            let Some(existing) = owned_aim(conn, user_id, aim_id)? else {
                return Ok(None);
            };

            let title = match &update.title {
                Some(t) if t.trim().is_empty() => {
                    return Err(Error::InvalidData("Title is required".to_string()))
                }
                Some(t) => t.trim().to_string(),
                None => existing.title.clone(),
            };
            let description = update.description.clone().or(existing.description.clone());
            let target_amount = update.target_amount.unwrap_or(existing.target_amount);
            let current_amount = update.current_amount.unwrap_or(existing.current_amount);
            validate_amounts(target_amount, current_amount)?;

            conn.execute(
                r#"
                UPDATE financial_aims
                SET title = ?, description = ?, target_amount = ?, current_amount = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND user_id = ?
                "#,
                params![
                    title,
                    description,
                    target_amount,
                    current_amount,
                    aim_id,
                    user_id
                ],
            )?;

            owned_aim(conn, user_id, aim_id)
        })?;

        if updated.is_some() {
            info!(user_id, aim_id, "Financial aim updated");
        }
        Ok(updated)
    }

    /// Delete an aim, returning its saved funds to the bank account
    ///
    /// Returns false when the aim is missing or not owned.
    pub fn delete_aim(&self, user_id: i64, aim_id: i64) -> Result<bool> {
        let deleted = self.with_write_transaction(|conn| {
            let Some(aim) = owned_aim(conn, user_id, aim_id)? else {
                return Ok(false);
            };

            if aim.current_amount > 0.0 {
                if let Some(account) = primary_bank_account(conn, user_id)? {
                    conn.execute(
                        "UPDATE bank_accounts SET balance = balance + ? WHERE id = ?",
                        params![aim.current_amount, account.id],
                    )?;
                }
            }

            conn.execute(
                "DELETE FROM financial_aims WHERE id = ? AND user_id = ?",
                params![aim_id, user_id],
            )?;
            Ok(true)
        })?;

        if deleted {
            info!(user_id, aim_id, "Financial aim deleted");
        }
        Ok(deleted)
    }
}
