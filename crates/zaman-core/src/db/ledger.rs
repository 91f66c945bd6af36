//! Ledger: moving funds between the bank account and aims

use rusqlite::params;
use tracing::info;

use super::accounts::primary_bank_account;
use super::aims::owned_aim;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{FinancialTransaction, FinancialTransactionType};

fn row_to_financial_transaction(row: &rusqlite::Row) -> rusqlite::Result<FinancialTransaction> {
    let type_str: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(FinancialTransaction {
        id: row.get(0)?,
        bank_account_id: row.get(1)?,
        aim_id: row.get(2)?,
        amount: row.get(3)?,
        transaction_type: type_str
            .parse()
            .unwrap_or(FinancialTransactionType::Deposit),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

impl Database {
    /// Move `amount` between the user's bank account and one of their aims
    ///
    /// Deposit: bank -> aim. Withdrawal: aim -> bank. Both balance updates and
    /// the ledger row commit together or not at all.
    pub fn apply_financial_transaction(
        &self,
        user_id: i64,
        aim_id: i64,
        amount: f64,
        transaction_type: FinancialTransactionType,
    ) -> Result<FinancialTransaction> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidData(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let id = self.with_write_transaction(|conn| {
            let account = primary_bank_account(conn, user_id)?
                .ok_or_else(|| Error::NotFound("Bank account not found".to_string()))?;
            let aim = owned_aim(conn, user_id, aim_id)?
                .ok_or_else(|| Error::NotFound("Financial aim not found".to_string()))?;

            let (bank_delta, aim_delta) = match transaction_type {
                FinancialTransactionType::Deposit => {
                    if account.balance < amount {
                        return Err(Error::InsufficientFunds(
                            "Insufficient funds in bank account".to_string(),
                        ));
                    }
                    (-amount, amount)
                }
                FinancialTransactionType::Withdrawal => {
                    if aim.current_amount < amount {
                        return Err(Error::InsufficientFunds(
                            "Insufficient funds in aim account".to_string(),
                        ));
                    }
                    (amount, -amount)
                }
            };

            conn.execute(
                "UPDATE bank_accounts SET balance = ? WHERE id = ?",
                params![account.balance + bank_delta, account.id],
            )?;
            conn.execute(
                "UPDATE financial_aims SET current_amount = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                params![aim.current_amount + aim_delta, aim.id],
            )?;
            conn.execute(
                r#"
                INSERT INTO financial_transactions (bank_account_id, aim_id, amount, transaction_type)
                VALUES (?, ?, ?, ?)
                "#,
                params![account.id, aim.id, amount, transaction_type.as_str()],
            )?;

            Ok(conn.last_insert_rowid())
        })?;

        info!(
            user_id,
            aim_id,
            amount,
            kind = transaction_type.as_str(),
            "Financial transaction applied"
        );

        let conn = self.conn()?;
        let tx = conn.query_row(
            r#"
            SELECT id, bank_account_id, aim_id, amount, transaction_type, created_at, updated_at
            FROM financial_transactions WHERE id = ?
            "#,
            params![id],
            row_to_financial_transaction,
        )?;
        Ok(tx)
    }

    /// Ledger rows for one owned aim, newest first
    pub fn list_aim_transactions(
        &self,
        user_id: i64,
        aim_id: i64,
    ) -> Result<Vec<FinancialTransaction>> {
        let conn = self.conn()?;
        if owned_aim(&conn, user_id, aim_id)?.is_none() {
            return Err(Error::NotFound("Financial aim not found".to_string()));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, bank_account_id, aim_id, amount, transaction_type, created_at, updated_at
            FROM financial_transactions
            WHERE aim_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![aim_id], row_to_financial_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Ledger rows across all of a user's aims, newest first
    pub fn list_user_aim_transactions(&self, user_id: i64) -> Result<Vec<FinancialTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ft.id, ft.bank_account_id, ft.aim_id, ft.amount, ft.transaction_type,
                   ft.created_at, ft.updated_at
            FROM financial_transactions ft
            JOIN financial_aims fa ON fa.id = ft.aim_id
            WHERE fa.user_id = ?
            ORDER BY ft.created_at DESC, ft.id DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id], row_to_financial_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
