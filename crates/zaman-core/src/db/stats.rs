//! Per-user aggregates feeding the financial similarity profile

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{AccountStats, AimStats, FlowSummary, LedgerStats};

impl Database {
    /// Balance, count and mean age (days, as of `now`) of the user's bank accounts
    pub fn account_stats(&self, user_id: i64, now: DateTime<Utc>) -> Result<AccountStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            r#"
            SELECT COALESCE(SUM(balance), 0),
                   COUNT(*),
                   COALESCE(AVG(julianday(?) - julianday(created_at)), 0)
            FROM bank_accounts
            WHERE user_id = ?
            "#,
            params![format_datetime(&now), user_id],
            |row| {
                Ok(AccountStats {
                    total_balance: row.get(0)?,
                    num_accounts: row.get(1)?,
                    avg_account_age_days: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Ledger totals across all of the user's bank accounts
    pub fn ledger_stats(&self, user_id: i64) -> Result<LedgerStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            r#"
            SELECT COUNT(ft.id),
                   COALESCE(SUM(CASE WHEN ft.transaction_type = 'deposit' THEN ft.amount END), 0),
                   COALESCE(SUM(CASE WHEN ft.transaction_type = 'withdrawal' THEN ft.amount END), 0),
                   COALESCE(AVG(ft.amount), 0),
                   MIN(ft.created_at)
            FROM financial_transactions ft
            JOIN bank_accounts ba ON ba.id = ft.bank_account_id
            WHERE ba.user_id = ?
            "#,
            params![user_id],
            |row| {
                let first: Option<String> = row.get(4)?;
                Ok(LedgerStats {
                    total_transactions: row.get(0)?,
                    total_deposit: row.get(1)?,
                    total_withdrawal: row.get(2)?,
                    avg_transaction_amount: row.get(3)?,
                    first_transaction_at: first.as_deref().map(parse_datetime),
                })
            },
        )?;
        Ok(stats)
    }

    /// Aim totals, mean progress and completed count
    pub fn aim_stats(&self, user_id: i64) -> Result<AimStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(target_amount), 0),
                   COALESCE(SUM(current_amount), 0),
                   COALESCE(AVG(CASE WHEN target_amount > 0
                                     THEN current_amount * 100.0 / target_amount
                                     ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN target_amount > 0 AND current_amount >= target_amount
                                     THEN 1 ELSE 0 END), 0)
            FROM financial_aims
            WHERE user_id = ?
            "#,
            params![user_id],
            |row| {
                Ok(AimStats {
                    num_aims: row.get(0)?,
                    total_target_amount: row.get(1)?,
                    total_current_amount: row.get(2)?,
                    avg_aim_progress: row.get(3)?,
                    num_completed_aims: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Deposits (income) and withdrawals (outcome) recorded since `since`
    pub fn ledger_flow_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<FlowSummary> {
        let conn = self.conn()?;
        let (income, outcome): (f64, f64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(CASE WHEN ft.transaction_type = 'deposit' THEN ft.amount END), 0),
                   COALESCE(SUM(CASE WHEN ft.transaction_type = 'withdrawal' THEN ft.amount END), 0)
            FROM financial_transactions ft
            JOIN bank_accounts ba ON ba.id = ft.bank_account_id
            WHERE ba.user_id = ? AND ft.created_at >= ?
            "#,
            params![user_id, format_datetime(&since)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(FlowSummary {
            income,
            outcome,
            net: income - outcome,
        })
    }
}
