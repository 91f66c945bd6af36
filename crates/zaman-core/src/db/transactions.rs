//! Everyday transactions: filtering, categories and synthetic data

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{CategoryCount, NewTransaction, Transaction, TransactionQuery, TransactionType};

/// Descriptions drawn from when generating synthetic transactions
pub const GENERATED_DESCRIPTIONS: [&str; 10] = [
    "Purchase",
    "Payment",
    "Fee",
    "Service",
    "Store",
    "Supplies",
    "Subscription",
    "Online",
    "Bill",
    "Charge",
];

/// Upper bound for a single generate request
pub const MAX_GENERATED_TRANSACTIONS: usize = 1000;

/// How far back generated transactions may be dated
const GENERATED_HISTORY_DAYS: i64 = 180;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, description, transaction_type, created_at, updated_at";

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let type_str: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        transaction_type: type_str.parse().unwrap_or(TransactionType::Transfer),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

/// Build one random transaction dated within the last 180 days of `now`
pub fn random_transaction<R: Rng + ?Sized>(
    rng: &mut R,
    user_id: i64,
    now: DateTime<Utc>,
) -> NewTransaction {
    let amount = (rng.gen_range(10.0..=1000.0_f64) * 100.0).round() / 100.0;
    let transaction_type = TransactionType::ALL[rng.gen_range(0..TransactionType::ALL.len())];
    let description = GENERATED_DESCRIPTIONS[rng.gen_range(0..GENERATED_DESCRIPTIONS.len())];

    let window = GENERATED_HISTORY_DAYS * 24 * 60 * 60;
    let created_at = now - Duration::seconds(rng.gen_range(0..=window));
    let since_created = (now - created_at).num_seconds();
    let updated_at = created_at + Duration::seconds(rng.gen_range(0..=since_created));

    NewTransaction {
        user_id,
        amount,
        description: description.to_string(),
        transaction_type,
        created_at,
        updated_at,
    }
}

impl Database {
    /// Insert a transaction with explicit timestamps
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, amount, description, transaction_type, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.amount,
                tx.description,
                tx.transaction_type.as_str(),
                format_datetime(&tx.created_at),
                format_datetime(&tx.updated_at),
            ],
        )?;
        let id = conn.last_insert_rowid();

        let row = conn.query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
            params![id],
            row_to_transaction,
        )?;
        Ok(row)
    }

    /// Generate `count` random transactions for a user
    ///
    /// Returns the last one inserted.
    pub fn generate_transactions(&self, user_id: i64, count: usize) -> Result<Transaction> {
        if count == 0 || count > MAX_GENERATED_TRANSACTIONS {
            return Err(Error::InvalidData(format!(
                "Count must be between 1 and {}",
                MAX_GENERATED_TRANSACTIONS
            )));
        }

        let now = Utc::now();
        let mut rng = rand::thread_rng();
        let generated: Vec<NewTransaction> = (0..count)
            .map(|_| random_transaction(&mut rng, user_id, now))
            .collect();

        let last_id = self.with_write_transaction(|conn| {
            let mut stmt = conn.prepare(
                r#"
                INSERT INTO transactions (user_id, amount, description, transaction_type, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )?;
            let mut last_id = 0;
            for tx in &generated {
                stmt.execute(params![
                    tx.user_id,
                    tx.amount,
                    tx.description,
                    tx.transaction_type.as_str(),
                    format_datetime(&tx.created_at),
                    format_datetime(&tx.updated_at),
                ])?;
                last_id = conn.last_insert_rowid();
            }
            Ok(last_id)
        })?;

        info!(user_id, count, "Generated synthetic transactions");

        self.get_transaction(user_id, last_id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", last_id)))
    }

    /// List a user's transactions, newest first
    pub fn list_transactions(
        &self,
        user_id: i64,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ?",
            TRANSACTION_COLUMNS
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some(from) = query.date_from {
            sql.push_str(" AND created_at >= ?");
            values.push(Box::new(format!("{} 00:00:00", from.format("%Y-%m-%d"))));
        }
        if let Some(to) = query.date_to {
            sql.push_str(" AND created_at <= ?");
            values.push(Box::new(format!("{} 23:59:59", to.format("%Y-%m-%d"))));
        }
        if let Some(description) = &query.description {
            sql.push_str(" AND description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(kind) = query.transaction_type {
            sql.push_str(" AND transaction_type = ?");
            values.push(Box::new(kind.as_str()));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let params_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Most frequent descriptions for a user
    pub fn top_transaction_categories(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<CategoryCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT description, COUNT(*) AS cnt
            FROM transactions
            WHERE user_id = ?
            GROUP BY description
            ORDER BY cnt DESC, description ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(CategoryCount {
                    description: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Get one transaction if the user owns it
    pub fn get_transaction(&self, user_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions WHERE id = ? AND user_id = ?",
                    TRANSACTION_COLUMNS
                ),
                params![id, user_id],
                row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// Number of transactions the user has
    pub fn count_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The user's latest `limit` transactions
    pub fn recent_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
