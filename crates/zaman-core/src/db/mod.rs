//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Registration and credential lookup
//! - `accounts` - Bank accounts and balance adjustments
//! - `aims` - Financial aim CRUD
//! - `ledger` - Moves between bank account and aims
//! - `transactions` - Everyday transactions, filters, synthetic data
//! - `chat` - Assistant sessions and message history
//! - `stats` - Aggregates feeding the similarity profile
//! - `audit` - API access log

use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tempfile::TempDir;
use tracing::info;

use crate::error::{Error, Result};

mod accounts;
mod aims;
mod audit;
mod chat;
mod ledger;
mod stats;
mod transactions;
mod users;

pub use audit::{AuditEntry, OPERATOR_AUDIT_USER};
pub use transactions::{GENERATED_DESCRIPTIONS, MAX_GENERATED_TRANSACTIONS};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "ZAMAN_DB_KEY";

/// SQLite timestamp layout used for every stored datetime
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"zaman-db-salt-v1";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(output.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a datetime the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
    /// Directory backing an `in_memory()` database, removed with the last clone
    scratch: Option<Arc<TempDir>>,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `ZAMAN_DB_KEY` to be set. The database is encrypted with
    /// SQLCipher using a key derived from the passphrase via Argon2.
    /// Use `new_unencrypted()` for development/testing.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Key must be set on every new pooled connection, before anything else
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager =
                manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
            scratch: None,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("zaman_test_").tempdir()?;
        let path = dir.path().join("zaman.db");
        let path = path.to_string_lossy().to_string();

        let mut db = Self::new_unencrypted(&path)?;
        db.scratch = Some(Arc::new(dir));
        Ok(db)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher reports cipher_version even without a key, so also require one
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS bank_accounts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                balance REAL NOT NULL DEFAULT 0 CHECK (balance >= 0),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_bank_accounts_user ON bank_accounts(user_id);

            CREATE TABLE IF NOT EXISTS financial_aims (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                target_amount REAL NOT NULL,
                current_amount REAL NOT NULL DEFAULT 0 CHECK (current_amount >= 0),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_financial_aims_user ON financial_aims(user_id);

            -- Everyday account activity (spending history)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, created_at);

            -- Ledger: moves between a bank account and an aim
            CREATE TABLE IF NOT EXISTS financial_transactions (
                id INTEGER PRIMARY KEY,
                bank_account_id INTEGER NOT NULL REFERENCES bank_accounts(id) ON DELETE CASCADE,
                aim_id INTEGER NOT NULL REFERENCES financial_aims(id) ON DELETE CASCADE,
                amount REAL NOT NULL CHECK (amount > 0),
                transaction_type TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_financial_transactions_aim ON financial_transactions(aim_id, created_at);

            CREATE TABLE IF NOT EXISTS chat_sessions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                session_id TEXT NOT NULL,
                stage TEXT NOT NULL DEFAULT 'discovery',
                goal_type TEXT,
                goal_cost REAL,
                monthly_saving REAL,
                timeline INTEGER,
                products TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, session_id)
            );

            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY,
                chat_session_id INTEGER NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(chat_session_id);

            -- Audit log (tracks API access)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                username TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(username, timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Run `f` inside `BEGIN IMMEDIATE ... COMMIT`, rolling back on error
    ///
    /// IMMEDIATE takes the write lock up front so concurrent balance checks
    /// cannot interleave between read and update.
    pub(crate) fn with_write_transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> Result<T>,
    ) -> Result<T> {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;

        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests;
