//! User registration and lookup

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_datetime, Database, OPERATOR_AUDIT_USER};
use crate::error::{Error, Result};
use crate::models::{User, UserCredentials};

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Register a user and open their bank account in one transaction
    ///
    /// Fails with `Conflict` when the username or email is already registered
    /// and with `InvalidData` for the reserved operator name.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        opening_balance: f64,
    ) -> Result<User> {
        if username.trim().eq_ignore_ascii_case(OPERATOR_AUDIT_USER) {
            return Err(Error::InvalidData("Username is reserved".to_string()));
        }
        if opening_balance < 0.0 || !opening_balance.is_finite() {
            return Err(Error::InvalidData(
                "Opening balance must be a non-negative number".to_string(),
            ));
        }

        let user_id = self.with_write_transaction(|conn| {
            let username_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)",
                params![username],
                |row| row.get(0),
            )?;
            if username_taken {
                return Err(Error::Conflict("Username already taken".to_string()));
            }

            let email_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)",
                params![email],
                |row| row.get(0),
            )?;
            if email_taken {
                return Err(Error::Conflict("Email already registered".to_string()));
            }

            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)",
                params![username, email, password_hash],
            )?;
            let user_id = conn.last_insert_rowid();

            conn.execute(
                "INSERT INTO bank_accounts (user_id, balance) VALUES (?, ?)",
                params![user_id, opening_balance],
            )?;

            Ok(user_id)
        })?;

        info!(user_id, username, "User registered");

        self.get_user(user_id)?
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, email, created_at FROM users WHERE id = ?",
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by username
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, email, created_at FROM users WHERE username = ?",
                params![username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Fetch the stored password hash for login
    pub fn get_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let conn = self.conn()?;
        let creds = conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?",
                params![username],
                |row| {
                    Ok(UserCredentials {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(creds)
    }

    /// List all users
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, username, email, created_at FROM users ORDER BY id")?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// IDs of every user, ascending
    pub fn list_user_ids(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    /// Count registered users
    pub fn count_users(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}
