//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `find_user` - Resolve a username given on the command line

use std::path::Path;

use anyhow::{Context, Result};
use zaman_core::db::Database;
use zaman_core::models::User;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    tracing::debug!(path = path_str, encrypted = !no_encrypt, "Opening database");
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Look up a user by name, failing with a readable message
pub fn find_user(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(username)?
        .with_context(|| format!("User '{}' not found", username))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Opening runs the migrations
    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start the API: ZAMAN_SECRET_KEY=... zaman serve");
    println!("  2. Sign up via POST /api/auth/signup");
    println!("  3. Top up the account: zaman fund --user <name> --amount 1000");

    Ok(())
}
