//! Status command implementation

use std::path::Path;

use anyhow::Result;
use zaman_core::ai::{AIBackend, AIClient};

use super::open_db;

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    use std::fs;
    use zaman_core::db::DB_KEY_ENV;

    println!();
    println!("📊 Zaman Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // AI backend
    match AIClient::from_env() {
        Some(client) => println!("   🤖 AI: {} (model: {})", client.host(), client.model()),
        None => println!("   🤖 AI: not configured (set OPENAI_COMPATIBLE_HOST)"),
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(users) = db.count_users() {
                    println!();
                    println!("   Users: {}", users);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
