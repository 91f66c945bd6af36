//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_encrypt: bool,
    static_dir: Option<&Path>,
    insecure_dev_secret: bool,
) -> Result<()> {
    let config = zaman_server::ServerConfig::from_env(insecure_dev_secret)
        .context("Invalid server configuration")?;

    println!("🚀 Starting Zaman web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    if insecure_dev_secret && std::env::var(zaman_server::SECRET_KEY_ENV).is_err() {
        println!();
        println!("   ⚠️  Tokens signed with the built-in dev secret - do not expose to network!");
    } else {
        println!(
            "   🔐 Authentication: bearer tokens ({} min lifetime)",
            config.token_ttl_minutes
        );
    }
    if config.allowed_origins.is_empty() {
        println!("   🌐 CORS: same-origin only");
    } else {
        println!("   🌐 CORS: {}", config.allowed_origins.join(", "));
    }
    if config.opening_balance > 0.0 {
        println!("   💰 Opening balance: {:.2}", config.opening_balance);
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    zaman_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
