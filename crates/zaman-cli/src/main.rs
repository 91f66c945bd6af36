//! Zaman CLI - Banking assistant backend
//!
//! Usage:
//!   zaman init                          Initialize database
//!   zaman serve --port 8000             Start web server
//!   zaman fund --user aida --amount 500 Top up a bank account
//!   zaman similar --user aida           Find financially similar users

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            static_dir,
            insecure_dev_secret,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                cli.no_encrypt,
                static_dir.as_deref(),
                insecure_dev_secret,
            )
            .await
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Users => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_users(&db)
        }
        Commands::Fund { user, amount } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_fund(&db, &user, amount)
        }
        Commands::Seed { user, count } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_seed(&db, &user, count)
        }
        Commands::Similar { user, top } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_similar(&db, &user, top)
        }
        Commands::AiTest { message } => commands::cmd_ai_test(message.as_deref()).await,
    }
}
