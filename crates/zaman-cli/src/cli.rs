//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Zaman - Banking assistant backend
#[derive(Parser)]
#[command(name = "zaman")]
#[command(about = "Banking assistant: savings aims, goal chat and financial similarity", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "zaman.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set ZAMAN_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Sign tokens with a built-in secret when ZAMAN_SECRET_KEY is unset
        ///
        /// WARNING: Anyone who knows the secret can forge tokens.
        /// Use for local development only.
        #[arg(long)]
        insecure_dev_secret: bool,
    },

    /// Show database status
    Status,

    /// List registered users with their balances
    Users,

    /// Add money to a user's bank account
    Fund {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Amount to add (negative to withdraw)
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,
    },

    /// Generate synthetic bank transactions for a user
    Seed {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Number of transactions (1-1000)
        #[arg(short, long, default_value = "100")]
        count: usize,
    },

    /// Show the users most similar to a user
    Similar {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Number of matches to show
        #[arg(short, long, default_value = "5")]
        top: usize,
    },

    /// Test the AI backend connection
    AiTest {
        /// Message to send to the chat model
        #[arg(short, long)]
        message: Option<String>,
    },
}
