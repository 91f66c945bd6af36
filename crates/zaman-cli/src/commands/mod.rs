//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `accounts` - Bank account commands (users, fund, seed)
//! - `ai` - AI backend connection test
//! - `serve` - Web server command
//! - `similar` - Financial similarity lookup
//! - `status` - Database status

pub mod accounts;
pub mod ai;
pub mod core;
pub mod serve;
pub mod similar;
pub mod status;

// Re-export command functions for main.rs
pub use accounts::*;
pub use ai::*;
pub use self::core::*;
pub use serve::*;
pub use similar::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
