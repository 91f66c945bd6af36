//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod aims;
pub mod audit;
pub mod auth;
pub mod chat;
pub mod ledger;
pub mod planning;
pub mod similarity;
pub mod speech;
pub mod transactions;

// Re-export all handlers for use in router
pub use aims::*;
pub use audit::*;
pub use auth::*;
pub use chat::*;
pub use ledger::*;
pub use planning::*;
pub use similarity::*;
pub use speech::*;
pub use transactions::*;
