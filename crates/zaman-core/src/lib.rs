//! Zaman Core Library
//!
//! Shared functionality for the Zaman banking assistant:
//! - Database access and migrations (users, bank accounts, aims, ledger, chat)
//! - Password hashing
//! - Pluggable AI backends (OpenAI-compatible chat and speech-to-text)
//! - Prompt library for the goal assistant
//! - Goal assistant stage machine and transaction-based advice
//! - Goal planning helpers and the product catalogue
//! - Financial similarity between users

pub mod advice;
pub mod ai;
pub mod assistant;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod planning;
pub mod prompts;
pub mod similarity;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use advice::FinanceAdvice;
pub use ai::{AIBackend, AIClient, ChatMessage, MockBackend, OpenAICompatibleBackend, Role};
pub use assistant::{Assistant, ChatReply};
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use similarity::{SimilarityService, UserFinancialProfile};
