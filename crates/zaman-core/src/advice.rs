//! Personal finance advice from recent transactions

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::ai::parsing::extract_top_advices;
use crate::ai::{AIBackend, AIClient, ChatMessage};
use crate::assistant::generate_session_id;
use crate::db::Database;
use crate::error::Result;
use crate::models::Transaction;
use crate::prompts::{PromptId, PromptLibrary};

/// Most transactions included in one prompt
pub const ADVICE_TRANSACTION_LIMIT: i64 = 50;

const ADVICE_TEMPERATURE: f32 = 0.7;

/// Advice answer
#[derive(Debug, Clone, Serialize)]
pub struct FinanceAdvice {
    pub advices: Vec<String>,
    pub raw_response: String,
    pub session_id: String,
    pub transactions_count: i64,
}

/// One prompt line per transaction: `- id - <id> <date> | <type> | <amount> | <description>`
pub fn format_transactions(transactions: &[Transaction]) -> String {
    transactions
        .iter()
        .map(|t| {
            format!(
                "- id - {} {} | {} | {:.2} | {}",
                t.id,
                t.created_at.format("%Y-%m-%dT%H:%M:%S"),
                t.transaction_type,
                t.amount,
                t.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the advice prompt for a set of transactions
pub fn advice_prompt(prompts: &PromptLibrary, transactions: &[Transaction]) -> Result<String> {
    let prompt = prompts.get(PromptId::FinanceAdvice)?;
    let mut vars = HashMap::new();
    if transactions.is_empty() {
        vars.insert("no_transactions", "1".to_string());
    } else {
        vars.insert("transactions", format_transactions(transactions));
    }
    Ok(prompt.render(&vars))
}

/// Ask the model for three tips based on the user's latest transactions
pub async fn finance_advice(
    db: &Database,
    ai: &AIClient,
    prompts: &PromptLibrary,
    user_id: i64,
) -> Result<FinanceAdvice> {
    let transactions = db.recent_transactions(user_id, ADVICE_TRANSACTION_LIMIT)?;
    let transactions_count = db.count_transactions(user_id)?;
    let prompt = advice_prompt(prompts, &transactions)?;

    let raw_response = ai
        .chat(&[ChatMessage::user(prompt)], ADVICE_TEMPERATURE)
        .await?;
    let advices = extract_top_advices(&raw_response);

    info!(
        user_id,
        transactions = transactions_count,
        advices = advices.len(),
        "Finance advice generated"
    );

    Ok(FinanceAdvice {
        advices,
        raw_response,
        session_id: generate_session_id(),
        transactions_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{NewTransaction, TransactionType};
    use chrono::{TimeZone, Utc};

    fn tx(id: i64, amount: f64, description: &str) -> Transaction {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        Transaction {
            id,
            user_id: 1,
            amount,
            description: description.into(),
            transaction_type: TransactionType::Withdrawal,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_format_transactions() {
        let text = format_transactions(&[tx(7, 1500.5, "Food"), tx(8, 20.0, "Taxi")]);
        assert_eq!(
            text,
            "- id - 7 2025-03-14T09:30:00 | withdrawal | 1500.50 | Food\n\
             - id - 8 2025-03-14T09:30:00 | withdrawal | 20.00 | Taxi"
        );
    }

    #[test]
    fn test_advice_prompt_branches() {
        let prompts = PromptLibrary::embedded_only();
        let empty = advice_prompt(&prompts, &[]).unwrap();
        assert!(empty.contains("пока нет транзакций"));

        let full = advice_prompt(&prompts, &[tx(1, 10.0, "Coffee")]).unwrap();
        assert!(full.contains("- id - 1 "));
        assert!(!full.contains("пока нет транзакций"));
    }

    #[tokio::test]
    async fn test_finance_advice() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("timur", "t@example.com", "hash", 0.0).unwrap();
        for i in 0..60 {
            let at = Utc::now() - chrono::Duration::hours(i);
            db.insert_transaction(&NewTransaction {
                user_id: user.id,
                amount: 100.0,
                description: "Shopping".into(),
                transaction_type: TransactionType::Withdrawal,
                created_at: at,
                updated_at: at,
            })
            .unwrap();
        }

        let mock = MockBackend::with_replies([
            "1. Сократите покупки\n2. Откладывайте 10%\n3. Ведите бюджет",
        ]);
        let ai = AIClient::Mock(mock.clone());
        let prompts = PromptLibrary::embedded_only();

        let advice = finance_advice(&db, &ai, &prompts, user.id).await.unwrap();
        assert_eq!(advice.transactions_count, 60);
        assert_eq!(
            advice.advices,
            vec!["Сократите покупки", "Откладывайте 10%", "Ведите бюджет"]
        );
        assert_eq!(advice.session_id.len(), 32);

        let sent = &mock.requests()[0][0].content;
        assert_eq!(sent.matches("- id - ").count(), ADVICE_TRANSACTION_LIMIT as usize);
    }
}
