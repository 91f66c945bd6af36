//! Domain models for Zaman

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A registered user (never carries the password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Login lookup row
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// The user's main bank account. Aims are funded from here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub user_id: i64,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

/// A savings goal with its own sub-balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialAim {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl FinancialAim {
    /// An aim is complete once the saved amount reaches a positive target
    pub fn completed(target_amount: f64, current_amount: f64) -> bool {
        target_amount > 0.0 && current_amount >= target_amount
    }

    /// Saved share of the target in percent, 0 for a zero target
    pub fn progress_percent(&self) -> f64 {
        if self.target_amount > 0.0 {
            self.current_amount / self.target_amount * 100.0
        } else {
            0.0
        }
    }
}

/// Fields for creating an aim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFinancialAim {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
}

/// Partial update; only `Some` fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialAimUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
}

/// Everyday bank transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub const ALL: [TransactionType; 3] = [Self::Deposit, Self::Withdrawal, Self::Transfer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction on the user's bank account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub description: String,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a transaction with explicit timestamps
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub amount: f64,
    pub description: String,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing transactions. Date bounds are whole days, inclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub description: Option<String>,
    pub transaction_type: Option<TransactionType>,
}

/// A description and how often it occurs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub description: String,
    pub count: i64,
}

/// Direction of a move between bank account and aim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancialTransactionType {
    /// Bank account -> aim
    Deposit,
    /// Aim -> bank account
    Withdrawal,
}

impl FinancialTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl std::str::FromStr for FinancialTransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            _ => Err(format!("Unknown financial transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for FinancialTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger row recording one move of funds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialTransaction {
    pub id: i64,
    pub bank_account_id: i64,
    pub aim_id: i64,
    pub amount: f64,
    pub transaction_type: FinancialTransactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assistant conversation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChatStage {
    #[default]
    Discovery,
    Clarification,
    Recommendation,
    Confirmation,
    Cta,
}

impl ChatStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Clarification => "clarification",
            Self::Recommendation => "recommendation",
            Self::Confirmation => "confirmation",
            Self::Cta => "cta",
        }
    }

    /// The stage that follows this one, `None` for the terminal stage
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Discovery => Some(Self::Clarification),
            Self::Clarification => Some(Self::Recommendation),
            Self::Recommendation => Some(Self::Confirmation),
            Self::Confirmation => Some(Self::Cta),
            Self::Cta => None,
        }
    }
}

impl std::str::FromStr for ChatStage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(Self::Discovery),
            "clarification" => Ok(Self::Clarification),
            "recommendation" => Ok(Self::Recommendation),
            "confirmation" => Ok(Self::Confirmation),
            "cta" => Ok(Self::Cta),
            _ => Err(format!("Unknown chat stage: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Goal details collected over a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatGoal {
    pub goal_type: Option<String>,
    pub goal_cost: Option<f64>,
    pub monthly_saving: Option<f64>,
    /// Months
    pub timeline: Option<i64>,
    pub products: Option<Vec<String>>,
}

/// Persisted assistant conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub stage: ChatStage,
    #[serde(flatten)]
    pub goal: ChatGoal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Bank account aggregates for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub total_balance: f64,
    pub num_accounts: i64,
    pub avg_account_age_days: f64,
}

/// Ledger aggregates over all of a user's aims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_transactions: i64,
    pub total_deposit: f64,
    pub total_withdrawal: f64,
    pub avg_transaction_amount: f64,
    pub first_transaction_at: Option<DateTime<Utc>>,
}

/// Aim aggregates for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AimStats {
    pub num_aims: i64,
    pub total_target_amount: f64,
    pub total_current_amount: f64,
    pub avg_aim_progress: f64,
    pub num_completed_aims: i64,
}

/// Ledger income/outcome over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub income: f64,
    pub outcome: f64,
    pub net: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aim_completion() {
        assert!(FinancialAim::completed(100.0, 100.0));
        assert!(FinancialAim::completed(100.0, 150.0));
        assert!(!FinancialAim::completed(100.0, 99.99));
        assert!(!FinancialAim::completed(0.0, 0.0));
    }

    #[test]
    fn test_stage_order() {
        let mut stage = ChatStage::Discovery;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                ChatStage::Discovery,
                ChatStage::Clarification,
                ChatStage::Recommendation,
                ChatStage::Confirmation,
                ChatStage::Cta,
            ]
        );
    }

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!("Withdrawal".parse::<TransactionType>().unwrap(), TransactionType::Withdrawal);
        assert_eq!("cta".parse::<ChatStage>().unwrap(), ChatStage::Cta);
        assert!("refund".parse::<FinancialTransactionType>().is_err());
        assert_eq!(
            serde_json::to_string(&FinancialTransactionType::Deposit).unwrap(),
            "\"deposit\""
        );
    }
}
