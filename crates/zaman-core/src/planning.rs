//! Goal planning helpers and the bank product catalogue

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A savings goal to plan for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialGoal {
    pub goal_name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    pub timeline_months: i64,
    /// apartment, education, purchase, travel, operation
    pub goal_type: String,
}

/// Monthly plan for reaching a goal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalPlan {
    pub monthly_saving: f64,
    pub progress_percentage: f64,
    pub timeline_months: i64,
    pub recommendations: Vec<String>,
}

/// Income and savings snapshot used for product advice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub savings: f64,
    #[serde(default)]
    pub financial_goals: Vec<FinancialGoal>,
}

/// One bank product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankProduct {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<&'static str>,
    /// Contract type of islamic products
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    pub description: &'static str,
}

pub const DEPOSITS: [BankProduct; 2] = [
    BankProduct {
        name: "Сберегательный вклад",
        rate: Some("5.5%"),
        min_amount: Some(50_000.0),
        max_amount: None,
        term: Some("12 месяцев"),
        kind: None,
        description: "Надежный вклад с ежемесячной выплатой процентов",
    },
    BankProduct {
        name: "Накопительный счет",
        rate: Some("3.5%"),
        min_amount: Some(0.0),
        max_amount: None,
        term: Some("Без срока"),
        kind: None,
        description: "Свободное пополнение и снятие",
    },
];

pub const CREDITS: [BankProduct; 2] = [
    BankProduct {
        name: "Потребительский кредит",
        rate: Some("15.9%"),
        min_amount: None,
        max_amount: Some(5_000_000.0),
        term: Some("60 месяцев"),
        kind: None,
        description: "На любые цели без залога",
    },
    BankProduct {
        name: "Ипотечный кредит",
        rate: Some("11.5%"),
        min_amount: None,
        max_amount: Some(50_000_000.0),
        term: Some("240 месяцев"),
        kind: None,
        description: "На покупку недвижимости",
    },
];

pub const ISLAMIC: [BankProduct; 2] = [
    BankProduct {
        name: "Мурабаха",
        rate: None,
        min_amount: None,
        max_amount: None,
        term: None,
        kind: Some("Торговая маржа"),
        description: "Покупка и продажа товара с согласованной наценкой",
    },
    BankProduct {
        name: "Иджара",
        rate: None,
        min_amount: None,
        max_amount: None,
        term: None,
        kind: Some("Аренда"),
        description: "Аренда имущества с последующим выкупом",
    },
];

pub const STRESS_RELIEF_TIPS: [&str; 7] = [
    "Глубокое дыхание: 5 минут медитации в день",
    "Прогулка на свежем воздухе вместо шопинга",
    "Бесплатные онлайн-курсы по хобби",
    "Ведение дневника благодарности",
    "Физические упражнения дома",
    "Чтение книг из библиотеки",
    "Встречи с друзьями на природе",
];

/// Savings-to-income ratio (in months) below which a cushion is advised
const CUSHION_MONTHS: f64 = 3.0;
/// Expense share of income above which cost cutting is advised
const EXPENSE_SHARE_LIMIT: f64 = 0.6;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monthly saving needed to close the gap, and progress so far
pub fn calculate_goal(goal: &FinancialGoal) -> Result<GoalPlan> {
    if goal.timeline_months <= 0 {
        return Err(Error::InvalidData(
            "timeline_months must be greater than 0".to_string(),
        ));
    }
    if goal.target_amount <= 0.0 {
        return Err(Error::InvalidData(
            "target_amount must be greater than 0".to_string(),
        ));
    }

    let monthly_saving = (goal.target_amount - goal.current_amount) / goal.timeline_months as f64;
    let progress_percentage = goal.current_amount / goal.target_amount * 100.0;

    Ok(GoalPlan {
        monthly_saving: round2(monthly_saving),
        progress_percentage: round2(progress_percentage),
        timeline_months: goal.timeline_months,
        recommendations: saving_recommendations(&goal.goal_type),
    })
}

/// Canned tips for a goal type; empty for types without tips
pub fn saving_recommendations(goal_type: &str) -> Vec<String> {
    let tips: &[&str] = match goal_type {
        "apartment" => &[
            "Рассмотрите ипотечную программу банка",
            "Откладывайте 20% от ежемесячного дохода",
            "Используйте накопительный счет для первоначального взноса",
        ],
        "travel" => &[
            "Планируйте путешествие заранее для лучших цен",
            "Используйте кэшбэк-программы",
            "Рассмотрите travel-вклады для накоплений",
        ],
        _ => &[],
    };
    tips.iter().map(|t| t.to_string()).collect()
}

/// Products and advice for a goal
#[derive(Debug, Clone, Serialize)]
pub struct ProductRecommendation {
    pub recommendations: Vec<BankProduct>,
    pub financial_advice: Vec<String>,
}

/// Pick products for a goal type and add profile-based advice
pub fn recommend_products(profile: &UserProfile, goal_type: &str) -> ProductRecommendation {
    let mut recommendations = Vec::new();

    match goal_type {
        "apartment" => {
            recommendations.extend(CREDITS.iter().filter(|p| p.name == "Ипотечный кредит").cloned());
            recommendations.extend(DEPOSITS.iter().take(1).cloned());
        }
        "education" => {
            recommendations.extend(
                CREDITS
                    .iter()
                    .filter(|p| p.name.contains("Потребительский"))
                    .cloned(),
            );
            recommendations.extend(DEPOSITS.iter().cloned());
        }
        _ => {}
    }

    // Islamic financing is always offered
    recommendations.extend(ISLAMIC.iter().take(1).cloned());

    ProductRecommendation {
        recommendations,
        financial_advice: financial_advice(profile),
    }
}

/// Advice from the income/expense/savings ratios
///
/// A non-positive income counts as no cushion and skips the expense check.
pub fn financial_advice(profile: &UserProfile) -> Vec<String> {
    let mut advice = Vec::new();
    let has_income = profile.monthly_income > 0.0;

    let savings_ratio = if has_income {
        profile.savings / profile.monthly_income
    } else {
        0.0
    };
    if savings_ratio < CUSHION_MONTHS {
        advice.push(
            "Рекомендуем создать финансовую подушку безопасности на 3-6 месяцев".to_string(),
        );
    }

    if has_income && profile.monthly_expenses / profile.monthly_income > EXPENSE_SHARE_LIMIT {
        advice.push("Рассмотрите оптимизацию регулярных расходов".to_string());
    }

    advice
}

/// Low-cost ways to deal with stress instead of shopping
pub fn stress_relief_tips() -> Vec<String> {
    STRESS_RELIEF_TIPS.iter().map(|t| t.to_string()).collect()
}
