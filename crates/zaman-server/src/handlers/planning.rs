//! Goal planning and product recommendation handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{current_user, read_json, AppError, AppState};
use zaman_core::planning::{
    calculate_goal as plan_goal, recommend_products as recommend, stress_relief_tips as tips,
    FinancialGoal, GoalPlan, ProductRecommendation, UserProfile,
};

/// Request body for product recommendations
#[derive(Debug, Deserialize)]
pub struct RecommendProductsRequest {
    pub user_profile: UserProfile,
    pub goal_type: String,
}

/// Stress relief tips
#[derive(Debug, Serialize)]
pub struct StressReliefTipsResponse {
    pub tips: Vec<String>,
}

/// POST /api/calculate-goal - Monthly saving plan for a goal
pub async fn calculate_goal(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<GoalPlan>, AppError> {
    let user = current_user(&request)?;
    let goal: FinancialGoal = read_json(request).await?;

    let plan = plan_goal(&goal).map_err(AppError::from_core)?;

    state.db.log_audit(
        &user.username,
        "calculate",
        Some("goal"),
        None,
        Some(&format!("goal_type={}", goal.goal_type)),
    )?;

    Ok(Json(plan))
}

/// POST /api/recommend-products - Products and advice for a profile
pub async fn recommend_products(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ProductRecommendation>, AppError> {
    let user = current_user(&request)?;
    let req: RecommendProductsRequest = read_json(request).await?;

    let recommendation = recommend(&req.user_profile, &req.goal_type);

    state.db.log_audit(
        &user.username,
        "recommend",
        Some("product"),
        None,
        Some(&format!(
            "goal_type={}, count={}",
            req.goal_type,
            recommendation.recommendations.len()
        )),
    )?;

    Ok(Json(recommendation))
}

/// GET /api/stress-relief-tips - Tips for money-related stress
pub async fn stress_relief_tips() -> Json<StressReliefTipsResponse> {
    Json(StressReliefTipsResponse { tips: tips() })
}
