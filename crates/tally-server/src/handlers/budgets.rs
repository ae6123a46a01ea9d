//! Budget goal handlers
//!
//! Responses carry spend computed over the goal's current evaluation
//! window; nothing here writes a spent column.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{require_user, AppError, AppState, SuccessResponse};
use tally_core::budget::{goal_spent, goals_with_spent};
use tally_core::db::BudgetGoalUpdate;
use tally_core::models::{BudgetGoal, BudgetGoalWithSpent, BudgetPeriod, NewBudgetGoal};
use tally_core::money::format_percentage;

/// Request body for creating a budget goal
#[derive(Debug, Deserialize)]
pub struct CreateBudgetGoalRequest {
    pub name: String,
    pub amount_cents: i64,
    pub category_id: Option<i64>,
    pub period: Option<BudgetPeriod>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub email_alerts: Option<bool>,
    pub alert_threshold: Option<f64>,
}

fn with_spent(
    state: &AppState,
    goal: BudgetGoal,
    today: NaiveDate,
) -> Result<BudgetGoalWithSpent, AppError> {
    let spent_cents = goal_spent(&state.db, &goal, today)?;
    let percentage = format_percentage(spent_cents, goal.amount_cents);
    Ok(BudgetGoalWithSpent {
        goal,
        spent_cents,
        percentage,
    })
}

/// POST /api/budget-goals - Create a budget goal
pub async fn create_budget_goal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBudgetGoalRequest>,
) -> Result<Json<BudgetGoalWithSpent>, AppError> {
    let user = require_user(&state, &headers)?;

    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    if body.amount_cents <= 0 {
        return Err(AppError::bad_request("Budget amount must be positive"));
    }
    let alert_threshold = body.alert_threshold.unwrap_or(80.0);
    if !(0.0..=100.0).contains(&alert_threshold) {
        return Err(AppError::bad_request(
            "Alert threshold must be between 0 and 100",
        ));
    }
    if let Some(category_id) = body.category_id {
        state
            .db
            .get_category(category_id)?
            .ok_or_else(|| AppError::bad_request("Unknown category"))?;
    }

    let today = Utc::now().date_naive();
    let id = state.db.create_budget_goal(&NewBudgetGoal {
        user_id: user.id.clone(),
        category_id: body.category_id,
        name: body.name.trim().to_string(),
        amount_cents: body.amount_cents,
        period: body.period.unwrap_or(BudgetPeriod::Monthly),
        start_date: body.start_date.unwrap_or(today),
        end_date: body.end_date,
        is_active: true,
        email_alerts: body.email_alerts.unwrap_or(true),
        alert_threshold,
    })?;

    state
        .db
        .log_audit("budget_goal_create", &format!("user={}, goal={}", user.id, id));

    let goal = state
        .db
        .get_budget_goal(id, &user.id)?
        .ok_or_else(|| AppError::internal("Budget goal not found after creation"))?;

    Ok(Json(with_spent(&state, goal, today)?))
}

/// GET /api/budget-goals - All goals with computed spend
pub async fn list_budget_goals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BudgetGoalWithSpent>>, AppError> {
    let user = require_user(&state, &headers)?;
    let goals = goals_with_spent(&state.db, &user.id, Utc::now().date_naive())?;
    Ok(Json(goals))
}

/// GET /api/budget-goals/:id - One goal with computed spend
pub async fn get_budget_goal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<BudgetGoalWithSpent>, AppError> {
    let user = require_user(&state, &headers)?;

    let goal = state
        .db
        .get_budget_goal(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Budget goal not found"))?;

    Ok(Json(with_spent(&state, goal, Utc::now().date_naive())?))
}

/// PUT /api/budget-goals/:id - Partially update a goal
pub async fn update_budget_goal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(update): Json<BudgetGoalUpdate>,
) -> Result<Json<BudgetGoalWithSpent>, AppError> {
    let user = require_user(&state, &headers)?;

    state
        .db
        .get_budget_goal(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Budget goal not found"))?;

    if let Some(amount) = update.amount_cents {
        if amount <= 0 {
            return Err(AppError::bad_request("Budget amount must be positive"));
        }
    }
    if let Some(threshold) = update.alert_threshold {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AppError::bad_request(
                "Alert threshold must be between 0 and 100",
            ));
        }
    }

    let goal = state.db.update_budget_goal(id, &user.id, &update)?;

    state
        .db
        .log_audit("budget_goal_update", &format!("user={}, goal={}", user.id, id));

    Ok(Json(with_spent(&state, goal, Utc::now().date_naive())?))
}

/// DELETE /api/budget-goals/:id - Delete a goal
pub async fn delete_budget_goal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = require_user(&state, &headers)?;

    state
        .db
        .get_budget_goal(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Budget goal not found"))?;

    state.db.delete_budget_goal(id, &user.id)?;

    state
        .db
        .log_audit("budget_goal_delete", &format!("user={}, goal={}", user.id, id));

    Ok(Json(SuccessResponse { success: true }))
}
