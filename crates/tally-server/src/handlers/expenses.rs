//! Expense handlers
//!
//! Manual creates and updates re-run budget evaluation, so editing an
//! amount can trigger a threshold alert the same way ingestion does.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{require_user, AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use tally_core::budget::evaluate_user_budgets;
use tally_core::db::{ExpenseFilter, ExpenseUpdate};
use tally_core::models::{Expense, NewExpense};

/// Request body for creating an expense
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub category_id: Option<i64>,
    pub vendor: Option<String>,
    pub notes: Option<String>,
}

/// POST /api/expenses - Create a manual expense
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateExpenseRequest>,
) -> Result<Json<Expense>, AppError> {
    let user = require_user(&state, &headers)?;

    if body.description.trim().is_empty() {
        return Err(AppError::bad_request("Description is required"));
    }
    if body.amount_cents < 0 {
        return Err(AppError::bad_request("Amount must not be negative"));
    }
    if let Some(category_id) = body.category_id {
        state
            .db
            .get_category(category_id)?
            .ok_or_else(|| AppError::bad_request("Unknown category"))?;
    }

    let id = state.db.create_expense(&NewExpense {
        user_id: user.id.clone(),
        receipt_id: None,
        category_id: body.category_id,
        description: body.description.trim().to_string(),
        amount_cents: body.amount_cents,
        date: body.date,
        vendor: body.vendor,
        notes: body.notes,
        is_manual: true,
    })?;

    state.db.log_audit(
        "expense_create",
        &format!("user={}, expense={}, amount_cents={}", user.id, id, body.amount_cents),
    );

    evaluate_user_budgets(
        &state.db,
        state.notifier.as_ref(),
        &user.id,
        Utc::now().date_naive(),
    )
    .await?;

    let expense = state
        .db
        .get_expense(id, &user.id)?
        .ok_or_else(|| AppError::internal("Expense not found after creation"))?;

    Ok(Json(expense))
}

/// GET /api/expenses - List expenses with optional filters
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(mut filter): Query<ExpenseFilter>,
) -> Result<Json<Vec<Expense>>, AppError> {
    let user = require_user(&state, &headers)?;

    filter.limit = Some(filter.limit.unwrap_or(MAX_PAGE_LIMIT).min(MAX_PAGE_LIMIT));
    let expenses = state.db.list_expenses(&user.id, &filter)?;
    Ok(Json(expenses))
}

/// GET /api/expenses/:id - One expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, AppError> {
    let user = require_user(&state, &headers)?;

    let expense = state
        .db
        .get_expense(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    Ok(Json(expense))
}

/// PUT /api/expenses/:id - Partially update an expense
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(update): Json<ExpenseUpdate>,
) -> Result<Json<Expense>, AppError> {
    let user = require_user(&state, &headers)?;

    state
        .db
        .get_expense(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    if let Some(amount) = update.amount_cents {
        if amount < 0 {
            return Err(AppError::bad_request("Amount must not be negative"));
        }
    }
    if let Some(category_id) = update.category_id {
        state
            .db
            .get_category(category_id)?
            .ok_or_else(|| AppError::bad_request("Unknown category"))?;
    }

    let expense = state.db.update_expense(id, &user.id, &update)?;

    state
        .db
        .log_audit("expense_update", &format!("user={}, expense={}", user.id, id));

    evaluate_user_budgets(
        &state.db,
        state.notifier.as_ref(),
        &user.id,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(expense))
}

/// DELETE /api/expenses/:id - Delete an expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = require_user(&state, &headers)?;

    state
        .db
        .get_expense(id, &user.id)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    state.db.delete_expense(id, &user.id)?;

    state
        .db
        .log_audit("expense_delete", &format!("user={}, expense={}", user.id, id));

    Ok(Json(SuccessResponse { success: true }))
}
