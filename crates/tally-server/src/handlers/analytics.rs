//! Analytics handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::{require_user, AppError, AppState};
use tally_core::db::{CategorySpending, MonthlySpending, SpendingSummary};

/// GET /api/analytics/summary - Dashboard figures
pub async fn get_spending_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SpendingSummary>, AppError> {
    let user = require_user(&state, &headers)?;
    let summary = state
        .db
        .spending_summary(&user.id, Utc::now().date_naive())?;
    Ok(Json(summary))
}

/// Query params for monthly spending
#[derive(Debug, Deserialize)]
pub struct MonthlySpendingQuery {
    /// Trailing window size in months (default 6, max 24)
    pub months: Option<u32>,
}

/// GET /api/analytics/monthly-spending - Trailing monthly totals
pub async fn get_monthly_spending(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MonthlySpendingQuery>,
) -> Result<Json<Vec<MonthlySpending>>, AppError> {
    let user = require_user(&state, &headers)?;

    let months = query.months.unwrap_or(6).clamp(1, 24);
    let rows = state
        .db
        .monthly_spending(&user.id, months, Utc::now().date_naive())?;
    Ok(Json(rows))
}

/// GET /api/analytics/by-category - Per-category totals, highest first
pub async fn get_category_spending(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CategorySpending>>, AppError> {
    let user = require_user(&state, &headers)?;
    let rows = state.db.spending_by_category(&user.id)?;
    Ok(Json(rows))
}
