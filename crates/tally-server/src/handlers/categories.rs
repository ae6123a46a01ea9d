//! Category handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};

use crate::{require_user, AppError, AppState};
use tally_core::models::Category;

/// GET /api/categories - All categories, alphabetical
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Category>>, AppError> {
    require_user(&state, &headers)?;
    let categories = state.db.list_categories()?;
    Ok(Json(categories))
}
