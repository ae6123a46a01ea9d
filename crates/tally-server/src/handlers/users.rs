//! Identity handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};

use crate::{require_user, AppError, AppState};
use tally_core::models::User;

/// GET /api/me - The requesting user, upserted from proxy headers
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = require_user(&state, &headers)?;
    Ok(Json(user))
}
