//! Gmail import handlers
//!
//! OAuth tokens are stored per user; an import for a user whose grant is
//! missing or revoked answers with `requires_auth` and the consent URL
//! instead of an error.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{require_user, AppError, AppState, SuccessResponse};
use tally_core::gmail::{import_receipts, GmailClient};
use tally_core::Error as CoreError;

fn gmail_client(state: &AppState) -> Result<&GmailClient, AppError> {
    state
        .gmail
        .as_ref()
        .ok_or_else(|| AppError::not_found("Gmail import is not configured"))
}

/// Response carrying the consent URL
#[derive(Debug, Serialize)]
pub struct GmailAuthResponse {
    pub auth_url: String,
}

/// GET /api/gmail/auth - Consent URL for connecting a Gmail account
pub async fn gmail_auth(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GmailAuthResponse>, AppError> {
    require_user(&state, &headers)?;
    let client = gmail_client(&state)?;

    Ok(Json(GmailAuthResponse {
        auth_url: client.auth_url(),
    }))
}

/// Query params for the OAuth callback
#[derive(Debug, Deserialize)]
pub struct GmailCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// GET /api/gmail/callback - OAuth redirect target; stores the user's tokens
pub async fn gmail_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<GmailCallbackQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = require_user(&state, &headers)?;
    let client = gmail_client(&state)?;

    if let Some(error) = query.error {
        return Err(AppError::bad_request(&format!(
            "Authorization was denied: {}",
            error
        )));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::bad_request("Missing authorization code"))?;

    let tokens = client.exchange_code(&code).await?;
    state.db.store_gmail_credentials(
        &user.id,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        tokens.expires_at,
    )?;

    info!(user = %user.id, "Gmail account connected");
    state
        .db
        .log_audit("gmail_connect", &format!("user={}", user.id));

    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for an import run
#[derive(Debug, Default, Deserialize)]
pub struct GmailImportRequest {
    /// Cap on messages examined across all search queries (default 20, max 100)
    pub max_results: Option<usize>,
}

/// Response for an import run
#[derive(Debug, Serialize)]
pub struct GmailImportResponse {
    pub requires_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    pub receipts_found: usize,
    pub receipts_processed: usize,
}

/// POST /api/gmail/import - Search the user's mailbox and import receipts
pub async fn gmail_import(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<GmailImportRequest>>,
) -> Result<Json<GmailImportResponse>, AppError> {
    let user = require_user(&state, &headers)?;
    let client = gmail_client(&state)?;

    let max_results = body
        .map(|Json(b)| b.max_results)
        .unwrap_or_default()
        .unwrap_or(20)
        .clamp(1, 100);

    let result = import_receipts(
        &state.db,
        &state.ai,
        state.notifier.as_ref(),
        client,
        &user.id,
        max_results,
    )
    .await;

    match result {
        Ok(result) => {
            state.db.log_audit(
                "gmail_import",
                &format!(
                    "user={}, found={}, processed={}",
                    user.id, result.receipts_found, result.receipts_processed
                ),
            );
            Ok(Json(GmailImportResponse {
                requires_auth: false,
                auth_url: None,
                receipts_found: result.receipts_found,
                receipts_processed: result.receipts_processed,
            }))
        }
        // Missing or revoked grant: the client should redirect to consent
        Err(CoreError::AuthRequired(auth_url)) => Ok(Json(GmailImportResponse {
            requires_auth: true,
            auth_url: Some(auth_url),
            receipts_found: 0,
            receipts_processed: 0,
        })),
        Err(e) => Err(e.into()),
    }
}
