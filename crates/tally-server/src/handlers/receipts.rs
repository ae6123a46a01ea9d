//! Receipt handlers
//!
//! Upload stores the image and a pending receipt row, then enqueues an
//! ingest job; extraction happens out of band and the row's status tracks
//! its progress.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::header,
    Json,
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{require_user, AppError, AppState, MAX_UPLOAD_SIZE};
use tally_core::ingest::IngestJob;
use tally_core::models::{Receipt, ReceiptStatus};

/// Response for receipt upload
#[derive(Debug, Serialize)]
pub struct ReceiptUploadResponse {
    pub receipt_id: i64,
    pub object_path: String,
    pub status: ReceiptStatus,
}

/// Image file extension for a request content type
fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "jpg",
    }
}

/// POST /api/receipts - Upload a receipt image (raw body)
pub async fn upload_receipt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ReceiptUploadResponse>, AppError> {
    let user = require_user(&state, request.headers())?;

    let ext = extension_for_content_type(
        request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
    );

    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or file too large (max 10MB)"))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("No image data provided"));
    }

    let receipts_dir = &state.config.receipts_dir;
    if !receipts_dir.exists() {
        std::fs::create_dir_all(receipts_dir).map_err(|e| {
            AppError::internal(&format!("Failed to create receipts directory: {}", e))
        })?;
    }

    // Content-addressed filename; identical bytes land on the same file
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let object_path = format!("{}.{}", hex::encode(hasher.finalize()), ext);

    std::fs::write(receipts_dir.join(&object_path), &bytes)
        .map_err(|e| AppError::internal(&format!("Failed to save receipt image: {}", e)))?;

    let receipt_id = state.db.create_receipt(&user.id, &object_path)?;

    state
        .ingest
        .enqueue(IngestJob {
            receipt_id,
            user_id: user.id.clone(),
        })
        .await
        .map_err(|e| AppError::internal(&format!("Failed to queue receipt: {}", e)))?;

    state.db.log_audit(
        "receipt_upload",
        &format!("user={}, receipt={}, path={}", user.id, receipt_id, object_path),
    );

    Ok(Json(ReceiptUploadResponse {
        receipt_id,
        object_path,
        status: ReceiptStatus::Pending,
    }))
}

/// GET /api/receipts - The user's receipts, newest first
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Vec<Receipt>>, AppError> {
    let user = require_user(&state, &headers)?;
    let receipts = state.db.list_receipts(&user.id)?;
    Ok(Json(receipts))
}

/// GET /api/receipts/:id - One receipt with its extraction status
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Receipt>, AppError> {
    let user = require_user(&state, &headers)?;

    let receipt = state
        .db
        .get_receipt(id)?
        .filter(|r| r.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Receipt not found"))?;

    Ok(Json(receipt))
}
