//! Assistant handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{require_user, AppError, AppState};
use tally_core::assistant::chat_turn;
use tally_core::models::ChatMessage;

/// Request body for a chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Response for a chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: i64,
}

/// POST /api/assistant/chat - One conversational turn over the user's data
pub async fn assistant_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let user = require_user(&state, &headers)?;

    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::bad_request("Message is required"));
    }

    let (reply, conversation_id) = chat_turn(
        &state.db,
        &state.ai,
        &user.id,
        message,
        Utc::now().date_naive(),
    )
    .await?;

    Ok(Json(ChatResponse {
        reply,
        conversation_id,
    }))
}

/// Response for conversation history
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: Option<i64>,
    pub messages: Vec<ChatMessage>,
}

/// GET /api/assistant/conversation - The latest conversation's history
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ConversationResponse>, AppError> {
    let user = require_user(&state, &headers)?;

    let response = match state.db.latest_conversation(&user.id)? {
        Some(conversation) => ConversationResponse {
            messages: state.db.list_chat_messages(conversation.id)?,
            conversation_id: Some(conversation.id),
        },
        None => ConversationResponse {
            conversation_id: None,
            messages: vec![],
        },
    };

    Ok(Json(response))
}
