//! Tally Web Server
//!
//! Axum-based REST API for the Tally personal expense tracker.
//!
//! Identity arrives from trusted proxy headers (`X-User-Id` plus optional
//! email and name); every data route is scoped to that user and requests
//! without the header are rejected. Receipt uploads return immediately and
//! hand extraction to the ingest worker.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use tally_core::ai::{AiBackend, AiClient};
use tally_core::db::Database;
use tally_core::gmail::GmailClient;
use tally_core::ingest::{start_ingest_worker, IngestHandle};
use tally_core::models::User;
use tally_core::notify::{LogNotifier, Notifier, SmtpNotifier};

mod handlers;

/// Maximum receipt upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Capacity of the receipt ingest queue
const INGEST_QUEUE_CAPACITY: usize = 64;

/// Proxy header carrying the authenticated user's id
const USER_ID_HEADER: &str = "x-user-id";

/// Proxy header carrying the authenticated user's email
const USER_EMAIL_HEADER: &str = "x-user-email";

/// Proxy header carrying the authenticated user's display name
const USER_NAME_HEADER: &str = "x-user-name";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Directory for storing uploaded receipt images
    pub receipts_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            receipts_dir: PathBuf::from("receipts"),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub ai: AiClient,
    pub notifier: Arc<dyn Notifier>,
    /// Submission handle for the receipt ingest queue
    pub ingest: IngestHandle,
    /// Gmail OAuth client; None when the app is not configured
    pub gmail: Option<GmailClient>,
}

/// Resolve the requesting user from proxy headers, upserting the identity
/// row on first sight. Missing `X-User-Id` rejects the request.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(AppError::unauthorized)?;

    let email = headers
        .get(USER_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    // Display name header is "First Last"; keep anything after the first
    // space as the last name
    let name = headers
        .get(USER_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let (first_name, last_name) = match name {
        Some(full) => match full.split_once(' ') {
            Some((first, last)) => (Some(first), Some(last.trim())),
            None => (Some(full), None),
        },
        None => (None, None),
    };

    let user = state.db.upsert_user(user_id, email, first_name, last_name)?;
    Ok(user)
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router, wiring AI, SMTP, and Gmail from the
/// environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let ai = match AiClient::from_env() {
        Some(client) => {
            info!(
                "AI backend configured: {} (model: {})",
                client.host(),
                client.model()
            );
            client
        }
        None => {
            warn!("AI backend not configured, using mock responses (set AI_HOST / AI_API_KEY)");
            AiClient::mock()
        }
    };

    let notifier: Arc<dyn Notifier> = match SmtpNotifier::from_env() {
        Some(Ok(smtp)) => {
            info!("SMTP notifier configured, budget alerts will be emailed");
            Arc::new(smtp)
        }
        Some(Err(e)) => {
            warn!(error = %e, "Invalid SMTP configuration, budget alerts will only be logged");
            Arc::new(LogNotifier)
        }
        None => {
            info!("SMTP not configured, budget alerts will only be logged (set SMTP_HOST)");
            Arc::new(LogNotifier)
        }
    };

    create_router_with_options(db, config, ai, notifier)
}

/// Create the application router with explicit AI and notifier adapters
/// (for testing)
pub fn create_router_with_options(
    db: Database,
    config: ServerConfig,
    ai: AiClient,
    notifier: Arc<dyn Notifier>,
) -> Router {
    let gmail = GmailClient::from_env();
    if gmail.is_none() {
        info!("Gmail import not configured (set GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET / GMAIL_REDIRECT_URI)");
    }

    let ingest = start_ingest_worker(
        db.clone(),
        ai.clone(),
        notifier.clone(),
        config.receipts_dir.clone(),
        INGEST_QUEUE_CAPACITY,
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        ai,
        notifier,
        ingest,
        gmail,
    });

    let api_routes = Router::new()
        // Identity
        .route("/me", get(handlers::get_me))
        // Health
        .route("/health", get(handlers::health))
        // Categories
        .route("/categories", get(handlers::list_categories))
        // Receipts
        .route(
            "/receipts",
            get(handlers::list_receipts).post(handlers::upload_receipt),
        )
        .route("/receipts/:id", get(handlers::get_receipt))
        // Expenses
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route(
            "/expenses/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        // Budget goals
        .route(
            "/budget-goals",
            get(handlers::list_budget_goals).post(handlers::create_budget_goal),
        )
        .route(
            "/budget-goals/:id",
            get(handlers::get_budget_goal)
                .put(handlers::update_budget_goal)
                .delete(handlers::delete_budget_goal),
        )
        // Analytics
        .route("/analytics/summary", get(handlers::get_spending_summary))
        .route(
            "/analytics/monthly-spending",
            get(handlers::get_monthly_spending),
        )
        .route(
            "/analytics/by-category",
            get(handlers::get_category_spending),
        )
        // Assistant
        .route("/assistant/chat", post(handlers::assistant_chat))
        .route("/assistant/conversation", get(handlers::get_conversation))
        // Gmail import
        .route("/gmail/auth", get(handlers::gmail_auth))
        .route("/gmail/callback", get(handlers::gmail_callback))
        .route("/gmail/import", post(handlers::gmail_import));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let seeded = db.seed_default_categories()?;
    if seeded > 0 {
        info!("Seeded {} default categories", seeded);
    }

    check_ai_connection().await;

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AiClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(
                    "AI backend connected: {} (model: {})",
                    client.host(),
                    client.model()
                );
            } else {
                warn!(
                    "AI backend configured but not responding: {} (model: {})",
                    client.host(),
                    client.model()
                );
            }
        }
        None => {
            info!("AI backend not configured (set AI_HOST to enable extraction)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
