//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::time::Duration;
use tally_core::db::Database;
use tally_core::models::ReceiptStatus;
use tally_core::notify::RecordingNotifier;
use tempfile::TempDir;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Database, TempDir) {
    setup_with_notifier(Arc::new(LogNotifier))
}

fn setup_with_notifier(notifier: Arc<dyn Notifier>) -> (Router, Database, TempDir) {
    let db = Database::in_memory().unwrap();
    db.seed_default_categories().unwrap();
    let receipts_dir = TempDir::new().unwrap();
    let config = ServerConfig {
        allowed_origins: vec![],
        receipts_dir: receipts_dir.path().to_path_buf(),
    };
    let app = create_router_with_options(db.clone(), config, AiClient::mock(), notifier);
    (app, db, receipts_dir)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", "u1")
        .header("x-user-email", "jo@example.com")
        .header("x-user-name", "Jo Doe")
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", "u1")
        .header("x-user-email", "jo@example.com")
        .header("x-user-name", "Jo Doe")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn put_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("x-user-id", "u1")
        .header("x-user-email", "jo@example.com")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("x-user-id", "u1")
        .body(Body::empty())
        .unwrap()
}

// ========== Identity ==========

#[tokio::test]
async fn test_me_requires_user_header() {
    let (app, _db, _dir) = setup_test_app();

    let response = app
        .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_upserts_identity() {
    let (app, db, _dir) = setup_test_app();

    let response = app.oneshot(get("/api/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["id"], "u1");
    assert_eq!(json["email"], "jo@example.com");
    assert_eq!(json["first_name"], "Jo");
    assert_eq!(json["last_name"], "Doe");

    assert!(db.get_user("u1").unwrap().is_some());
}

// ========== Categories ==========

#[tokio::test]
async fn test_list_categories() {
    let (app, _db, _dir) = setup_test_app();

    let response = app.oneshot(get("/api/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let categories = json.as_array().unwrap();
    assert_eq!(categories.len(), 14);
    assert!(categories.iter().any(|c| c["name"] == "Groceries"));
}

// ========== Expenses ==========

#[tokio::test]
async fn test_create_and_get_expense() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({
        "description": "Lunch",
        "amount_cents": 1250,
        "date": "2025-06-05",
        "vendor": "Corner Cafe"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["description"], "Lunch");
    assert_eq!(json["amount_cents"], 1250);
    assert_eq!(json["is_manual"], true);
    let id = json["id"].as_i64().unwrap();

    let response = app
        .oneshot(get(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_expense_validation() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({
        "description": "  ",
        "amount_cents": 100,
        "date": "2025-06-05"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({
        "description": "Refund",
        "amount_cents": -100,
        "date": "2025-06-05"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({
        "description": "Lunch",
        "amount_cents": 100,
        "date": "2025-06-05",
        "category_id": 9999
    });
    let response = app
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_expenses_with_filters() {
    let (app, db, _dir) = setup_test_app();
    let groceries = db.get_category_by_name("Groceries").unwrap().unwrap();

    for (desc, cat, date) in [
        ("Milk", Some(groceries.id), "2025-06-01"),
        ("Taxi", None, "2025-06-10"),
        ("Bread", Some(groceries.id), "2025-07-01"),
    ] {
        let body = serde_json::json!({
            "description": desc,
            "amount_cents": 500,
            "date": date,
            "category_id": cat
        });
        let response = app
            .clone()
            .oneshot(post_json("/api/expenses", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get(&format!("/api/expenses?category_id={}", groceries.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(get("/api/expenses?start_date=2025-06-01&end_date=2025-06-30"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_and_delete_expense() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({
        "description": "Lunch",
        "amount_cents": 1000,
        "date": "2025-06-05"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let update = serde_json::json!({ "amount_cents": 2000, "notes": "team lunch" });
    let response = app
        .clone()
        .oneshot(put_json(&format!("/api/expenses/{}", id), &update))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount_cents"], 2000);
    assert_eq!(json["notes"], "team lunch");
    assert_eq!(json["description"], "Lunch");

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/expenses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expenses_scoped_to_user() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({
        "description": "Lunch",
        "amount_cents": 1000,
        "date": "2025-06-05"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    // A different user cannot see it
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/expenses/{}", id))
                .header("x-user-id", "someone-else")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Budget goals ==========

#[tokio::test]
async fn test_create_budget_goal_defaults_and_spent() {
    let (app, _db, _dir) = setup_test_app();

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let body = serde_json::json!({
        "description": "Groceries run",
        "amount_cents": 3000,
        "date": today
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = serde_json::json!({
        "name": "Everything",
        "amount_cents": 10000
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/budget-goals", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["period"], "monthly");
    assert_eq!(json["alert_threshold"], 80.0);
    assert_eq!(json["email_alerts"], true);
    assert_eq!(json["spent_cents"], 3000);
    assert_eq!(json["percentage"], "30.0");
}

#[tokio::test]
async fn test_budget_goal_validation() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({ "name": "Bad", "amount_cents": 0 });
    let response = app
        .clone()
        .oneshot(post_json("/api/budget-goals", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({
        "name": "Bad",
        "amount_cents": 1000,
        "alert_threshold": 150.0
    });
    let response = app
        .oneshot(post_json("/api/budget-goals", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_budget_goal() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({ "name": "Dining", "amount_cents": 5000 });
    let response = app
        .clone()
        .oneshot(post_json("/api/budget-goals", &body))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let update = serde_json::json!({ "amount_cents": 6000, "period": "weekly" });
    let response = app
        .clone()
        .oneshot(put_json(&format!("/api/budget-goals/{}", id), &update))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount_cents"], 6000);
    assert_eq!(json["period"], "weekly");

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/budget-goals/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/budget-goals/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_expense_triggers_budget_alert() {
    let recorder = Arc::new(RecordingNotifier::new());
    let (app, _db, _dir) = setup_with_notifier(recorder.clone());

    let body = serde_json::json!({
        "name": "Monthly Spending",
        "amount_cents": 5000,
        "alert_threshold": 80.0
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/budget-goals", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let body = serde_json::json!({
        "description": "Big purchase",
        "amount_cents": 4500,
        "date": today
    });
    let response = app
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let alerts = recorder.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].goal_name, "Monthly Spending");
    assert_eq!(alerts[0].user_email, "jo@example.com");
    assert_eq!(alerts[0].spent_cents, 4500);
}

// ========== Receipts ==========

#[tokio::test]
async fn test_upload_receipt_and_ingest() {
    let (app, db, _dir) = setup_test_app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts")
                .header("x-user-id", "u1")
                .header("x-user-email", "jo@example.com")
                .header("content-type", "image/jpeg")
                .body(Body::from("grocery receipt image bytes"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let receipt_id = json["receipt_id"].as_i64().unwrap();
    assert!(json["object_path"].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(json["status"], "pending");

    // The worker picks the job up asynchronously
    let mut status = ReceiptStatus::Pending;
    for _ in 0..100 {
        status = db.get_receipt(receipt_id).unwrap().unwrap().status;
        if status == ReceiptStatus::Completed || status == ReceiptStatus::Failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, ReceiptStatus::Completed);

    // The mock grocery extraction carries three line items
    let response = app.oneshot(get("/api/expenses")).await.unwrap();
    let json = get_body_json(response).await;
    let expenses = json.as_array().unwrap();
    assert_eq!(expenses.len(), 3);
    assert!(expenses.iter().all(|e| e["is_manual"] == false));
    assert!(expenses.iter().all(|e| e["vendor"] == "Fresh Foods Market"));
}

#[tokio::test]
async fn test_upload_receipt_empty_body() {
    let (app, _db, _dir) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts")
                .header("x-user-id", "u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_receipt_scoped_to_user() {
    let (app, db, _dir) = setup_test_app();
    db.upsert_user("other", None, None, None).unwrap();
    let receipt_id = db.create_receipt("other", "x.jpg").unwrap();

    let response = app
        .oneshot(get(&format!("/api/receipts/{}", receipt_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Analytics ==========

#[tokio::test]
async fn test_analytics_endpoints() {
    let (app, _db, _dir) = setup_test_app();

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let body = serde_json::json!({
        "description": "Coffee",
        "amount_cents": 450,
        "date": today
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/expenses", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/analytics/summary"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["total_this_month_cents"], 450);

    let response = app
        .clone()
        .oneshot(get("/api/analytics/monthly-spending?months=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(!json.as_array().unwrap().is_empty());

    let response = app
        .oneshot(get("/api/analytics/by-category"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json[0]["total_cents"], 450);
}

// ========== Assistant ==========

#[tokio::test]
async fn test_assistant_chat_and_history() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({ "message": "How am I doing this month?" });
    let response = app
        .clone()
        .oneshot(post_json("/api/assistant/chat", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(!json["reply"].as_str().unwrap().is_empty());
    let conversation_id = json["conversation_id"].as_i64().unwrap();

    let response = app
        .oneshot(get("/api/assistant/conversation"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["conversation_id"], conversation_id);
    let messages = json["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
}

#[tokio::test]
async fn test_assistant_chat_empty_message() {
    let (app, _db, _dir) = setup_test_app();

    let body = serde_json::json!({ "message": "   " });
    let response = app
        .oneshot(post_json("/api/assistant/chat", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Gmail ==========

#[tokio::test]
async fn test_gmail_endpoints_unconfigured() {
    let (app, _db, _dir) = setup_test_app();

    let response = app.clone().oneshot(get("/api/gmail/auth")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = serde_json::json!({ "max_results": 10 });
    let response = app
        .oneshot(post_json("/api/gmail/import", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Health ==========

#[tokio::test]
async fn test_health() {
    let (app, _db, _dir) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ai_healthy"], true);
    assert_eq!(json["ai_model"], "mock");
}
