//! Receipt ingestion coordinator
//!
//! Uploads return immediately; extraction happens out of band. The queue is
//! an explicit seam: handlers enqueue `IngestJob`s onto a bounded channel
//! and a single worker task drains it. A job either completes its receipt
//! (extraction stored, expenses inserted, all in one transaction) or marks
//! it failed; there are no partial writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::ai::{AiBackend, AiClient, CategorySuggestion, ExtractedReceipt};
use crate::budget::evaluate_user_budgets;
use crate::db::{Database, FALLBACK_CATEGORY};
use crate::error::{Error, Result};
use crate::models::{NewExpense, ReceiptStatus};
use crate::notify::Notifier;

/// One unit of ingestion work
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub receipt_id: i64,
    pub user_id: String,
}

/// Submission side of the ingest queue
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestJob>,
}

impl IngestHandle {
    /// Submit a job. Errors only if the worker has shut down.
    pub async fn enqueue(&self, job: IngestJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| Error::InvalidData("Ingest worker is not running".to_string()))
    }
}

/// Spawn the ingest worker and return a handle for submitting jobs.
///
/// The worker drains the channel until every handle is dropped. A job that
/// fails is logged and the receipt marked failed; the worker itself never
/// stops on a bad job.
pub fn start_ingest_worker(
    db: Database,
    ai: AiClient,
    notifier: Arc<dyn Notifier>,
    receipts_dir: PathBuf,
    capacity: usize,
) -> IngestHandle {
    let (tx, mut rx) = mpsc::channel::<IngestJob>(capacity);

    tokio::spawn(async move {
        info!(model = %ai.model(), "Ingest worker started");
        while let Some(job) = rx.recv().await {
            let receipt_id = job.receipt_id;
            if let Err(e) =
                process_receipt(&db, &ai, notifier.as_ref(), &receipts_dir, &job).await
            {
                error!(receipt = receipt_id, error = %e, "Ingest job failed");
                if let Err(mark_err) =
                    db.update_receipt_status(receipt_id, ReceiptStatus::Failed)
                {
                    error!(receipt = receipt_id, error = %mark_err, "Could not mark receipt failed");
                }
            }
        }
        info!("Ingest worker stopped");
    });

    IngestHandle { tx }
}

/// Guess a MIME type from the stored file extension
fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Run the full pipeline for one receipt.
///
/// Public so tests (and the email importer's attachment path) can drive
/// ingestion synchronously instead of through the queue.
pub async fn process_receipt(
    db: &Database,
    ai: &AiClient,
    notifier: &dyn Notifier,
    receipts_dir: &Path,
    job: &IngestJob,
) -> Result<()> {
    db.update_receipt_status(job.receipt_id, ReceiptStatus::Processing)?;

    let receipt = db
        .get_receipt(job.receipt_id)?
        .ok_or_else(|| Error::NotFound(format!("Receipt {}", job.receipt_id)))?;

    let image_path = receipts_dir.join(&receipt.object_path);
    let image_data = match tokio::fs::read(&image_path).await {
        Ok(data) => data,
        Err(e) => {
            warn!(
                receipt = job.receipt_id,
                path = %image_path.display(),
                error = %e,
                "Receipt image unreadable, marking failed"
            );
            db.update_receipt_status(job.receipt_id, ReceiptStatus::Failed)?;
            return Ok(());
        }
    };

    let extracted = match ai
        .extract_receipt(&image_data, mime_for_path(&image_path))
        .await
    {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(
                receipt = job.receipt_id,
                error = %e,
                "Receipt extraction failed, marking failed"
            );
            db.update_receipt_status(job.receipt_id, ReceiptStatus::Failed)?;
            return Ok(());
        }
    };

    let inserted =
        persist_extraction(db, ai, &job.user_id, job.receipt_id, &extracted).await?;
    info!(
        receipt = job.receipt_id,
        vendor = %extracted.vendor,
        expenses = inserted,
        "Receipt processed"
    );

    // The receipt is committed at this point; an alerting failure must not
    // rewind it to failed.
    if let Err(e) =
        evaluate_user_budgets(db, notifier, &job.user_id, Utc::now().date_naive()).await
    {
        warn!(
            receipt = job.receipt_id,
            error = %e,
            "Budget evaluation failed after receipt completion"
        );
    }
    Ok(())
}

/// Categorize a normalized extraction's line items and persist the receipt
/// completion plus all expense rows in one transaction. Returns the number
/// of expenses inserted.
pub async fn persist_extraction(
    db: &Database,
    ai: &AiClient,
    user_id: &str,
    receipt_id: i64,
    extracted: &ExtractedReceipt,
) -> Result<usize> {
    let mut expenses = Vec::with_capacity(extracted.items.len());
    for item in &extracted.items {
        let suggestion = categorize_item(ai, &item.description, &extracted.vendor).await;
        let category_id = db.resolve_category(&suggestion.category)?;
        expenses.push(NewExpense {
            user_id: user_id.to_string(),
            receipt_id: Some(receipt_id),
            category_id,
            description: item.description.clone(),
            amount_cents: item.amount_cents,
            date: extracted.date,
            vendor: Some(extracted.vendor.clone()),
            notes: None,
            is_manual: false,
        });
    }

    let extracted_json = serde_json::to_string(extracted)?;
    let ids = db.complete_receipt_with_expenses(receipt_id, &extracted_json, &expenses)?;
    Ok(ids.len())
}

/// Categorize one line item, degrading to the fallback category when the
/// adapter fails. The two outcomes log differently: a confident fallback
/// from the model keeps its reported confidence, an adapter failure logs a
/// warning and carries confidence 0.0.
async fn categorize_item(ai: &AiClient, description: &str, vendor: &str) -> CategorySuggestion {
    match ai.categorize_expense(description, vendor).await {
        Ok(suggestion) => suggestion,
        Err(e) => {
            warn!(
                item = %description,
                error = %e,
                "Categorization adapter failed, defaulting to {}",
                FALLBACK_CATEGORY
            );
            CategorySuggestion {
                category: FALLBACK_CATEGORY.to_string(),
                confidence: 0.0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBudgetGoal;
    use crate::notify::RecordingNotifier;
    use chrono::NaiveDate;

    struct Fixture {
        db: Database,
        ai: AiClient,
        notifier: RecordingNotifier,
        dir: tempfile::TempDir,
    }

    fn setup() -> Fixture {
        let db = Database::in_memory().unwrap();
        db.seed_default_categories().unwrap();
        db.upsert_user("u1", Some("jo@example.com"), Some("Jo"), None)
            .unwrap();
        Fixture {
            db,
            ai: AiClient::mock(),
            notifier: RecordingNotifier::new(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn stage_image(fixture: &Fixture, user: &str, name: &str, contents: &[u8]) -> IngestJob {
        std::fs::write(fixture.dir.path().join(name), contents).unwrap();
        let receipt_id = fixture.db.create_receipt(user, name).unwrap();
        IngestJob {
            receipt_id,
            user_id: user.to_string(),
        }
    }

    #[tokio::test]
    async fn test_process_receipt_creates_categorized_expenses() {
        let f = setup();
        let job = stage_image(&f, "u1", "grocery.jpg", b"grocery receipt image");

        process_receipt(&f.db, &f.ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let receipt = f.db.get_receipt(job.receipt_id).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Completed);
        assert!(receipt.processed_at.is_some());
        assert!(receipt.extracted_json.is_some());

        let expenses = f
            .db
            .list_expenses("u1", &crate::db::ExpenseFilter::default())
            .unwrap();
        assert_eq!(expenses.len(), 3);
        assert!(expenses.iter().all(|e| !e.is_manual));
        assert!(expenses.iter().all(|e| e.receipt_id == Some(job.receipt_id)));
        assert!(expenses.iter().all(|e| e.vendor.as_deref() == Some("Fresh Foods Market")));

        // Mock categorizes grocery items into Groceries
        let groceries = f.db.get_category_by_name("Groceries").unwrap().unwrap();
        assert!(expenses.iter().any(|e| e.category_id == Some(groceries.id)));
    }

    #[tokio::test]
    async fn test_empty_extraction_completes_with_no_expenses() {
        let f = setup();
        let job = stage_image(&f, "u1", "empty.jpg", b"empty receipt");

        process_receipt(&f.db, &f.ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let receipt = f.db.get_receipt(job.receipt_id).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Completed);
        let expenses = f
            .db
            .list_expenses("u1", &crate::db::ExpenseFilter::default())
            .unwrap();
        assert!(expenses.is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_marks_failed_without_partial_writes() {
        let f = setup();
        let ai = AiClient::mock_unhealthy();
        let job = stage_image(&f, "u1", "receipt.jpg", b"some image");

        process_receipt(&f.db, &ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let receipt = f.db.get_receipt(job.receipt_id).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert!(receipt.extracted_json.is_none());
        let expenses = f
            .db
            .list_expenses("u1", &crate::db::ExpenseFilter::default())
            .unwrap();
        assert!(expenses.is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_marks_failed() {
        let f = setup();
        let receipt_id = f.db.create_receipt("u1", "nonexistent.jpg").unwrap();
        let job = IngestJob {
            receipt_id,
            user_id: "u1".to_string(),
        };

        process_receipt(&f.db, &f.ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let receipt = f.db.get_receipt(receipt_id).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
    }

    #[tokio::test]
    async fn test_ingestion_triggers_budget_alert() {
        let f = setup();
        // Mock grocery extraction totals $42.50; an unscoped $50 goal at 80% trips
        f.db.create_budget_goal(&NewBudgetGoal {
            user_id: "u1".to_string(),
            category_id: None,
            name: "Tight Budget".to_string(),
            amount_cents: 5000,
            period: crate::models::BudgetPeriod::Monthly,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: None,
            is_active: true,
            email_alerts: true,
            alert_threshold: 80.0,
        })
        .unwrap();

        let job = stage_image(&f, "u1", "grocery.jpg", b"grocery receipt image");
        process_receipt(&f.db, &f.ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let alerts = f.notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].goal_name, "Tight Budget");
        assert_eq!(alerts[0].spent_cents, 4250);
    }

    #[tokio::test]
    async fn test_budget_evaluation_failure_keeps_receipt_completed() {
        let f = setup();
        let job = stage_image(&f, "u1", "grocery.jpg", b"grocery receipt image");

        // Break the alerting step after the completion transaction commits
        f.db.conn()
            .unwrap()
            .execute_batch("DROP TABLE budget_goals;")
            .unwrap();

        process_receipt(&f.db, &f.ai, &f.notifier, f.dir.path(), &job)
            .await
            .unwrap();

        let receipt = f.db.get_receipt(job.receipt_id).unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Completed);
        let expenses = f
            .db
            .list_expenses("u1", &crate::db::ExpenseFilter::default())
            .unwrap();
        assert_eq!(expenses.len(), 3);
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let f = setup();
        let job = stage_image(&f, "u1", "coffee.jpg", b"cafe receipt");
        let handle = start_ingest_worker(
            f.db.clone(),
            f.ai.clone(),
            Arc::new(RecordingNotifier::new()),
            f.dir.path().to_path_buf(),
            8,
        );

        handle.enqueue(job.clone()).await.unwrap();

        // Poll until the worker finishes the job
        let mut status = ReceiptStatus::Pending;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            status = f.db.get_receipt(job.receipt_id).unwrap().unwrap().status;
            if status == ReceiptStatus::Completed {
                break;
            }
        }
        assert_eq!(status, ReceiptStatus::Completed);
    }
}
