//! Receipt workflow operations

use rusqlite::{params, OptionalExtension, Row};

use super::{now_sqlite, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewExpense, Receipt, ReceiptStatus};

fn row_to_receipt(row: &Row) -> rusqlite::Result<Receipt> {
    let status_str: String = row.get(4)?;
    Ok(Receipt {
        id: row.get(0)?,
        user_id: row.get(1)?,
        object_path: row.get(2)?,
        extracted_json: row.get(3)?,
        status: status_str.parse().unwrap_or(ReceiptStatus::Pending),
        uploaded_at: parse_datetime(&row.get::<_, String>(5)?),
        processed_at: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_datetime(&s)),
    })
}

const RECEIPT_COLUMNS: &str =
    "id, user_id, object_path, extracted_json, status, uploaded_at, processed_at";

impl Database {
    /// Create a pending receipt for a stored image
    pub fn create_receipt(&self, user_id: &str, object_path: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO receipts (user_id, object_path) VALUES (?1, ?2)",
            params![user_id, object_path],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_receipt(&self, id: i64) -> Result<Option<Receipt>> {
        let conn = self.conn()?;
        let receipt = conn
            .query_row(
                &format!("SELECT {} FROM receipts WHERE id = ?1", RECEIPT_COLUMNS),
                params![id],
                row_to_receipt,
            )
            .optional()?;
        Ok(receipt)
    }

    /// A user's receipts, newest first
    pub fn list_receipts(&self, user_id: &str) -> Result<Vec<Receipt>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM receipts WHERE user_id = ?1 ORDER BY uploaded_at DESC, id DESC",
            RECEIPT_COLUMNS
        ))?;
        let receipts = stmt
            .query_map(params![user_id], row_to_receipt)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(receipts)
    }

    /// Transition a receipt's processing status
    pub fn update_receipt_status(&self, id: i64, status: ReceiptStatus) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE receipts SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(crate::error::Error::NotFound(format!("Receipt {}", id)));
        }
        Ok(())
    }

    /// Complete a receipt and insert its expenses in one transaction.
    ///
    /// Either the extraction result, the completed status, and every expense
    /// row land together, or none of them do. Returns the new expense ids.
    pub fn complete_receipt_with_expenses(
        &self,
        receipt_id: i64,
        extracted_json: &str,
        expenses: &[NewExpense],
    ) -> Result<Vec<i64>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            "UPDATE receipts
             SET extracted_json = ?1, status = 'completed', processed_at = ?2
             WHERE id = ?3",
            params![extracted_json, now_sqlite(), receipt_id],
        )?;
        if updated == 0 {
            return Err(crate::error::Error::NotFound(format!(
                "Receipt {}",
                receipt_id
            )));
        }

        let mut ids = Vec::with_capacity(expenses.len());
        for expense in expenses {
            tx.execute(
                "INSERT INTO expenses
                     (user_id, receipt_id, category_id, description, amount_cents,
                      date, vendor, notes, is_manual)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    expense.user_id,
                    expense.receipt_id,
                    expense.category_id,
                    expense.description,
                    expense.amount_cents,
                    expense.date.format("%Y-%m-%d").to_string(),
                    expense.vendor,
                    expense.notes,
                    expense.is_manual,
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;
        Ok(ids)
    }

    pub fn count_receipts(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM receipts WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}
