//! Expense CRUD

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use serde::Deserialize;

use super::{now_sqlite, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Expense, NewExpense};

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        receipt_id: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        amount_cents: row.get(5)?,
        date: parse_date(&row.get::<_, String>(6)?),
        vendor: row.get(7)?,
        notes: row.get(8)?,
        is_manual: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
        updated_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}

const EXPENSE_COLUMNS: &str = "id, user_id, receipt_id, category_id, description, amount_cents, \
                               date, vendor, notes, is_manual, created_at, updated_at";

/// Optional filters for listing expenses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    pub category_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Partial update for an expense; None leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseUpdate {
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub date: Option<NaiveDate>,
    pub category_id: Option<i64>,
    pub vendor: Option<String>,
    pub notes: Option<String>,
}

impl Database {
    pub fn create_expense(&self, expense: &NewExpense) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
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
        Ok(conn.last_insert_rowid())
    }

    pub fn get_expense(&self, id: i64, user_id: &str) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2",
                    EXPENSE_COLUMNS
                ),
                params![id, user_id],
                row_to_expense,
            )
            .optional()?;
        Ok(expense)
    }

    /// A user's expenses, newest first, with optional filters
    pub fn list_expenses(&self, user_id: &str, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
        let conn = self.conn()?;

        let mut sql = format!(
            "SELECT {} FROM expenses WHERE user_id = ?1",
            EXPENSE_COLUMNS
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if let Some(category_id) = filter.category_id {
            values.push(Box::new(category_id));
            sql.push_str(&format!(" AND category_id = ?{}", values.len()));
        }
        if let Some(start) = filter.start_date {
            values.push(Box::new(start.format("%Y-%m-%d").to_string()));
            sql.push_str(&format!(" AND date >= ?{}", values.len()));
        }
        if let Some(end) = filter.end_date {
            values.push(Box::new(end.format("%Y-%m-%d").to_string()));
            sql.push_str(&format!(" AND date <= ?{}", values.len()));
        }

        sql.push_str(" ORDER BY date DESC, id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let expenses = stmt
            .query_map(params_ref.as_slice(), row_to_expense)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(expenses)
    }

    /// Apply a partial update. Returns the updated row.
    pub fn update_expense(
        &self,
        id: i64,
        user_id: &str,
        update: &ExpenseUpdate,
    ) -> Result<Expense> {
        let existing = self
            .get_expense(id, user_id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {}", id)))?;

        let conn = self.conn()?;
        conn.execute(
            "UPDATE expenses SET
                 description = ?1, amount_cents = ?2, date = ?3, category_id = ?4,
                 vendor = ?5, notes = ?6, updated_at = ?7
             WHERE id = ?8 AND user_id = ?9",
            params![
                update.description.as_deref().unwrap_or(&existing.description),
                update.amount_cents.unwrap_or(existing.amount_cents),
                update
                    .date
                    .unwrap_or(existing.date)
                    .format("%Y-%m-%d")
                    .to_string(),
                update.category_id.or(existing.category_id),
                update.vendor.as_deref().or(existing.vendor.as_deref()),
                update.notes.as_deref().or(existing.notes.as_deref()),
                now_sqlite(),
                id,
                user_id,
            ],
        )?;

        self.get_expense(id, user_id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {}", id)))
    }

    pub fn delete_expense(&self, id: i64, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Expense {}", id)));
        }
        Ok(())
    }

    /// Sum of a user's spend in cents over an inclusive date range,
    /// optionally scoped to one category
    pub fn sum_expenses(
        &self,
        user_id: &str,
        category_id: Option<i64>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let start = start.format("%Y-%m-%d").to_string();
        let end = end.format("%Y-%m-%d").to_string();

        let total: i64 = match category_id {
            Some(cat) => conn.query_row(
                "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses
                 WHERE user_id = ?1 AND category_id = ?2 AND date >= ?3 AND date <= ?4",
                params![user_id, cat, start, end],
                |r| r.get(0),
            )?,
            None => conn.query_row(
                "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses
                 WHERE user_id = ?1 AND date >= ?2 AND date <= ?3",
                params![user_id, start, end],
                |r| r.get(0),
            )?,
        };
        Ok(total)
    }
}
