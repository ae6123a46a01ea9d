//! Spending summaries and breakdowns
//!
//! All aggregation happens in SQL over the cents column so results are exact.

use chrono::{Datelike, NaiveDate};
use rusqlite::params;
use serde::Serialize;

use super::Database;
use crate::error::Result;

/// Dashboard summary figures
#[derive(Debug, Clone, Serialize)]
pub struct SpendingSummary {
    pub total_this_month_cents: i64,
    pub total_last_month_cents: i64,
    /// Name of the category with the highest spend this month, if any
    pub top_category: Option<String>,
    pub receipts_count: i64,
}

/// One month's total, keyed "YYYY-MM"
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySpending {
    pub month: String,
    pub total_cents: i64,
}

/// Per-category totals
#[derive(Debug, Clone, Serialize)]
pub struct CategorySpending {
    pub category: String,
    pub total_cents: i64,
    pub count: i64,
}

fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let next_month = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    let end = next_month
        .and_then(|d| d.pred_opt())
        .unwrap_or(start);
    (start, end)
}

impl Database {
    /// Summary for the dashboard: this month vs last month, top category,
    /// receipt count. `today` is a parameter so tests are deterministic.
    pub fn spending_summary(&self, user_id: &str, today: NaiveDate) -> Result<SpendingSummary> {
        let (this_start, this_end) = month_bounds(today);
        let last_month_ref = this_start.pred_opt().unwrap_or(this_start);
        let (last_start, last_end) = month_bounds(last_month_ref);

        let total_this_month_cents = self.sum_expenses(user_id, None, this_start, this_end)?;
        let total_last_month_cents = self.sum_expenses(user_id, None, last_start, last_end)?;

        let conn = self.conn()?;
        let top_category: Option<String> = conn
            .query_row(
                "SELECT c.name FROM expenses e
                 JOIN categories c ON c.id = e.category_id
                 WHERE e.user_id = ?1 AND e.date >= ?2 AND e.date <= ?3
                 GROUP BY c.id ORDER BY SUM(e.amount_cents) DESC LIMIT 1",
                params![
                    user_id,
                    this_start.format("%Y-%m-%d").to_string(),
                    this_end.format("%Y-%m-%d").to_string(),
                ],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let receipts_count = self.count_receipts(user_id)?;

        Ok(SpendingSummary {
            total_this_month_cents,
            total_last_month_cents,
            top_category,
            receipts_count,
        })
    }

    /// Monthly totals for the trailing `months` months, oldest first
    pub fn monthly_spending(
        &self,
        user_id: &str,
        months: u32,
        today: NaiveDate,
    ) -> Result<Vec<MonthlySpending>> {
        let months = months.max(1);
        // First day of the window: (months - 1) months before the current one
        let mut year = today.year();
        let mut month = today.month() as i32 - (months as i32 - 1);
        while month < 1 {
            month += 12;
            year -= 1;
        }
        let window_start = NaiveDate::from_ymd_opt(year, month as u32, 1)
            .unwrap_or_else(|| today.with_day(1).unwrap_or(today));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT substr(date, 1, 7) AS month, SUM(amount_cents)
             FROM expenses
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             GROUP BY month ORDER BY month",
        )?;
        let rows = stmt
            .query_map(
                params![
                    user_id,
                    window_start.format("%Y-%m-%d").to_string(),
                    today.format("%Y-%m-%d").to_string(),
                ],
                |row| {
                    Ok(MonthlySpending {
                        month: row.get(0)?,
                        total_cents: row.get(1)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Per-category totals over all time, highest spend first.
    /// Uncategorized expenses group under "Uncategorized".
    pub fn spending_by_category(&self, user_id: &str) -> Result<Vec<CategorySpending>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(c.name, 'Uncategorized'), SUM(e.amount_cents), COUNT(*)
             FROM expenses e
             LEFT JOIN categories c ON c.id = e.category_id
             WHERE e.user_id = ?1
             GROUP BY c.id ORDER BY SUM(e.amount_cents) DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(CategorySpending {
                    category: row.get(0)?,
                    total_cents: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let d = NaiveDate::from_ymd_opt(2025, 2, 14).unwrap();
        let (start, end) = month_bounds(d);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());

        let d = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let (start, end) = month_bounds(d);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}
