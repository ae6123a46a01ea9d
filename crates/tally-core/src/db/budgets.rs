//! Budget goal CRUD

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Deserialize;

use super::{now_sqlite, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{BudgetGoal, BudgetPeriod, NewBudgetGoal};

fn row_to_goal(row: &Row) -> rusqlite::Result<BudgetGoal> {
    let period_str: String = row.get(6)?;
    Ok(BudgetGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        name: row.get(3)?,
        amount_cents: row.get(4)?,
        is_active: row.get(5)?,
        period: period_str.parse().unwrap_or(BudgetPeriod::Monthly),
        start_date: parse_date(&row.get::<_, String>(7)?),
        end_date: row.get::<_, Option<String>>(8)?.map(|s| parse_date(&s)),
        email_alerts: row.get(9)?,
        alert_threshold: row.get(10)?,
        last_alerted_at: row
            .get::<_, Option<String>>(11)?
            .map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(12)?),
        updated_at: parse_datetime(&row.get::<_, String>(13)?),
    })
}

const GOAL_COLUMNS: &str = "id, user_id, category_id, name, amount_cents, is_active, period, \
                            start_date, end_date, email_alerts, alert_threshold, \
                            last_alerted_at, created_at, updated_at";

/// Partial update for a budget goal; None leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetGoalUpdate {
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub amount_cents: Option<i64>,
    pub period: Option<BudgetPeriod>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub email_alerts: Option<bool>,
    pub alert_threshold: Option<f64>,
}

impl Database {
    pub fn create_budget_goal(&self, goal: &NewBudgetGoal) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO budget_goals
                 (user_id, category_id, name, amount_cents, period, start_date,
                  end_date, is_active, email_alerts, alert_threshold)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                goal.user_id,
                goal.category_id,
                goal.name,
                goal.amount_cents,
                goal.period.as_str(),
                goal.start_date.format("%Y-%m-%d").to_string(),
                goal.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
                goal.is_active,
                goal.email_alerts,
                goal.alert_threshold,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_budget_goal(&self, id: i64, user_id: &str) -> Result<Option<BudgetGoal>> {
        let conn = self.conn()?;
        let goal = conn
            .query_row(
                &format!(
                    "SELECT {} FROM budget_goals WHERE id = ?1 AND user_id = ?2",
                    GOAL_COLUMNS
                ),
                params![id, user_id],
                row_to_goal,
            )
            .optional()?;
        Ok(goal)
    }

    /// All of a user's goals, newest first
    pub fn list_budget_goals(&self, user_id: &str) -> Result<Vec<BudgetGoal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budget_goals WHERE user_id = ?1 ORDER BY id DESC",
            GOAL_COLUMNS
        ))?;
        let goals = stmt
            .query_map(params![user_id], row_to_goal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    /// Active goals only, for alert evaluation
    pub fn list_active_budget_goals(&self, user_id: &str) -> Result<Vec<BudgetGoal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budget_goals WHERE user_id = ?1 AND is_active = 1 ORDER BY id",
            GOAL_COLUMNS
        ))?;
        let goals = stmt
            .query_map(params![user_id], row_to_goal)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(goals)
    }

    pub fn update_budget_goal(
        &self,
        id: i64,
        user_id: &str,
        update: &BudgetGoalUpdate,
    ) -> Result<BudgetGoal> {
        let existing = self
            .get_budget_goal(id, user_id)?
            .ok_or_else(|| Error::NotFound(format!("Budget goal {}", id)))?;

        let conn = self.conn()?;
        conn.execute(
            "UPDATE budget_goals SET
                 name = ?1, category_id = ?2, amount_cents = ?3, period = ?4,
                 start_date = ?5, end_date = ?6, is_active = ?7, email_alerts = ?8,
                 alert_threshold = ?9, updated_at = ?10
             WHERE id = ?11 AND user_id = ?12",
            params![
                update.name.as_deref().unwrap_or(&existing.name),
                update.category_id.or(existing.category_id),
                update.amount_cents.unwrap_or(existing.amount_cents),
                update.period.unwrap_or(existing.period).as_str(),
                update
                    .start_date
                    .unwrap_or(existing.start_date)
                    .format("%Y-%m-%d")
                    .to_string(),
                update
                    .end_date
                    .or(existing.end_date)
                    .map(|d| d.format("%Y-%m-%d").to_string()),
                update.is_active.unwrap_or(existing.is_active),
                update.email_alerts.unwrap_or(existing.email_alerts),
                update.alert_threshold.unwrap_or(existing.alert_threshold),
                now_sqlite(),
                id,
                user_id,
            ],
        )?;

        self.get_budget_goal(id, user_id)?
            .ok_or_else(|| Error::NotFound(format!("Budget goal {}", id)))
    }

    pub fn delete_budget_goal(&self, id: i64, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM budget_goals WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Budget goal {}", id)));
        }
        Ok(())
    }

    /// Record that an alert went out for this goal (arms the per-window dedup)
    pub fn set_goal_last_alerted(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE budget_goals SET last_alerted_at = ?1 WHERE id = ?2",
            params![at.format("%Y-%m-%d %H:%M:%S").to_string(), id],
        )?;
        Ok(())
    }
}
