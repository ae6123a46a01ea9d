//! Budget goal evaluation and threshold alerting
//!
//! Spend is never stored on a goal; it is recomputed from the expenses
//! table over the goal's current evaluation window each time it is read.
//! Threshold checks use integer-cent arithmetic throughout so boundary
//! cases are exact.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::models::{BudgetGoal, BudgetGoalWithSpent, BudgetPeriod};
use crate::money::format_percentage;
use crate::notify::{BudgetAlertEmail, Notifier};

/// Last day of the month containing `date`
fn end_of_month(date: NaiveDate) -> NaiveDate {
    let next = if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).unwrap_or(date)
}

/// Sunday closing the ISO week containing `date`
fn end_of_week(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + chrono::Duration::days(days_to_sunday)
}

/// The goal's evaluation window relative to `today`.
///
/// The window opens at the goal's start date and closes at the end of the
/// current calendar period (month, ISO week, or year). An explicit end date
/// on the goal caps the close. Returns None when the goal has not started
/// yet or its cap is already behind its start.
pub fn evaluation_window(goal: &BudgetGoal, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if today < goal.start_date {
        return None;
    }

    let period_end = match goal.period {
        BudgetPeriod::Monthly => end_of_month(today),
        BudgetPeriod::Weekly => end_of_week(today),
        BudgetPeriod::Yearly => NaiveDate::from_ymd_opt(today.year(), 12, 31)?,
    };

    let end = match goal.end_date {
        Some(cap) if cap < period_end => cap,
        _ => period_end,
    };

    if end < goal.start_date {
        return None;
    }
    Some((goal.start_date, end))
}

/// Compute spend for one goal over its current window.
///
/// Goals scoped to a category count only that category; unscoped goals
/// count every expense, so one expense can count toward both kinds.
pub fn goal_spent(db: &Database, goal: &BudgetGoal, today: NaiveDate) -> Result<i64> {
    match evaluation_window(goal, today) {
        Some((start, end)) => db.sum_expenses(&goal.user_id, goal.category_id, start, end),
        None => Ok(0),
    }
}

/// All of a user's goals with computed spend, for API responses
pub fn goals_with_spent(
    db: &Database,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<BudgetGoalWithSpent>> {
    let goals = db.list_budget_goals(user_id)?;
    let mut out = Vec::with_capacity(goals.len());
    for goal in goals {
        let spent_cents = goal_spent(db, &goal, today)?;
        let percentage = format_percentage(spent_cents, goal.amount_cents);
        out.push(BudgetGoalWithSpent {
            goal,
            spent_cents,
            percentage,
        });
    }
    Ok(out)
}

/// Whether spend has crossed the goal's alert threshold.
///
/// Integer cents multiplied through, so 79.99 + 0.02 against a 100.00
/// budget crosses an 80% threshold exactly.
fn threshold_crossed(spent_cents: i64, budget_cents: i64, threshold_percent: f64) -> bool {
    if budget_cents <= 0 {
        return false;
    }
    (spent_cents as f64) * 100.0 >= (budget_cents as f64) * threshold_percent
}

/// Whether an alert already went out in the current window
fn already_alerted(
    last_alerted_at: Option<DateTime<Utc>>,
    window_start: NaiveDate,
) -> bool {
    match last_alerted_at {
        Some(at) => at.date_naive() >= window_start,
        None => false,
    }
}

/// Evaluate every active goal for a user and dispatch alerts.
///
/// Runs after receipt ingestion, manual expense changes, and Gmail import.
/// Each goal fires at most once per evaluation window; delivery failures
/// leave the goal armed so the next evaluation retries. Returns the alerts
/// that were delivered.
pub async fn evaluate_user_budgets(
    db: &Database,
    notifier: &dyn Notifier,
    user_id: &str,
    today: NaiveDate,
) -> Result<Vec<BudgetAlertEmail>> {
    let user = match db.get_user(user_id)? {
        Some(user) => user,
        None => return Ok(vec![]),
    };
    let user_email = match user.email.clone() {
        Some(email) if !email.is_empty() => email,
        _ => {
            debug!(user = %user_id, "Skipping budget alerts: user has no email address");
            return Ok(vec![]);
        }
    };

    let mut sent = Vec::new();
    for goal in db.list_active_budget_goals(user_id)? {
        if !goal.email_alerts {
            continue;
        }
        let Some((window_start, _)) = evaluation_window(&goal, today) else {
            continue;
        };

        let spent_cents = goal_spent(db, &goal, today)?;
        if !threshold_crossed(spent_cents, goal.amount_cents, goal.alert_threshold) {
            continue;
        }
        if already_alerted(goal.last_alerted_at, window_start) {
            debug!(goal = %goal.name, "Threshold still crossed, alert already sent this window");
            continue;
        }

        let category = match goal.category_id {
            Some(id) => db
                .get_category(id)?
                .map(|c| c.name)
                .unwrap_or_else(|| "all categories".to_string()),
            None => "all categories".to_string(),
        };

        let alert = BudgetAlertEmail {
            user_email: user_email.clone(),
            user_name: user.display_name(),
            goal_name: goal.name.clone(),
            spent_cents,
            budget_cents: goal.amount_cents,
            percentage: format_percentage(spent_cents, goal.amount_cents),
            category,
        };

        match notifier.send_budget_alert(&alert).await {
            Ok(()) => {
                db.set_goal_last_alerted(goal.id, Utc::now())?;
                info!(
                    goal = %goal.name,
                    percentage = %alert.percentage,
                    "Budget alert dispatched"
                );
                sent.push(alert);
            }
            Err(e) => {
                // Goal stays armed; the next evaluation retries delivery
                warn!(goal = %goal.name, error = %e, "Budget alert delivery failed");
            }
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBudgetGoal, NewExpense};
    use crate::notify::RecordingNotifier;

    fn setup() -> (Database, String) {
        let db = Database::in_memory().unwrap();
        db.seed_default_categories().unwrap();
        db.upsert_user("u1", Some("jo@example.com"), Some("Jo"), None)
            .unwrap();
        (db, "u1".to_string())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_goal(
        db: &Database,
        user: &str,
        category_id: Option<i64>,
        amount_cents: i64,
        period: BudgetPeriod,
        start: NaiveDate,
    ) -> i64 {
        db.create_budget_goal(&NewBudgetGoal {
            user_id: user.to_string(),
            category_id,
            name: "Test Goal".to_string(),
            amount_cents,
            period,
            start_date: start,
            end_date: None,
            is_active: true,
            email_alerts: true,
            alert_threshold: 80.0,
        })
        .unwrap()
    }

    fn add_expense(db: &Database, user: &str, category_id: Option<i64>, cents: i64, on: NaiveDate) {
        db.create_expense(&NewExpense {
            user_id: user.to_string(),
            receipt_id: None,
            category_id,
            description: "test".to_string(),
            amount_cents: cents,
            date: on,
            vendor: None,
            notes: None,
            is_manual: true,
        })
        .unwrap();
    }

    #[test]
    fn test_evaluation_windows() {
        let mut goal_template = BudgetGoal {
            id: 1,
            user_id: "u1".to_string(),
            category_id: None,
            name: "g".to_string(),
            amount_cents: 10000,
            period: BudgetPeriod::Monthly,
            start_date: date(2025, 6, 10),
            end_date: None,
            is_active: true,
            email_alerts: true,
            alert_threshold: 80.0,
            last_alerted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // Monthly: start date through end of the current month
        let today = date(2025, 6, 20);
        assert_eq!(
            evaluation_window(&goal_template, today),
            Some((date(2025, 6, 10), date(2025, 6, 30)))
        );
        // Evaluated a month later, the window stretches to the new month's end
        assert_eq!(
            evaluation_window(&goal_template, date(2025, 7, 5)),
            Some((date(2025, 6, 10), date(2025, 7, 31)))
        );

        // Weekly: closes on Sunday of the current ISO week
        goal_template.period = BudgetPeriod::Weekly;
        // 2025-06-18 is a Wednesday; that week's Sunday is 06-22
        assert_eq!(
            evaluation_window(&goal_template, date(2025, 6, 18)),
            Some((date(2025, 6, 10), date(2025, 6, 22)))
        );

        // Yearly: closes Dec 31
        goal_template.period = BudgetPeriod::Yearly;
        assert_eq!(
            evaluation_window(&goal_template, date(2025, 6, 18)),
            Some((date(2025, 6, 10), date(2025, 12, 31)))
        );

        // Goal not started yet
        goal_template.period = BudgetPeriod::Monthly;
        assert_eq!(evaluation_window(&goal_template, date(2025, 6, 1)), None);

        // Explicit end date caps the window
        goal_template.end_date = Some(date(2025, 6, 15));
        assert_eq!(
            evaluation_window(&goal_template, date(2025, 6, 20)),
            Some((date(2025, 6, 10), date(2025, 6, 15)))
        );
    }

    #[test]
    fn test_fresh_goal_spent_is_zero() {
        let (db, user) = setup();
        let goal_id = make_goal(&db, &user, None, 10000, BudgetPeriod::Monthly, date(2025, 6, 1));
        let goal = db.get_budget_goal(goal_id, &user).unwrap().unwrap();
        assert_eq!(goal_spent(&db, &goal, date(2025, 6, 15)).unwrap(), 0);
    }

    #[test]
    fn test_expense_counts_toward_scoped_and_unscoped_goals() {
        let (db, user) = setup();
        let groceries = db.get_category_by_name("Groceries").unwrap().unwrap();
        let scoped = make_goal(
            &db,
            &user,
            Some(groceries.id),
            10000,
            BudgetPeriod::Monthly,
            date(2025, 6, 1),
        );
        let unscoped = make_goal(&db, &user, None, 20000, BudgetPeriod::Monthly, date(2025, 6, 1));

        add_expense(&db, &user, Some(groceries.id), 2500, date(2025, 6, 10));

        let today = date(2025, 6, 15);
        let scoped_goal = db.get_budget_goal(scoped, &user).unwrap().unwrap();
        let unscoped_goal = db.get_budget_goal(unscoped, &user).unwrap().unwrap();
        assert_eq!(goal_spent(&db, &scoped_goal, today).unwrap(), 2500);
        assert_eq!(goal_spent(&db, &unscoped_goal, today).unwrap(), 2500);
    }

    #[tokio::test]
    async fn test_threshold_crossing_alerts_exactly_once() {
        let (db, user) = setup();
        make_goal(&db, &user, None, 10000, BudgetPeriod::Monthly, date(2025, 6, 1));
        let notifier = RecordingNotifier::new();
        let today = date(2025, 6, 15);

        // 79.99: one cent under the 80% threshold
        add_expense(&db, &user, None, 7999, date(2025, 6, 10));
        let sent = evaluate_user_budgets(&db, &notifier, &user, today).await.unwrap();
        assert!(sent.is_empty());

        // +0.02 crosses exactly
        add_expense(&db, &user, None, 2, date(2025, 6, 11));
        let sent = evaluate_user_budgets(&db, &notifier, &user, today).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].spent_cents, 8001);
        assert_eq!(sent[0].percentage, "80.0");

        // Still over threshold, but the goal already fired this window
        let sent = evaluate_user_budgets(&db, &notifier, &user, today).await.unwrap();
        assert!(sent.is_empty());
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_no_alert_when_email_alerts_disabled() {
        let (db, user) = setup();
        let goal_id = make_goal(&db, &user, None, 10000, BudgetPeriod::Monthly, date(2025, 6, 1));
        db.update_budget_goal(
            goal_id,
            &user,
            &crate::db::BudgetGoalUpdate {
                email_alerts: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        add_expense(&db, &user, None, 9500, date(2025, 6, 10));
        let notifier = RecordingNotifier::new();
        let sent = evaluate_user_budgets(&db, &notifier, &user, date(2025, 6, 15))
            .await
            .unwrap();
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_no_alert_without_user_email() {
        let db = Database::in_memory().unwrap();
        db.seed_default_categories().unwrap();
        db.upsert_user("u2", None, None, None).unwrap();
        make_goal(&db, "u2", None, 10000, BudgetPeriod::Monthly, date(2025, 6, 1));
        add_expense(&db, "u2", None, 9999, date(2025, 6, 10));

        let notifier = RecordingNotifier::new();
        let sent = evaluate_user_budgets(&db, &notifier, "u2", date(2025, 6, 15))
            .await
            .unwrap();
        assert!(sent.is_empty());
    }

    #[tokio::test]
    async fn test_over_budget_alert_carries_category_name() {
        let (db, user) = setup();
        let groceries = db.get_category_by_name("Groceries").unwrap().unwrap();
        make_goal(
            &db,
            &user,
            Some(groceries.id),
            10000,
            BudgetPeriod::Monthly,
            date(2025, 6, 1),
        );
        add_expense(&db, &user, Some(groceries.id), 12550, date(2025, 6, 10));

        let notifier = RecordingNotifier::new();
        let sent = evaluate_user_budgets(&db, &notifier, &user, date(2025, 6, 15))
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_over_budget());
        assert_eq!(sent[0].category, "Groceries");
        assert_eq!(sent[0].percentage, "125.5");
    }
}
