//! Conversational assistant over the user's financial data
//!
//! The assistant sees a plain-text context block (recent expenses plus
//! budget standing) rather than raw tables; building that block here keeps
//! it unit-testable without a model.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::ai::{AiBackend, AiClient};
use crate::budget::goals_with_spent;
use crate::db::{Database, ExpenseFilter};
use crate::error::Result;
use crate::models::ChatRole;
use crate::money::format_cents;

/// Number of recent expenses included in the context block
const CONTEXT_EXPENSE_LIMIT: usize = 50;

/// Reply used when the AI adapter fails; chat degrades, it never errors
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble analyzing your expenses right now. Please try again later.";

/// Build the financial context block for one user.
///
/// Format, one line per entry:
/// - expenses: `2025-06-10: Coffee - $4.50 (Food & Dining)`
/// - goals: `Monthly Groceries: $25.00/$100.00 (25.0%)`
pub fn build_context(db: &Database, user_id: &str, today: NaiveDate) -> Result<String> {
    let category_names: HashMap<i64, String> = db
        .list_categories()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let expenses = db.list_expenses(
        user_id,
        &ExpenseFilter {
            limit: Some(CONTEXT_EXPENSE_LIMIT),
            ..Default::default()
        },
    )?;

    let expense_lines: Vec<String> = expenses
        .iter()
        .map(|e| {
            let category = e
                .category_id
                .and_then(|id| category_names.get(&id))
                .map(String::as_str)
                .unwrap_or("Uncategorized");
            format!(
                "{}: {} - ${} ({})",
                e.date.format("%Y-%m-%d"),
                e.description,
                format_cents(e.amount_cents),
                category
            )
        })
        .collect();

    let goal_lines: Vec<String> = goals_with_spent(db, user_id, today)?
        .iter()
        .map(|g| {
            format!(
                "{}: ${}/${} ({}%)",
                g.goal.name,
                format_cents(g.spent_cents),
                format_cents(g.goal.amount_cents),
                g.percentage
            )
        })
        .collect();

    Ok(format!(
        "Recent Expenses:\n{}\n\nBudget Goals:\n{}",
        expense_lines.join("\n"),
        goal_lines.join("\n")
    ))
}

/// Handle one chat turn: append the user message to the latest conversation
/// (created on first use), ask the backend, append and return the reply.
///
/// Adapter failure produces the fixed fallback reply instead of an error so
/// the conversation stays usable.
pub async fn chat_turn(
    db: &Database,
    ai: &AiClient,
    user_id: &str,
    query: &str,
    today: NaiveDate,
) -> Result<(String, i64)> {
    let conversation = db.ensure_conversation(user_id)?;
    db.append_chat_message(conversation.id, ChatRole::User, query)?;

    let context = build_context(db, user_id, today)?;
    let reply = match ai.chat(&context, query).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(user = %user_id, error = %e, "Assistant backend failed, using fallback reply");
            FALLBACK_REPLY.to_string()
        }
    };

    db.append_chat_message(conversation.id, ChatRole::Assistant, &reply)?;
    Ok((reply, conversation.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBudgetGoal, NewExpense};

    fn setup() -> Database {
        let db = Database::in_memory().unwrap();
        db.seed_default_categories().unwrap();
        db.upsert_user("u1", Some("jo@example.com"), Some("Jo"), None)
            .unwrap();
        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_build_context_formats_expenses_and_goals() {
        let db = setup();
        let dining = db.get_category_by_name("Food & Dining").unwrap().unwrap();
        db.create_expense(&NewExpense {
            user_id: "u1".to_string(),
            receipt_id: None,
            category_id: Some(dining.id),
            description: "Coffee".to_string(),
            amount_cents: 450,
            date: date(2025, 6, 10),
            vendor: None,
            notes: None,
            is_manual: true,
        })
        .unwrap();
        db.create_budget_goal(&NewBudgetGoal {
            user_id: "u1".to_string(),
            category_id: None,
            name: "Everything".to_string(),
            amount_cents: 10000,
            period: crate::models::BudgetPeriod::Monthly,
            start_date: date(2025, 6, 1),
            end_date: None,
            is_active: true,
            email_alerts: false,
            alert_threshold: 80.0,
        })
        .unwrap();

        let context = build_context(&db, "u1", date(2025, 6, 15)).unwrap();
        assert!(context.contains("2025-06-10: Coffee - $4.50 (Food & Dining)"));
        assert!(context.contains("Everything: $4.50/$100.00 (4.5%)"));
    }

    #[tokio::test]
    async fn test_chat_turn_appends_both_messages() {
        let db = setup();
        let ai = AiClient::mock();
        let (reply, conversation_id) =
            chat_turn(&db, &ai, "u1", "How am I doing?", date(2025, 6, 15))
                .await
                .unwrap();
        assert!(!reply.is_empty());

        let messages = db.list_chat_messages(conversation_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "How am I doing?");
        assert_eq!(messages[1].role, ChatRole::Assistant);

        // Second turn reuses the same conversation
        let (_, second_id) = chat_turn(&db, &ai, "u1", "And now?", date(2025, 6, 15))
            .await
            .unwrap();
        assert_eq!(second_id, conversation_id);
        assert_eq!(db.list_chat_messages(conversation_id).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_chat_turn_falls_back_on_adapter_failure() {
        let db = setup();
        let ai = AiClient::mock_unhealthy();
        let (reply, conversation_id) = chat_turn(&db, &ai, "u1", "Hello?", date(2025, 6, 15))
            .await
            .unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
        // The fallback reply is still persisted
        let messages = db.list_chat_messages(conversation_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, FALLBACK_REPLY);
    }
}
