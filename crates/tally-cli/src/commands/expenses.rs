//! Category and expense listing commands

use std::collections::HashMap;

use anyhow::{bail, Result};
use tally_core::db::{Database, ExpenseFilter};
use tally_core::money::format_dollars;

use super::truncate;

pub fn cmd_categories(db: &Database) -> Result<()> {
    let categories = db.list_categories()?;

    if categories.is_empty() {
        println!("No categories found. Run 'tally init' to seed defaults.");
        return Ok(());
    }

    println!();
    println!("🏷️  Categories");
    println!("   ─────────────────────────────");

    for category in categories {
        let icon = category.icon.unwrap_or_default();
        println!("   {:>4}  {:<24} {}", category.id, category.name, icon);
    }

    Ok(())
}

pub fn cmd_expenses(
    db: &Database,
    user_id: &str,
    limit: usize,
    category: Option<&str>,
) -> Result<()> {
    let category_id = match category {
        Some(name) => match db.get_category_by_name(name)? {
            Some(cat) => Some(cat.id),
            None => bail!("Category not found: {}", name),
        },
        None => None,
    };

    let filter = ExpenseFilter {
        category_id,
        limit: Some(limit),
        ..Default::default()
    };
    let expenses = db.list_expenses(user_id, &filter)?;

    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    let category_names: HashMap<i64, String> = db
        .list_categories()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    println!();
    println!("💳 Expenses");
    println!("   ─────────────────────────────────────────────────────────────");

    for expense in expenses {
        let category = expense
            .category_id
            .and_then(|id| category_names.get(&id).cloned())
            .unwrap_or_else(|| "-".to_string());
        let source = if expense.is_manual { " " } else { "📷" };
        println!(
            "   {:>4}  {}  {:>10}  {:<14} {} {}",
            expense.id,
            expense.date,
            format_dollars(expense.amount_cents),
            truncate(&category, 14),
            truncate(&expense.description, 32),
            source
        );
    }

    Ok(())
}
