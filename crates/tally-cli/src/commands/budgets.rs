//! Budget goal listing command

use anyhow::Result;
use tally_core::budget::goals_with_spent;
use tally_core::db::Database;
use tally_core::money::format_dollars;

pub fn cmd_budgets(db: &Database, user_id: &str) -> Result<()> {
    let today = chrono::Utc::now().date_naive();
    let goals = goals_with_spent(db, user_id, today)?;

    if goals.is_empty() {
        println!("No budget goals yet. Create one from the web UI or API.");
        return Ok(());
    }

    println!();
    println!("🎯 Budget Goals");
    println!("   ─────────────────────────────────────────────────────────────");

    for entry in goals {
        let goal = &entry.goal;
        let status = if !goal.is_active {
            " (inactive)"
        } else if entry.spent_cents >= goal.amount_cents {
            " ⚠️ over budget"
        } else {
            ""
        };
        println!(
            "   {:<24} {:>10} / {:>10}  ({}%, {}){}",
            goal.name,
            format_dollars(entry.spent_cents),
            format_dollars(goal.amount_cents),
            entry.percentage,
            goal.period.as_str(),
            status
        );
    }

    Ok(())
}
