//! Receipt listing command

use anyhow::Result;
use tally_core::db::Database;

use super::truncate;

pub fn cmd_receipts(db: &Database, user_id: &str, limit: usize) -> Result<()> {
    let receipts = db.list_receipts(user_id)?;

    if receipts.is_empty() {
        println!("No receipts found. Upload one via POST /api/receipts.");
        return Ok(());
    }

    println!();
    println!("🧾 Receipts");
    println!("   ─────────────────────────────────────────────────────────────");

    for receipt in receipts.into_iter().take(limit) {
        let path = if receipt.object_path.is_empty() {
            "(email body)"
        } else {
            &receipt.object_path
        };
        println!(
            "   {:>4}  {}  {:<10} {}",
            receipt.id,
            receipt.uploaded_at.format("%Y-%m-%d %H:%M"),
            receipt.status.as_str(),
            truncate(path, 48)
        );
    }

    Ok(())
}
