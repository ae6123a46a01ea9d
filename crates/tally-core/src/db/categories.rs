//! Expense categories and default seeding

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::Category;

/// Category used when categorization yields nothing better
pub const FALLBACK_CATEGORY: &str = "Other";

/// Default categories seeded into an empty database: (name, icon, color)
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Food & Dining", "utensils", "#FF6B6B"),
    ("Transportation", "car", "#4ECDC4"),
    ("Entertainment", "film", "#45B7D1"),
    ("Shopping", "shopping-bag", "#96CEB4"),
    ("Utilities", "bolt", "#FFEAA7"),
    ("Healthcare", "heartbeat", "#DDA0DD"),
    ("Travel", "plane", "#98D8C8"),
    ("Education", "graduation-cap", "#F7DC6F"),
    ("Groceries", "shopping-cart", "#82E0AA"),
    ("Bills & Services", "file-invoice-dollar", "#F1948A"),
    ("Gas & Fuel", "gas-pump", "#85C1E9"),
    ("Home & Garden", "home", "#D7BDE2"),
    ("Personal Care", "spa", "#FAD7A0"),
    ("Other", "ellipsis-h", "#AEB6BF"),
];

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

impl Database {
    /// Seed the default categories. Only runs when the table is empty, so
    /// user additions and renames survive restarts.
    pub fn seed_default_categories(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
        if count > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for (name, icon, color) in DEFAULT_CATEGORIES {
            inserted += conn.execute(
                "INSERT INTO categories (name, icon, color) VALUES (?1, ?2, ?3)",
                params![name, icon, color],
            )?;
        }
        tracing::info!("Seeded {} default categories", inserted);
        Ok(inserted)
    }

    /// All categories ordered by name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, icon, color, created_at FROM categories ORDER BY name",
        )?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    /// Exact-name lookup (case-sensitive)
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, icon, color, created_at FROM categories WHERE name = ?1",
                params![name],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, icon, color, created_at FROM categories WHERE id = ?1",
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Resolve a suggested category name to an id, falling back to "Other"
    /// when the name is unknown. Returns None only if the fallback row is
    /// also missing (unseeded database).
    pub fn resolve_category(&self, name: &str) -> Result<Option<i64>> {
        if let Some(cat) = self.get_category_by_name(name)? {
            return Ok(Some(cat.id));
        }
        Ok(self.get_category_by_name(FALLBACK_CATEGORY)?.map(|c| c.id))
    }
}
