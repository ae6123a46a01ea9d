//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status, audit) and shared utilities (open_db)
//! - `serve` - Web server command
//! - `expenses` - Category and expense listings
//! - `budgets` - Budget goal listing
//! - `receipts` - Receipt listing

pub mod budgets;
pub mod core;
pub mod expenses;
pub mod receipts;
pub mod serve;

// Re-export command functions for main.rs
pub use budgets::*;
pub use core::*;
pub use expenses::*;
pub use receipts::*;
pub use serve::*;

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated. Counts chars, not bytes; extracted vendor names are not
/// guaranteed to be ASCII.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
