//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analytics;
pub mod assistant;
pub mod budgets;
pub mod categories;
pub mod expenses;
pub mod gmail;
pub mod health;
pub mod receipts;
pub mod users;

// Re-export all handlers for use in router
pub use analytics::*;
pub use assistant::*;
pub use budgets::*;
pub use categories::*;
pub use expenses::*;
pub use gmail::*;
pub use health::*;
pub use receipts::*;
pub use users::*;
