//! Tally core library
//!
//! Core functionality for the Tally personal expense tracker:
//! - Database layer (SQLite with optional SQLCipher encryption)
//! - Domain models (users, categories, receipts, expenses, budget goals)
//! - AI backends (receipt extraction, categorization, assistant chat)
//! - Receipt ingestion queue and worker
//! - Budget evaluation and threshold alerting
//! - Email alert delivery (SMTP)
//! - Gmail receipt import (OAuth2)

pub mod ai;
pub mod assistant;
pub mod budget;
pub mod db;
pub mod error;
pub mod gmail;
pub mod ingest;
pub mod models;
pub mod money;
pub mod notify;
pub mod paths;

pub use error::{Error, Result};
