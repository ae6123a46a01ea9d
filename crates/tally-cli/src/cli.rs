//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Personal expense tracker
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted expense tracker with AI receipt extraction", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// User id to act as for data commands
    #[arg(long, default_value = "local", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed default categories
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory for uploaded receipt images (defaults to the platform
        /// data directory)
        #[arg(long)]
        receipts_dir: Option<PathBuf>,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "origin")]
        origins: Vec<String>,
    },

    /// Show database status (encryption, size, counts)
    Status,

    /// List expense categories
    Categories,

    /// List expenses
    Expenses {
        /// Number of expenses to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Filter by category name
        #[arg(long)]
        category: Option<String>,
    },

    /// List budget goals with current spend
    Budgets,

    /// List uploaded receipts
    Receipts {
        /// Number of receipts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}
