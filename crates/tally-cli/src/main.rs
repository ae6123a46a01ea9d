//! Tally CLI - Personal expense tracker
//!
//! Usage:
//!   tally init                Initialize database
//!   tally serve --port 3000   Start web server
//!   tally expenses            List recent expenses
//!   tally budgets             List budget goals with current spend

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(tally_core::paths::default_db_path);

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            receipts_dir,
            origins,
        } => {
            commands::cmd_serve(
                &db_path,
                &host,
                port,
                receipts_dir,
                origins,
                cli.no_encrypt,
            )
            .await
        }
        Commands::Status => commands::cmd_status(&db_path, &cli.user, cli.no_encrypt),
        Commands::Categories => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_categories(&db)
        }
        Commands::Expenses { limit, category } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_expenses(&db, &cli.user, limit, category.as_deref())
        }
        Commands::Budgets => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_budgets(&db, &cli.user)
        }
        Commands::Receipts { limit } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_receipts(&db, &cli.user, limit)
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
    }
}
