//! Server command implementation

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    receipts_dir: Option<PathBuf>,
    origins: Vec<String>,
    no_encrypt: bool,
) -> Result<()> {
    let receipts_dir = receipts_dir.unwrap_or_else(tally_core::paths::default_receipts_dir);

    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", db_path.display());
    println!("   Receipts: {}", receipts_dir.display());
    println!("   Listening: http://{}:{}", host, port);
    if !origins.is_empty() {
        println!("   CORS origins: {}", origins.join(", "));
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = tally_server::ServerConfig {
        allowed_origins: origins,
        receipts_dir,
    };

    tally_server::serve(db, host, port, config).await?;

    Ok(())
}
