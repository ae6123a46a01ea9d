//! Default on-disk locations
//!
//! The database and receipt images live under the platform data directory
//! (`~/.local/share/tally` on Linux) unless overridden on the command line.

use std::path::PathBuf;

/// Application data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
}

/// Default database file path
pub fn default_db_path() -> PathBuf {
    default_data_dir().join("tally.db")
}

/// Default directory for stored receipt images
pub fn default_receipts_dir() -> PathBuf {
    default_data_dir().join("receipts")
}
