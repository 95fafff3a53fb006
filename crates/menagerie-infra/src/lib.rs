//! Infrastructure implementations for Menagerie.
//!
//! SQLite-backed repositories (sqlx, WAL mode, split read/write pools),
//! the SHA-256 content hasher, the HTTP reply generator adapter, and the
//! global config loader. Everything here implements ports defined in
//! `menagerie-core`.

pub mod config;
pub mod crypto;
pub mod generate;
pub mod sqlite;

use std::path::PathBuf;

/// Resolve the data directory: `MENAGERIE_DATA_DIR` if set, otherwise
/// `~/.menagerie`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MENAGERIE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".menagerie")
}
