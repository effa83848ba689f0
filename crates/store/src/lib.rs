//! FundTrack Store - fallback persistence
//!
//! SQLite-backed store for scheme records and settlements. This is the
//! fallback side of the dual-write design: it holds a full mirror of the fund
//! state and becomes the sole ground truth whenever the ledger is down.
//!
//! Amounts are stored as TEXT-encoded decimals; arithmetic that must be
//! atomic (the guarded `used_funds` increment) happens inside a single SQL
//! UPDATE with CAST expressions.

mod error;
mod scheme;
mod settlement;

pub use error::StoreError;
pub use scheme::{SchemeRecord, SchemeStore, StoreStats, SyncState, UsageApply};
pub use settlement::{SettlementFilter, SettlementRecord, SettlementStore};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Open (creating if needed) the store database at the given path.
pub async fn connect(db_path: impl AsRef<Path>) -> Result<SqlitePool, StoreError> {
    let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());
    Ok(SqlitePool::connect(&db_url).await?)
}

/// Open an in-memory database (for testing).
///
/// Capped at one connection: each SQLite `:memory:` connection is its own
/// database, so a wider pool would scatter tables across empty databases.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
    Ok(SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?)
}
