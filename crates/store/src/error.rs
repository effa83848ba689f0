//! Store errors

use thiserror::Error;

/// Errors from the fallback store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Scheme not found: {0}")]
    SchemeNotFound(u64),

    #[error("Settlement not found: {0}")]
    SettlementNotFound(String),

    #[error("Malformed stored value: {0}")]
    Malformed(String),
}
