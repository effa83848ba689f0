//! Mirror errors
//!
//! Ledger failures never appear here: they are caught at the mirror boundary
//! and converted into a fallback attempt. What surfaces is either a business
//! rule violation (terminal, regardless of which store was hit) or the
//! both-stores-down case.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the ledger mirror
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Malformed input; rejected before touching either store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Neither the ledger nor the fallback store knows the scheme.
    #[error("Scheme {0} not found")]
    SchemeNotFound(u64),

    /// The requested amount exceeds the scheme's remaining funds.
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// Both the ledger and the fallback store failed; nothing was committed.
    #[error("No store available: {detail}")]
    StoreUnavailable { detail: String },

    /// Fallback store failure outside the dual-path window (reads, bookkeeping).
    #[error("Store error: {0}")]
    Store(#[from] fundtrack_store::StoreError),
}
