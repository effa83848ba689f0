//! Chain errors

use thiserror::Error;

/// Errors from the ledger client.
///
/// All variants are transient from the mirror's point of view: any of them
/// triggers the fallback path rather than failing the operation outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Node unreachable or client not configured.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The contract rejected the call.
    #[error("Ledger call reverted: {reason}")]
    Reverted { reason: String },

    /// The call exceeded the configured deadline.
    #[error("Ledger call timed out after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    /// The write confirmed but the receipt carried no transaction hash.
    #[error("Ledger receipt carried no transaction hash")]
    EmptyReceipt,
}
