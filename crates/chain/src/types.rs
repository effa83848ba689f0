//! Ledger port types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ChainError;

/// Receipt of a confirmed (block-finalized) ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash as reported by the node.
    pub tx_hash: String,
}

impl TxReceipt {
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
        }
    }

    /// A receipt with no usable hash must be treated as a failed write.
    pub fn is_empty(&self) -> bool {
        self.tx_hash.trim().is_empty()
    }
}

/// Scheme state as read back from the contract.
///
/// Amounts are integral: the contract has no fractional currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainScheme {
    pub id: u64,
    pub name: String,
    pub total_funds: u64,
    pub used_funds: u64,
}

/// Client-side surface of the fund ledger contract.
///
/// Implementations can be:
/// - `MockChain`: in-process contract semantics for tests and dev mode
/// - a JSON-RPC adapter against a deployed contract (external)
///
/// The contract assigns scheme ids from an incrementing counter: it bumps
/// `scheme_count` first and uses the new value as the id, so the id of a
/// freshly added scheme equals the post-write counter value.
#[async_trait]
pub trait FundLedger: Send + Sync {
    /// Register a scheme; waits for the write to be confirmed.
    async fn add_scheme(&self, name: &str, total_units: u64) -> Result<TxReceipt, ChainError>;

    /// Record fund usage against a scheme; waits for confirmation.
    async fn use_fund(&self, scheme_id: u64, units: u64) -> Result<TxReceipt, ChainError>;

    /// Read a scheme snapshot.
    async fn get_scheme(&self, scheme_id: u64) -> Result<OnChainScheme, ChainError>;

    /// Read the scheme counter.
    async fn scheme_count(&self) -> Result<u64, ChainError>;
}
