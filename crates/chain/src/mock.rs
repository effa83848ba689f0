//! Mock chain for tests and fallback-only deployments
//!
//! Replicates the contract semantics in-process: the scheme counter is
//! incremented first and becomes the new scheme's id, and fund usage reverts
//! when it would push `used_funds` past `total_funds`.

use sha2::{Digest, Sha256};
use std::sync::RwLock;

use crate::error::ChainError;
use crate::types::{FundLedger, OnChainScheme, TxReceipt};

#[derive(Debug, Default)]
struct MockState {
    schemes: Vec<OnChainScheme>,
    nonce: u64,
    available: bool,
}

/// In-process fund ledger.
///
/// Availability can be toggled to simulate an unreachable node; an
/// unavailable mock behaves exactly like a node that is down, which is also
/// how the `--chain off` deployment mode is realized.
pub struct MockChain {
    state: RwLock<MockState>,
}

impl MockChain {
    /// Create an empty, reachable mock ledger
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState {
                available: true,
                ..MockState::default()
            }),
        }
    }

    /// Create a mock ledger that fails every call
    pub fn unavailable() -> Self {
        let chain = Self::new();
        chain.set_available(false);
        chain
    }

    /// Toggle simulated reachability
    pub fn set_available(&self, available: bool) {
        self.state.write().unwrap().available = available;
    }

    pub fn is_available(&self) -> bool {
        self.state.read().unwrap().available
    }

    fn receipt(state: &mut MockState, op: &str, detail: &str) -> TxReceipt {
        state.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(op.as_bytes());
        hasher.update(detail.as_bytes());
        hasher.update(state.nonce.to_le_bytes());
        TxReceipt::new(format!("0x{}", hex::encode(hasher.finalize())))
    }

    fn ensure_available(state: &MockState) -> Result<(), ChainError> {
        if state.available {
            Ok(())
        } else {
            Err(ChainError::Unavailable("mock node offline".to_string()))
        }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FundLedger for MockChain {
    async fn add_scheme(&self, name: &str, total_units: u64) -> Result<TxReceipt, ChainError> {
        let mut state = self.state.write().unwrap();
        Self::ensure_available(&state)?;

        let id = state.schemes.len() as u64 + 1;
        state.schemes.push(OnChainScheme {
            id,
            name: name.to_string(),
            total_funds: total_units,
            used_funds: 0,
        });

        Ok(Self::receipt(
            &mut state,
            "addScheme",
            &format!("{}:{}", name, total_units),
        ))
    }

    async fn use_fund(&self, scheme_id: u64, units: u64) -> Result<TxReceipt, ChainError> {
        let mut state = self.state.write().unwrap();
        Self::ensure_available(&state)?;

        let scheme = state
            .schemes
            .iter_mut()
            .find(|s| s.id == scheme_id)
            .ok_or_else(|| ChainError::Reverted {
                reason: format!("unknown scheme {}", scheme_id),
            })?;

        if scheme.used_funds + units > scheme.total_funds {
            return Err(ChainError::Reverted {
                reason: format!(
                    "insufficient funds: used {} + {} > total {}",
                    scheme.used_funds, units, scheme.total_funds
                ),
            });
        }
        scheme.used_funds += units;

        Ok(Self::receipt(
            &mut state,
            "useFund",
            &format!("{}:{}", scheme_id, units),
        ))
    }

    async fn get_scheme(&self, scheme_id: u64) -> Result<OnChainScheme, ChainError> {
        let state = self.state.read().unwrap();
        Self::ensure_available(&state)?;

        state
            .schemes
            .iter()
            .find(|s| s.id == scheme_id)
            .cloned()
            .ok_or_else(|| ChainError::Reverted {
                reason: format!("unknown scheme {}", scheme_id),
            })
    }

    async fn scheme_count(&self) -> Result<u64, ChainError> {
        let state = self.state.read().unwrap();
        Self::ensure_available(&state)?;
        Ok(state.schemes.len() as u64)
    }
}
