//! FundTrack Chain - On-chain fund ledger port
//!
//! The ledger contract keeps trivial per-scheme accounting: a name, a total
//! budget, and a used-funds counter, all in unsigned integer units. This crate
//! defines the client-side port (`FundLedger`), the in-process `MockChain`
//! implementing the contract semantics for tests and fallback-only
//! deployments, and `DeadlineChain`, which bounds every call with a timeout so
//! a hanging node can never block the fallback path.
//!
//! A production JSON-RPC adapter plugs in behind the same trait.

mod deadline;
mod error;
mod mock;
mod types;

pub use deadline::DeadlineChain;
pub use error::ChainError;
pub use mock::MockChain;
pub use types::{FundLedger, OnChainScheme, TxReceipt};
