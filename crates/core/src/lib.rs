//! FundTrack Core - Domain types
//!
//! This crate contains the fundamental types used across FundTrack:
//! - `Amount`: Non-negative decimal wrapper for fund amounts
//! - `SettlementId`: Tagged settlement identifier (on-chain hash or fallback synthetic)
//! - Generated string identifiers for requests, grievances, and certificates

pub mod amount;
pub mod ids;
pub mod settlement;

pub use amount::Amount;
pub use settlement::SettlementId;
