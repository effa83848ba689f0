//! FundTrack Mirror - dual-write fund state
//!
//! This is the HEART of FundTrack. A single logical fund state lives in two
//! stores: the on-chain ledger (authoritative when reachable) and the
//! fallback SQLite store. Every scheme-mutating operation tries the ledger
//! first and degrades to the fallback store when the ledger is unreachable,
//! reverted, or slow; only both stores failing is fatal.
//!
//! Graceful degradation over strict consistency: a fallback-only write is a
//! success with a warning, and the divergence is recorded in the scheme's
//! sync state for later replay.

mod error;
mod mirror;
mod outcome;

pub use error::MirrorError;
pub use mirror::LedgerMirror;
pub use outcome::{
    DivergenceReport, FundStats, ReconcileOutcome, RegisterOutcome, SchemeView, UsageOutcome,
};
