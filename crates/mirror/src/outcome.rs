//! Operation outcomes and read views

use chrono::{DateTime, Utc};
use fundtrack_core::SettlementId;
use rust_decimal::Decimal;
use serde::Serialize;

/// Result of registering a scheme.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub scheme_id: u64,
    /// Present only when the ledger write confirmed.
    pub ledger_tx_hash: Option<String>,
    pub applied_to_ledger: bool,
    pub applied_to_fallback: bool,
    /// Set when the operation degraded to one store.
    pub warning: Option<String>,
}

/// Result of applying fund usage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutcome {
    pub settlement_id: SettlementId,
    pub scheme_id: u64,
    pub applied_to_ledger: bool,
    pub applied_to_fallback: bool,
    pub warning: Option<String>,
}

/// Merged read view of a scheme.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeView {
    pub id: u64,
    pub name: String,
    pub total_funds: Decimal,
    pub used_funds: Decimal,
    pub remaining_funds: Decimal,
    pub eligibility_criteria: String,
    /// Where this view was read from ("ledger" or "fallback").
    pub source: &'static str,
}

impl SchemeView {
    pub fn remaining(&self) -> Decimal {
        self.remaining_funds
    }
}

/// Aggregate fund totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundStats {
    pub total_schemes: u64,
    pub total_allocated: Decimal,
    pub total_used: Decimal,
    pub source: &'static str,
}

/// Schemes the ledger never saw.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceReport {
    pub fallback_only: Vec<u64>,
    pub checked_at: DateTime<Utc>,
}

/// Result of a replay pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// Scheme ids replayed onto the ledger and marked reconciled.
    pub replayed: Vec<u64>,
    /// Scheme ids the ledger cannot reproduce under the same id; left as-is.
    pub skipped: Vec<u64>,
}
