//! Settlement identifiers
//!
//! A settlement is identified either by the confirmed ledger transaction hash
//! or by a synthetic identifier minted when the ledger was unavailable and the
//! usage was committed to the fallback store alone. The two kinds are kept as
//! distinct variants so downstream consumers (block-explorer links, audits)
//! can branch on the origin instead of guessing from string shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking synthetic fallback identifiers. Ledger hashes are hex
/// strings (`0x...`), so the prefix guarantees the two namespaces never
/// collide.
const FALLBACK_PREFIX: &str = "fb_";

/// Identifier of a fund-usage settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SettlementId {
    /// Confirmed ledger transaction hash.
    OnChain(String),
    /// Synthetic identifier minted for a fallback-only settlement.
    Fallback(String),
}

impl SettlementId {
    /// Wrap a confirmed ledger transaction hash.
    pub fn on_chain(tx_hash: impl Into<String>) -> Self {
        Self::OnChain(tx_hash.into())
    }

    /// Mint a fresh synthetic identifier, unique per call.
    ///
    /// Format: `fb_<unix-millis>_<uuid8>`. The timestamp keeps ids roughly
    /// sortable; the random suffix rules out collisions within a millisecond.
    pub fn synthetic(now: chrono::DateTime<chrono::Utc>) -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self::Fallback(format!(
            "{}{}_{}",
            FALLBACK_PREFIX,
            now.timestamp_millis(),
            &hex[..8]
        ))
    }

    /// True when this settlement was confirmed on the ledger.
    pub fn is_on_chain(&self) -> bool {
        matches!(self, Self::OnChain(_))
    }

    /// The stored string form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OnChain(hash) => hash,
            Self::Fallback(id) => id,
        }
    }
}

impl From<String> for SettlementId {
    fn from(s: String) -> Self {
        if s.starts_with(FALLBACK_PREFIX) {
            Self::Fallback(s)
        } else {
            Self::OnChain(s)
        }
    }
}

impl From<SettlementId> for String {
    fn from(id: SettlementId) -> Self {
        match id {
            SettlementId::OnChain(hash) => hash,
            SettlementId::Fallback(id) => id,
        }
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_synthetic_is_fallback() {
        let id = SettlementId::synthetic(Utc::now());
        assert!(!id.is_on_chain());
        assert!(id.as_str().starts_with("fb_"));
    }

    #[test]
    fn test_synthetic_unique() {
        let now = Utc::now();
        let a = SettlementId::synthetic(now);
        let b = SettlementId::synthetic(now);
        assert_ne!(a, b);
    }

    #[test]
    fn test_roundtrip_from_storage() {
        let on_chain = SettlementId::from("0xabc123".to_string());
        assert!(on_chain.is_on_chain());

        let fallback = SettlementId::from("fb_1700000000000_deadbeef".to_string());
        assert!(!fallback.is_on_chain());
    }

    #[test]
    fn test_serde_as_string() {
        let id = SettlementId::on_chain("0xfeed");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0xfeed\"");

        let parsed: SettlementId = serde_json::from_str("\"fb_1_cafe0000\"").unwrap();
        assert!(!parsed.is_on_chain());
    }
}
