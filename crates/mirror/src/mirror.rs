//! The ledger mirror - chain-first writes with fallback degradation

use chrono::Utc;
use fundtrack_chain::{ChainError, FundLedger};
use fundtrack_core::{Amount, SettlementId};
use fundtrack_store::{
    SchemeStore, SettlementFilter, SettlementRecord, SettlementStore, StoreError, SyncState,
    UsageApply,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::MirrorError;
use crate::outcome::{
    DivergenceReport, FundStats, ReconcileOutcome, RegisterOutcome, SchemeView, UsageOutcome,
};

/// Reconciles fund state across the on-chain ledger and the fallback store.
///
/// Holds its store and chain handles explicitly; constructed once at startup
/// and shared behind an `Arc`.
pub struct LedgerMirror {
    chain: Arc<dyn FundLedger>,
    schemes: SchemeStore,
    settlements: SettlementStore,
}

impl LedgerMirror {
    pub fn new(chain: Arc<dyn FundLedger>, schemes: SchemeStore, settlements: SettlementStore) -> Self {
        Self {
            chain,
            schemes,
            settlements,
        }
    }

    pub fn schemes(&self) -> &SchemeStore {
        &self.schemes
    }

    pub fn settlements(&self) -> &SettlementStore {
        &self.settlements
    }

    /// Register a new scheme.
    ///
    /// Ledger first; the id is the contract's post-increment counter value.
    /// When the ledger path fails and the fallback store is reachable, the id
    /// is synthesized as `max + 1` and the scheme is marked fallback-only.
    pub async fn register_scheme(
        &self,
        name: &str,
        total_funds: Amount,
        eligibility: &str,
    ) -> Result<RegisterOutcome, MirrorError> {
        if name.trim().is_empty() {
            return Err(MirrorError::Validation("scheme name is required".to_string()));
        }

        match self.register_on_chain(name, total_funds).await {
            Ok((scheme_id, tx_hash)) => {
                info!(scheme_id, tx_hash = %tx_hash, "scheme registered on ledger");

                // Mirror into the fallback store; failure here degrades the
                // mirror, not the operation.
                let mirrored = self
                    .schemes
                    .upsert(
                        scheme_id,
                        name,
                        total_funds,
                        Amount::ZERO,
                        eligibility,
                        SyncState::LedgerAuthoritative,
                    )
                    .await;

                let (applied_to_fallback, warning) = match mirrored {
                    Ok(()) => (true, None),
                    Err(e) => {
                        warn!(scheme_id, error = %e, "fallback mirror write failed after ledger success");
                        (
                            false,
                            Some("Ledger updated but fallback store was not reachable".to_string()),
                        )
                    }
                };

                Ok(RegisterOutcome {
                    scheme_id,
                    ledger_tx_hash: Some(tx_hash),
                    applied_to_ledger: true,
                    applied_to_fallback,
                    warning,
                })
            }
            Err(chain_err) => {
                error!(name, error = %chain_err, "ledger registration failed, trying fallback");
                self.register_fallback_only(name, total_funds, eligibility, &chain_err)
                    .await
            }
        }
    }

    async fn register_on_chain(
        &self,
        name: &str,
        total_funds: Amount,
    ) -> Result<(u64, String), ChainError> {
        let receipt = self
            .chain
            .add_scheme(name, total_funds.to_ledger_units())
            .await?;
        if receipt.is_empty() {
            return Err(ChainError::EmptyReceipt);
        }

        // The contract increments the counter before assigning it as the id,
        // so the fresh id equals the post-write counter. A failed read-back
        // after a confirmed write degrades to the fallback path.
        let scheme_id = self.chain.scheme_count().await?;
        Ok((scheme_id, receipt.tx_hash))
    }

    async fn register_fallback_only(
        &self,
        name: &str,
        total_funds: Amount,
        eligibility: &str,
        chain_err: &ChainError,
    ) -> Result<RegisterOutcome, MirrorError> {
        let next_id = async {
            let max = self.schemes.max_scheme_id().await?;
            Ok::<u64, StoreError>(max.map_or(1, |id| id + 1))
        }
        .await
        .map_err(|store_err| both_unavailable(chain_err, &store_err))?;

        self.schemes
            .upsert(
                next_id,
                name,
                total_funds,
                Amount::ZERO,
                eligibility,
                SyncState::FallbackOnly,
            )
            .await
            .map_err(|store_err| both_unavailable(chain_err, &store_err))?;

        info!(scheme_id = next_id, "scheme registered in fallback store only");

        Ok(RegisterOutcome {
            scheme_id: next_id,
            ledger_tx_hash: None,
            applied_to_ledger: false,
            applied_to_fallback: true,
            warning: Some("Ledger unavailable; scheme saved to fallback store only".to_string()),
        })
    }

    /// Apply fund usage against a scheme.
    ///
    /// Business rules (positive amount, known scheme, sufficient remaining
    /// funds) are enforced against the fallback view and are terminal; ledger
    /// failures only reroute the write.
    pub async fn apply_fund_usage(
        &self,
        scheme_id: u64,
        amount: Amount,
        executor: &str,
        purpose: &str,
    ) -> Result<UsageOutcome, MirrorError> {
        if amount.is_zero() {
            return Err(MirrorError::Validation("amount must be positive".to_string()));
        }
        if executor.trim().is_empty() {
            return Err(MirrorError::Validation("executor is required".to_string()));
        }

        // The contract's own enforcement is opaque, so the remaining-funds
        // rule is checked against the fallback view up front. A scheme the
        // fallback store does not know may still exist on chain.
        let fallback_view = match self.schemes.find(scheme_id).await {
            Ok(view) => Ok(view),
            Err(e) => {
                warn!(scheme_id, error = %e, "fallback store unreadable during pre-check");
                Err(e)
            }
        };
        if let Ok(Some(ref record)) = fallback_view {
            if amount.value() > record.remaining() {
                return Err(MirrorError::InsufficientFunds {
                    available: record.remaining(),
                    requested: amount.value(),
                });
            }
        }

        match self.use_fund_on_chain(scheme_id, amount).await {
            Ok(tx_hash) => {
                info!(scheme_id, %amount, tx_hash = %tx_hash, "fund usage confirmed on ledger");
                self.settle(
                    SettlementId::on_chain(tx_hash),
                    scheme_id,
                    amount,
                    executor,
                    purpose,
                    true,
                )
                .await
            }
            Err(chain_err) => {
                error!(scheme_id, %amount, error = %chain_err, "ledger usage failed, trying fallback");

                let record = match fallback_view {
                    Ok(Some(record)) => record,
                    Ok(None) => return Err(MirrorError::SchemeNotFound(scheme_id)),
                    Err(store_err) => return Err(both_unavailable(&chain_err, &store_err)),
                };
                if amount.value() > record.remaining() {
                    return Err(MirrorError::InsufficientFunds {
                        available: record.remaining(),
                        requested: amount.value(),
                    });
                }

                self.settle(
                    SettlementId::synthetic(Utc::now()),
                    scheme_id,
                    amount,
                    executor,
                    purpose,
                    false,
                )
                .await
            }
        }
    }

    async fn use_fund_on_chain(&self, scheme_id: u64, amount: Amount) -> Result<String, ChainError> {
        let receipt = self
            .chain
            .use_fund(scheme_id, amount.to_ledger_units())
            .await?;
        if receipt.is_empty() {
            return Err(ChainError::EmptyReceipt);
        }
        Ok(receipt.tx_hash)
    }

    /// Record the settlement and bump the fallback balance exactly once.
    ///
    /// On the chain path the settlement insert is the dedup gate: only a
    /// fresh row applies the increment, so a client retry reusing the same
    /// confirmed ledger hash can never double-charge the scheme. On the
    /// fallback path the synthetic id is fresh by construction, so the
    /// guarded increment runs first and stays authoritative under races.
    async fn settle(
        &self,
        settlement_id: SettlementId,
        scheme_id: u64,
        amount: Amount,
        executor: &str,
        purpose: &str,
        applied_to_ledger: bool,
    ) -> Result<UsageOutcome, MirrorError> {
        let record = SettlementRecord {
            settlement_id: settlement_id.clone(),
            scheme_id,
            amount,
            purpose: if purpose.trim().is_empty() {
                "Fund usage".to_string()
            } else {
                purpose.to_string()
            },
            executor: executor.to_string(),
            recorded_at: Utc::now(),
        };

        if applied_to_ledger {
            self.settle_confirmed(record).await
        } else {
            self.settle_fallback(record).await
        }
    }

    /// Chain path: settlement row first (dedup gate), then the increment.
    async fn settle_confirmed(&self, record: SettlementRecord) -> Result<UsageOutcome, MirrorError> {
        let settlement_id = record.settlement_id.clone();
        let scheme_id = record.scheme_id;
        let amount = record.amount;

        let degraded = |warning: &str| UsageOutcome {
            settlement_id: settlement_id.clone(),
            scheme_id,
            applied_to_ledger: true,
            applied_to_fallback: false,
            warning: Some(warning.to_string()),
        };

        let fresh = match self.settlements.insert(&record).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(scheme_id, settlement_id = %settlement_id, error = %e,
                    "settlement bookkeeping failed after ledger success");
                return Ok(degraded("Ledger updated but fallback store was not reachable"));
            }
        };

        if !fresh {
            info!(settlement_id = %settlement_id, "duplicate settlement, increment already applied");
            return Ok(UsageOutcome {
                settlement_id,
                scheme_id,
                applied_to_ledger: true,
                applied_to_fallback: true,
                warning: Some("Settlement already recorded; balance unchanged".to_string()),
            });
        }

        match self.schemes.apply_usage(scheme_id, amount).await {
            Ok(UsageApply::Applied) => Ok(UsageOutcome {
                settlement_id,
                scheme_id,
                applied_to_ledger: true,
                applied_to_fallback: true,
                warning: None,
            }),
            Ok(UsageApply::NotFound) => {
                // Fallback store never saw the scheme; catch it up from the
                // on-chain snapshot, which already reflects this usage.
                self.catch_up_from_chain(scheme_id).await;
                Ok(UsageOutcome {
                    settlement_id,
                    scheme_id,
                    applied_to_ledger: true,
                    applied_to_fallback: true,
                    warning: None,
                })
            }
            Ok(UsageApply::InsufficientFunds {
                available,
                requested,
            }) => {
                // The ledger accepted what the stale fallback view would not.
                warn!(scheme_id, %available, %requested,
                    "fallback balance diverges from ledger, increment skipped");
                Ok(degraded("Fallback balance diverges from ledger"))
            }
            Err(e) => {
                warn!(scheme_id, error = %e, "fallback increment failed after ledger success");
                Ok(degraded("Ledger updated but fallback store was not reachable"))
            }
        }
    }

    /// Fallback path: guarded increment first, settlement row second.
    async fn settle_fallback(&self, record: SettlementRecord) -> Result<UsageOutcome, MirrorError> {
        let settlement_id = record.settlement_id.clone();
        let scheme_id = record.scheme_id;
        let amount = record.amount;

        match self.schemes.apply_usage(scheme_id, amount).await {
            Ok(UsageApply::Applied) => {}
            Ok(UsageApply::NotFound) => return Err(MirrorError::SchemeNotFound(scheme_id)),
            Ok(UsageApply::InsufficientFunds {
                available,
                requested,
            }) => {
                return Err(MirrorError::InsufficientFunds {
                    available,
                    requested,
                })
            }
            Err(e) => {
                return Err(MirrorError::StoreUnavailable {
                    detail: format!("ledger failed and fallback increment failed: {}", e),
                })
            }
        }

        if let Err(e) = self.settlements.insert(&record).await {
            // The increment is committed; losing the settlement row here is a
            // bookkeeping gap, not a failed operation.
            error!(scheme_id, settlement_id = %settlement_id, error = %e,
                "settlement record lost after fallback increment");
            return Ok(UsageOutcome {
                settlement_id,
                scheme_id,
                applied_to_ledger: false,
                applied_to_fallback: true,
                warning: Some("Usage applied but settlement record could not be written".to_string()),
            });
        }

        Ok(UsageOutcome {
            settlement_id,
            scheme_id,
            applied_to_ledger: false,
            applied_to_fallback: true,
            warning: Some("Ledger unavailable; settlement saved to fallback store only".to_string()),
        })
    }

    async fn catch_up_from_chain(&self, scheme_id: u64) {
        match self.chain.get_scheme(scheme_id).await {
            Ok(snapshot) => {
                let total = Amount::new_unchecked(Decimal::from(snapshot.total_funds));
                let used = Amount::new_unchecked(Decimal::from(snapshot.used_funds));
                if let Err(e) = self
                    .schemes
                    .upsert(
                        scheme_id,
                        &snapshot.name,
                        total,
                        used,
                        "",
                        SyncState::LedgerAuthoritative,
                    )
                    .await
                {
                    warn!(scheme_id, error = %e, "could not seed fallback record from chain snapshot");
                } else {
                    info!(scheme_id, "fallback record seeded from chain snapshot");
                }
            }
            Err(e) => {
                warn!(scheme_id, error = %e, "could not read chain snapshot for catch-up");
            }
        }
    }

    /// Read one scheme, ledger first.
    ///
    /// Eligibility text lives only in the fallback store and is merged into
    /// ledger reads.
    pub async fn scheme(&self, scheme_id: u64) -> Result<SchemeView, MirrorError> {
        match self.chain.get_scheme(scheme_id).await {
            Ok(snapshot) => {
                let eligibility = self
                    .schemes
                    .find(scheme_id)
                    .await
                    .ok()
                    .flatten()
                    .map(|r| r.eligibility)
                    .unwrap_or_default();

                let total = Decimal::from(snapshot.total_funds);
                let used = Decimal::from(snapshot.used_funds);
                Ok(SchemeView {
                    id: snapshot.id,
                    name: snapshot.name,
                    total_funds: total,
                    used_funds: used,
                    remaining_funds: total - used,
                    eligibility_criteria: eligibility,
                    source: "ledger",
                })
            }
            Err(chain_err) => {
                warn!(scheme_id, error = %chain_err, "ledger read failed, serving fallback view");
                match self.schemes.find(scheme_id).await {
                    Ok(Some(record)) => Ok(scheme_view_from_record(record)),
                    Ok(None) => Err(MirrorError::SchemeNotFound(scheme_id)),
                    Err(store_err) => Err(both_unavailable(&chain_err, &store_err)),
                }
            }
        }
    }

    /// List all schemes, ledger first.
    pub async fn list_schemes(&self) -> Result<Vec<SchemeView>, MirrorError> {
        match self.chain.scheme_count().await {
            Ok(count) => {
                let mut eligibility = self.eligibility_by_id().await;
                let mut views = Vec::new();
                // Ids start at 1: the contract pre-increments its counter.
                for id in 1..=count {
                    match self.chain.get_scheme(id).await {
                        Ok(snapshot) if snapshot.id > 0 && !snapshot.name.is_empty() => {
                            let total = Decimal::from(snapshot.total_funds);
                            let used = Decimal::from(snapshot.used_funds);
                            views.push(SchemeView {
                                id: snapshot.id,
                                name: snapshot.name,
                                total_funds: total,
                                used_funds: used,
                                remaining_funds: total - used,
                                eligibility_criteria: eligibility.remove(&id).unwrap_or_default(),
                                source: "ledger",
                            });
                        }
                        Ok(_) => {}
                        Err(e) => warn!(scheme_id = id, error = %e, "skipping unreadable scheme slot"),
                    }
                }
                Ok(views)
            }
            Err(chain_err) => {
                warn!(error = %chain_err, "ledger listing failed, serving fallback view");
                let records = self
                    .schemes
                    .list()
                    .await
                    .map_err(|store_err| both_unavailable(&chain_err, &store_err))?;
                Ok(records.into_iter().map(scheme_view_from_record).collect())
            }
        }
    }

    async fn eligibility_by_id(&self) -> HashMap<u64, String> {
        match self.schemes.list().await {
            Ok(records) => records
                .into_iter()
                .map(|r| (r.scheme_id, r.eligibility))
                .collect(),
            Err(e) => {
                warn!(error = %e, "eligibility merge unavailable");
                HashMap::new()
            }
        }
    }

    /// Aggregate totals; the fallback store is the cheap primary source, the
    /// chain walk covers a store outage.
    pub async fn stats(&self) -> Result<FundStats, MirrorError> {
        match self.schemes.stats().await {
            Ok(stats) => Ok(FundStats {
                total_schemes: stats.scheme_count,
                total_allocated: stats.total_allocated,
                total_used: stats.total_used,
                source: "fallback",
            }),
            Err(store_err) => {
                warn!(error = %store_err, "store stats failed, walking the ledger");
                let count = self.chain.scheme_count().await.map_err(|chain_err| {
                    both_unavailable(&chain_err, &store_err)
                })?;

                let mut total_allocated = Decimal::ZERO;
                let mut total_used = Decimal::ZERO;
                for id in 1..=count {
                    if let Ok(snapshot) = self.chain.get_scheme(id).await {
                        total_allocated += Decimal::from(snapshot.total_funds);
                        total_used += Decimal::from(snapshot.used_funds);
                    }
                }

                Ok(FundStats {
                    total_schemes: count,
                    total_allocated,
                    total_used,
                    source: "ledger",
                })
            }
        }
    }

    /// Filtered settlement listing (fallback store only; the chain has no
    /// queryable settlement log).
    pub async fn settlement_history(
        &self,
        filter: &SettlementFilter,
    ) -> Result<Vec<SettlementRecord>, MirrorError> {
        Ok(self.settlements.list(filter).await?)
    }

    /// Schemes the ledger never saw.
    pub async fn detect_divergence(&self) -> Result<DivergenceReport, MirrorError> {
        let fallback_only = self
            .schemes
            .list_by_sync_state(SyncState::FallbackOnly)
            .await?
            .into_iter()
            .map(|r| r.scheme_id)
            .collect();

        Ok(DivergenceReport {
            fallback_only,
            checked_at: Utc::now(),
        })
    }

    /// Replay fallback-only schemes onto the ledger.
    ///
    /// A scheme is replayed only when the contract counter would assign it
    /// the same id (`count + 1`); anything else is reported and left alone
    /// rather than remapped.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, MirrorError> {
        let candidates = self
            .schemes
            .list_by_sync_state(SyncState::FallbackOnly)
            .await?;

        let mut replayed = Vec::new();
        let mut skipped = Vec::new();

        for record in candidates {
            let count = match self.chain.scheme_count().await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "ledger unreachable, reconciliation deferred");
                    skipped.push(record.scheme_id);
                    continue;
                }
            };

            if count + 1 != record.scheme_id {
                warn!(
                    scheme_id = record.scheme_id,
                    ledger_count = count,
                    "ledger would assign a different id, divergence left in place"
                );
                skipped.push(record.scheme_id);
                continue;
            }

            if let Err(e) = self
                .chain
                .add_scheme(&record.name, record.total_funds.to_ledger_units())
                .await
            {
                warn!(scheme_id = record.scheme_id, error = %e, "scheme replay failed");
                skipped.push(record.scheme_id);
                continue;
            }

            // Replay this scheme's settlements so the on-chain counter
            // catches up with the fallback balance.
            match self.settlements.list_for_scheme(record.scheme_id).await {
                Ok(settlements) => {
                    for settlement in settlements {
                        if let Err(e) = self
                            .chain
                            .use_fund(record.scheme_id, settlement.amount.to_ledger_units())
                            .await
                        {
                            warn!(
                                scheme_id = record.scheme_id,
                                settlement_id = %settlement.settlement_id,
                                error = %e,
                                "settlement replay failed"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(scheme_id = record.scheme_id, error = %e, "settlement listing failed during replay");
                }
            }

            self.schemes
                .set_sync_state(record.scheme_id, SyncState::Reconciled)
                .await?;
            info!(scheme_id = record.scheme_id, "scheme replayed onto ledger");
            replayed.push(record.scheme_id);
        }

        Ok(ReconcileOutcome { replayed, skipped })
    }
}

fn scheme_view_from_record(record: fundtrack_store::SchemeRecord) -> SchemeView {
    let total = record.total_funds.value();
    let used = record.used_funds.value();
    SchemeView {
        id: record.scheme_id,
        name: record.name,
        total_funds: total,
        used_funds: used,
        remaining_funds: total - used,
        eligibility_criteria: record.eligibility,
        source: "fallback",
    }
}

fn both_unavailable(chain_err: &ChainError, store_err: &StoreError) -> MirrorError {
    MirrorError::StoreUnavailable {
        detail: format!("ledger: {}; fallback: {}", chain_err, store_err),
    }
}
