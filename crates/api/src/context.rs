//! Application context - wires everything together

use fundtrack_chain::{DeadlineChain, FundLedger, MockChain};
use fundtrack_grievance::{GrievanceIntake, GrievanceStore};
use fundtrack_mirror::LedgerMirror;
use fundtrack_store::{SchemeStore, SettlementStore};
use fundtrack_workflow::{UtilizationWorkflow, WorkflowStore};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Which ledger client backs the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChainMode {
    /// In-process contract semantics (dev and test)
    Mock,
    /// No ledger; every operation degrades to the fallback store
    Off,
}

/// Application context - explicit handles, opened once at startup.
pub struct AppContext {
    pub mirror: Arc<LedgerMirror>,
    pub workflow: UtilizationWorkflow,
    pub grievances: GrievanceIntake,
    pool: SqlitePool,
}

impl AppContext {
    /// Open stores under `data_path` and wire the components around the
    /// given ledger client.
    pub async fn new(
        data_path: impl AsRef<Path>,
        chain: Arc<dyn FundLedger>,
    ) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref();
        std::fs::create_dir_all(data_path)?;

        let pool = fundtrack_store::connect(data_path.join("fundtrack.db")).await?;

        let schemes = SchemeStore::new(pool.clone());
        let settlements = SettlementStore::new(pool.clone());
        let workflow_store = WorkflowStore::new(pool.clone());
        let grievance_store = GrievanceStore::new(pool.clone());
        schemes.init().await?;
        settlements.init().await?;
        workflow_store.init().await?;
        grievance_store.init().await?;

        let mirror = Arc::new(LedgerMirror::new(chain, schemes, settlements));
        let workflow = UtilizationWorkflow::new(workflow_store, mirror.clone());
        let grievances = GrievanceIntake::new(grievance_store);

        Ok(Self {
            mirror,
            workflow,
            grievances,
            pool,
        })
    }

    /// Build the ledger client for a deployment mode.
    pub fn chain_for_mode(mode: ChainMode, deadline: Duration) -> Arc<dyn FundLedger> {
        match mode {
            ChainMode::Mock => Arc::new(DeadlineChain::new(MockChain::new(), deadline)),
            ChainMode::Off => Arc::new(DeadlineChain::new(MockChain::unavailable(), deadline)),
        }
    }

    /// Close the store pool. Call at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
