//! Deadline wrapper
//!
//! The mirror must never let a slow ledger node block the fallback path, so
//! every call goes through an explicit timeout. An elapsed deadline surfaces
//! as `ChainError::Timeout`, which the mirror treats like any other ledger
//! failure.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::ChainError;
use crate::types::{FundLedger, OnChainScheme, TxReceipt};

/// Wraps any `FundLedger` with a per-call deadline.
pub struct DeadlineChain<L> {
    inner: L,
    deadline: Duration,
}

impl<L: FundLedger> DeadlineChain<L> {
    pub fn new(inner: L, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout {
                deadline_ms: self.deadline.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl<L: FundLedger> FundLedger for DeadlineChain<L> {
    async fn add_scheme(&self, name: &str, total_units: u64) -> Result<TxReceipt, ChainError> {
        self.bounded(self.inner.add_scheme(name, total_units)).await
    }

    async fn use_fund(&self, scheme_id: u64, units: u64) -> Result<TxReceipt, ChainError> {
        self.bounded(self.inner.use_fund(scheme_id, units)).await
    }

    async fn get_scheme(&self, scheme_id: u64) -> Result<OnChainScheme, ChainError> {
        self.bounded(self.inner.get_scheme(scheme_id)).await
    }

    async fn scheme_count(&self) -> Result<u64, ChainError> {
        self.bounded(self.inner.scheme_count()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockChain;

    /// A ledger that never answers.
    struct StuckChain;

    #[async_trait]
    impl FundLedger for StuckChain {
        async fn add_scheme(&self, _name: &str, _units: u64) -> Result<TxReceipt, ChainError> {
            std::future::pending().await
        }

        async fn use_fund(&self, _id: u64, _units: u64) -> Result<TxReceipt, ChainError> {
            std::future::pending().await
        }

        async fn get_scheme(&self, _id: u64) -> Result<OnChainScheme, ChainError> {
            std::future::pending().await
        }

        async fn scheme_count(&self) -> Result<u64, ChainError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_hanging_call_times_out() {
        let chain = DeadlineChain::new(StuckChain, Duration::from_millis(10));
        let result = chain.add_scheme("Health", 1000).await;
        assert!(matches!(result, Err(ChainError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let chain = DeadlineChain::new(MockChain::new(), Duration::from_secs(5));
        chain.add_scheme("Health", 1000).await.unwrap();
        assert_eq!(chain.scheme_count().await.unwrap(), 1);
    }
}
