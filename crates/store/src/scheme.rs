//! Scheme records - the fallback side of the fund state

use chrono::{DateTime, Utc};
use fundtrack_core::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

/// Which store currently holds ground truth for a scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Registered on the ledger; the fallback row mirrors it.
    LedgerAuthoritative,
    /// Registered in the fallback store only; the ledger never saw it.
    FallbackOnly,
    /// Was fallback-only, later replayed onto the ledger.
    Reconciled,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::LedgerAuthoritative => "ledger-authoritative",
            SyncState::FallbackOnly => "fallback-only",
            SyncState::Reconciled => "reconciled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ledger-authoritative" => Some(SyncState::LedgerAuthoritative),
            "fallback-only" => Some(SyncState::FallbackOnly),
            "reconciled" => Some(SyncState::Reconciled),
            _ => None,
        }
    }
}

/// A scheme row in the fallback store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub scheme_id: u64,
    pub name: String,
    pub total_funds: Amount,
    pub used_funds: Amount,
    pub eligibility: String,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SchemeRecord {
    pub fn remaining(&self) -> Decimal {
        self.total_funds.value() - self.used_funds.value()
    }
}

/// Outcome of the guarded usage increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageApply {
    /// Increment committed.
    Applied,
    /// Guard rejected the increment.
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    /// No row for the scheme id.
    NotFound,
}

/// Aggregate totals across all schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub scheme_count: u64,
    pub total_allocated: Decimal,
    pub total_used: Decimal,
}

/// SQLite persistence for scheme records.
#[derive(Clone)]
pub struct SchemeStore {
    pool: SqlitePool,
}

impl SchemeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the schema
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schemes (
                scheme_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                total_funds TEXT NOT NULL,
                used_funds TEXT NOT NULL DEFAULT '0',
                eligibility TEXT NOT NULL DEFAULT '',
                sync_state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_schemes_sync_state
            ON schemes(sync_state)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a scheme, or update name/budget/eligibility if the id exists.
    ///
    /// `used_funds` is left untouched on conflict so a re-registration can
    /// never erase settled usage.
    pub async fn upsert(
        &self,
        scheme_id: u64,
        name: &str,
        total_funds: Amount,
        used_funds: Amount,
        eligibility: &str,
        sync_state: SyncState,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO schemes (scheme_id, name, total_funds, used_funds, eligibility, sync_state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(scheme_id) DO UPDATE SET
                name = excluded.name,
                total_funds = excluded.total_funds,
                eligibility = excluded.eligibility,
                sync_state = excluded.sync_state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scheme_id as i64)
        .bind(name)
        .bind(total_funds.value().to_string())
        .bind(used_funds.value().to_string())
        .bind(eligibility)
        .bind(sync_state.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a scheme, `None` if absent.
    pub async fn find(&self, scheme_id: u64) -> Result<Option<SchemeRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT scheme_id, name, total_funds, used_funds, eligibility, sync_state, created_at, updated_at
             FROM schemes WHERE scheme_id = ?",
        )
        .bind(scheme_id as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// Look up a scheme, error if absent.
    pub async fn get(&self, scheme_id: u64) -> Result<SchemeRecord, StoreError> {
        self.find(scheme_id)
            .await?
            .ok_or(StoreError::SchemeNotFound(scheme_id))
    }

    /// All schemes ordered by id.
    pub async fn list(&self) -> Result<Vec<SchemeRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT scheme_id, name, total_funds, used_funds, eligibility, sync_state, created_at, updated_at
             FROM schemes ORDER BY scheme_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Schemes in a given sync state, ordered by id.
    pub async fn list_by_sync_state(
        &self,
        sync_state: SyncState,
    ) -> Result<Vec<SchemeRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT scheme_id, name, total_funds, used_funds, eligibility, sync_state, created_at, updated_at
             FROM schemes WHERE sync_state = ? ORDER BY scheme_id ASC",
        )
        .bind(sync_state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Highest assigned scheme id, `None` when the table is empty.
    ///
    /// Fallback-only registration assigns `max + 1`.
    pub async fn max_scheme_id(&self) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT MAX(scheme_id) AS max_id FROM schemes")
            .fetch_one(&self.pool)
            .await?;

        let max_id: Option<i64> = row.get("max_id");
        Ok(max_id.map(|id| id as u64))
    }

    /// Atomically add `amount` to a scheme's used funds, guarded by the
    /// remaining-balance check.
    ///
    /// The guard and the increment are one UPDATE statement, so concurrent
    /// requests against the same scheme cannot interleave a stale
    /// read-modify-write.
    pub async fn apply_usage(
        &self,
        scheme_id: u64,
        amount: Amount,
    ) -> Result<UsageApply, StoreError> {
        let delta = amount.value().to_string();
        let result = sqlx::query(
            r#"
            UPDATE schemes
            SET used_funds = CAST((CAST(used_funds AS REAL) + CAST(?1 AS REAL)) AS TEXT),
                updated_at = ?2
            WHERE scheme_id = ?3
              AND CAST(used_funds AS REAL) + CAST(?1 AS REAL) <= CAST(total_funds AS REAL)
            "#,
        )
        .bind(&delta)
        .bind(Utc::now().to_rfc3339())
        .bind(scheme_id as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(UsageApply::Applied);
        }

        // Guard rejected or row missing; read back to tell which.
        match self.find(scheme_id).await? {
            Some(record) => Ok(UsageApply::InsufficientFunds {
                available: record.remaining(),
                requested: amount.value(),
            }),
            None => Ok(UsageApply::NotFound),
        }
    }

    /// Update the sync state marker for a scheme.
    pub async fn set_sync_state(
        &self,
        scheme_id: u64,
        sync_state: SyncState,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE schemes SET sync_state = ?, updated_at = ? WHERE scheme_id = ?",
        )
        .bind(sync_state.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(scheme_id as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::SchemeNotFound(scheme_id));
        }

        Ok(())
    }

    /// Aggregate totals for the stats view.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS scheme_count,
                   COALESCE(SUM(CAST(total_funds AS REAL)), 0.0) AS total_allocated,
                   COALESCE(SUM(CAST(used_funds AS REAL)), 0.0) AS total_used
            FROM schemes
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let scheme_count: i64 = row.get("scheme_count");
        let total_allocated: f64 = row.get("total_allocated");
        let total_used: f64 = row.get("total_used");

        Ok(StoreStats {
            scheme_count: scheme_count as u64,
            total_allocated: Decimal::try_from(total_allocated)
                .map_err(|e| StoreError::Malformed(e.to_string()))?,
            total_used: Decimal::try_from(total_used)
                .map_err(|e| StoreError::Malformed(e.to_string()))?,
        })
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<SchemeRecord, StoreError> {
    let scheme_id: i64 = row.get("scheme_id");
    let total_funds: String = row.get("total_funds");
    let used_funds: String = row.get("used_funds");
    let sync_state: String = row.get("sync_state");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(SchemeRecord {
        scheme_id: scheme_id as u64,
        name: row.get("name"),
        total_funds: parse_amount(&total_funds)?,
        used_funds: parse_amount(&used_funds)?,
        eligibility: row.get("eligibility"),
        sync_state: SyncState::from_str(&sync_state)
            .ok_or_else(|| StoreError::Malformed(format!("sync_state '{}'", sync_state)))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub(crate) fn parse_amount(s: &str) -> Result<Amount, StoreError> {
    let value: Decimal = s
        .parse()
        .map_err(|_| StoreError::Malformed(format!("amount '{}'", s)))?;
    Amount::new(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Malformed(format!("timestamp '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_in_memory;

    fn amount(val: i64) -> Amount {
        Amount::new(Decimal::new(val, 0)).unwrap()
    }

    async fn test_store() -> SchemeStore {
        let pool = connect_in_memory().await.unwrap();
        let store = SchemeStore::new(pool);
        store.init().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "rural households", SyncState::LedgerAuthoritative)
            .await
            .unwrap();

        let record = store.get(1).await.unwrap();
        assert_eq!(record.name, "Health");
        assert_eq!(record.total_funds, amount(1000));
        assert_eq!(record.used_funds, Amount::ZERO);
        assert_eq!(record.sync_state, SyncState::LedgerAuthoritative);
    }

    #[tokio::test]
    async fn test_upsert_preserves_used_funds() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "", SyncState::LedgerAuthoritative)
            .await
            .unwrap();
        store.apply_usage(1, amount(400)).await.unwrap();

        // Re-registering with new budget keeps the settled usage.
        store
            .upsert(1, "Health v2", amount(2000), Amount::ZERO, "updated", SyncState::LedgerAuthoritative)
            .await
            .unwrap();

        let record = store.get(1).await.unwrap();
        assert_eq!(record.name, "Health v2");
        assert_eq!(record.total_funds, amount(2000));
        assert_eq!(record.used_funds, amount(400));
    }

    #[tokio::test]
    async fn test_apply_usage_guard() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();

        assert_eq!(store.apply_usage(1, amount(400)).await.unwrap(), UsageApply::Applied);

        let rejected = store.apply_usage(1, amount(700)).await.unwrap();
        assert_eq!(
            rejected,
            UsageApply::InsufficientFunds {
                available: Decimal::new(600, 0),
                requested: Decimal::new(700, 0),
            }
        );

        // Unchanged after rejection
        assert_eq!(store.get(1).await.unwrap().used_funds, amount(400));
    }

    #[tokio::test]
    async fn test_apply_usage_exact_drain() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();

        assert_eq!(store.apply_usage(1, amount(1000)).await.unwrap(), UsageApply::Applied);
        assert_eq!(store.get(1).await.unwrap().remaining(), Decimal::ZERO);

        let rejected = store.apply_usage(1, amount(1)).await.unwrap();
        assert!(matches!(rejected, UsageApply::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_apply_usage_unknown_scheme() {
        let store = test_store().await;
        assert_eq!(store.apply_usage(99, amount(1)).await.unwrap(), UsageApply::NotFound);
    }

    #[tokio::test]
    async fn test_max_scheme_id() {
        let store = test_store().await;
        assert_eq!(store.max_scheme_id().await.unwrap(), None);

        store
            .upsert(3, "A", amount(10), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();
        store
            .upsert(7, "B", amount(10), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();

        assert_eq!(store.max_scheme_id().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_sync_state_transitions() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();

        let fallback_only = store.list_by_sync_state(SyncState::FallbackOnly).await.unwrap();
        assert_eq!(fallback_only.len(), 1);

        store.set_sync_state(1, SyncState::Reconciled).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().sync_state, SyncState::Reconciled);
        assert!(store
            .list_by_sync_state(SyncState::FallbackOnly)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = test_store().await;
        store
            .upsert(1, "Health", amount(1000), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();
        store
            .upsert(2, "Roads", amount(5000), Amount::ZERO, "", SyncState::FallbackOnly)
            .await
            .unwrap();
        store.apply_usage(2, amount(1500)).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.scheme_count, 2);
        assert_eq!(stats.total_allocated, Decimal::new(6000, 0));
        assert_eq!(stats.total_used, Decimal::new(1500, 0));
    }
}
