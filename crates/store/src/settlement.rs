//! Settlement records - append-only fund-usage log
//!
//! Settlements are deduplicated by their identifier: the insert uses
//! conflict-ignore semantics and reports whether the row was fresh, which is
//! what lets the mirror apply the used-funds increment exactly once per
//! settlement id.

use chrono::{DateTime, Utc};
use fundtrack_core::{Amount, SettlementId};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;
use crate::scheme::{parse_amount, parse_datetime};

/// A recorded fund-usage settlement. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_id: SettlementId,
    pub scheme_id: u64,
    pub amount: Amount,
    pub purpose: String,
    pub executor: String,
    pub recorded_at: DateTime<Utc>,
}

/// Listing filter. All fields optional; unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub scheme_id: Option<u64>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Case-insensitive substring over purpose and executor.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// SQLite persistence for settlements.
#[derive(Clone)]
pub struct SettlementStore {
    pool: SqlitePool,
}

impl SettlementStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the schema
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settlements (
                settlement_id TEXT PRIMARY KEY,
                scheme_id INTEGER NOT NULL,
                amount TEXT NOT NULL,
                purpose TEXT NOT NULL DEFAULT '',
                executor TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_settlements_scheme
            ON settlements(scheme_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a settlement unless its id already exists.
    ///
    /// Returns `true` when the row was fresh, `false` on a duplicate id.
    pub async fn insert(&self, record: &SettlementRecord) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO settlements (settlement_id, scheme_id, amount, purpose, executor, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(settlement_id) DO NOTHING
            "#,
        )
        .bind(record.settlement_id.as_str())
        .bind(record.scheme_id as i64)
        .bind(record.amount.value().to_string())
        .bind(&record.purpose)
        .bind(&record.executor)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Look up a settlement by id.
    pub async fn find(&self, id: &SettlementId) -> Result<Option<SettlementRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT settlement_id, scheme_id, amount, purpose, executor, recorded_at
             FROM settlements WHERE settlement_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    pub async fn exists(&self, id: &SettlementId) -> Result<bool, StoreError> {
        Ok(self.find(id).await?.is_some())
    }

    /// Settlements for one scheme, newest first.
    pub async fn list_for_scheme(
        &self,
        scheme_id: u64,
    ) -> Result<Vec<SettlementRecord>, StoreError> {
        self.list(&SettlementFilter {
            scheme_id: Some(scheme_id),
            ..SettlementFilter::default()
        })
        .await
    }

    /// Filtered listing, newest first.
    ///
    /// The scheme filter and limit run in SQL; date range and free-text
    /// search are applied to the fetched page.
    pub async fn list(&self, filter: &SettlementFilter) -> Result<Vec<SettlementRecord>, StoreError> {
        let limit = filter.limit.unwrap_or(1000) as i64;

        let rows = match filter.scheme_id {
            Some(scheme_id) => {
                sqlx::query(
                    "SELECT settlement_id, scheme_id, amount, purpose, executor, recorded_at
                     FROM settlements WHERE scheme_id = ?
                     ORDER BY recorded_at DESC LIMIT ?",
                )
                .bind(scheme_id as i64)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT settlement_id, scheme_id, amount, purpose, executor, recorded_at
                     FROM settlements ORDER BY recorded_at DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut records = Vec::new();
        for row in rows {
            let record = row_to_record(row)?;
            if let Some(from) = filter.from {
                if record.recorded_at < from {
                    continue;
                }
            }
            if let Some(to) = filter.to {
                if record.recorded_at > to {
                    continue;
                }
            }
            if let Some(ref needle) = needle {
                let hit = record.purpose.to_lowercase().contains(needle)
                    || record.executor.to_lowercase().contains(needle);
                if !hit {
                    continue;
                }
            }
            records.push(record);
        }

        Ok(records)
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<SettlementRecord, StoreError> {
    let settlement_id: String = row.get("settlement_id");
    let scheme_id: i64 = row.get("scheme_id");
    let amount: String = row.get("amount");
    let recorded_at: String = row.get("recorded_at");

    Ok(SettlementRecord {
        settlement_id: SettlementId::from(settlement_id),
        scheme_id: scheme_id as u64,
        amount: parse_amount(&amount)?,
        purpose: row.get("purpose"),
        executor: row.get("executor"),
        recorded_at: parse_datetime(&recorded_at)?,
    })
}
