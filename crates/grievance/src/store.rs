//! SQLite storage for grievances

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::types::{Grievance, GrievanceCategory, GrievanceFilter, GrievanceStatus};
use fundtrack_store::StoreError;

/// SQLite persistence for grievances.
#[derive(Clone)]
pub struct GrievanceStore {
    pool: SqlitePool,
}

impl GrievanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the schema
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS grievances (
                grievance_id TEXT PRIMARY KEY,
                scheme_id INTEGER,
                scheme_name TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                beneficiary_name TEXT NOT NULL DEFAULT '',
                contact_email TEXT NOT NULL DEFAULT '',
                contact_phone TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                submitted_by TEXT NOT NULL,
                reviewed_by TEXT,
                review_notes TEXT,
                reviewed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_grievances_status ON grievances(status)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Save a grievance (insert or full-row replace).
    pub async fn save(&self, grievance: &Grievance) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO grievances
            (grievance_id, scheme_id, scheme_name, category, title, description, location,
             beneficiary_name, contact_email, contact_phone, status, submitted_by,
             reviewed_by, review_notes, reviewed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&grievance.grievance_id)
        .bind(grievance.scheme_id.map(|id| id as i64))
        .bind(&grievance.scheme_name)
        .bind(grievance.category.as_str())
        .bind(&grievance.title)
        .bind(&grievance.description)
        .bind(&grievance.location)
        .bind(&grievance.beneficiary_name)
        .bind(&grievance.contact_email)
        .bind(&grievance.contact_phone)
        .bind(grievance.status.as_str())
        .bind(&grievance.submitted_by)
        .bind(&grievance.reviewed_by)
        .bind(&grievance.review_notes)
        .bind(grievance.reviewed_at.map(|t| t.to_rfc3339()))
        .bind(grievance.created_at.to_rfc3339())
        .bind(grievance.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a grievance by id.
    pub async fn find(&self, id: &str) -> Result<Option<Grievance>, StoreError> {
        let row = sqlx::query("SELECT * FROM grievances WHERE grievance_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_grievance).transpose()
    }

    /// Filtered listing, newest first.
    pub async fn list(&self, filter: &GrievanceFilter) -> Result<Vec<Grievance>, StoreError> {
        let limit = filter.limit.unwrap_or(500) as i64;
        let rows = sqlx::query("SELECT * FROM grievances ORDER BY created_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut grievances = Vec::new();
        for row in rows {
            let grievance = row_to_grievance(row)?;
            if let Some(status) = filter.status {
                if grievance.status != status {
                    continue;
                }
            }
            if let Some(category) = filter.category {
                if grievance.category != category {
                    continue;
                }
            }
            if let Some(ref submitter) = filter.submitted_by {
                if &grievance.submitted_by != submitter {
                    continue;
                }
            }
            if let Some(ref needle) = needle {
                let hit = grievance.title.to_lowercase().contains(needle)
                    || grievance.description.to_lowercase().contains(needle)
                    || grievance.grievance_id.to_lowercase().contains(needle)
                    || grievance.scheme_name.to_lowercase().contains(needle);
                if !hit {
                    continue;
                }
            }
            grievances.push(grievance);
        }

        Ok(grievances)
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Malformed(format!("timestamp '{}'", s)))
}

fn row_to_grievance(row: sqlx::sqlite::SqliteRow) -> Result<Grievance, StoreError> {
    let scheme_id: Option<i64> = row.get("scheme_id");
    let category: String = row.get("category");
    let status: String = row.get("status");
    let reviewed_at: Option<String> = row.get("reviewed_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Grievance {
        grievance_id: row.get("grievance_id"),
        scheme_id: scheme_id.map(|id| id as u64),
        scheme_name: row.get("scheme_name"),
        category: GrievanceCategory::from_str(&category)
            .ok_or_else(|| StoreError::Malformed(format!("category '{}'", category)))?,
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        beneficiary_name: row.get("beneficiary_name"),
        contact_email: row.get("contact_email"),
        contact_phone: row.get("contact_phone"),
        status: GrievanceStatus::from_str(&status)
            .ok_or_else(|| StoreError::Malformed(format!("status '{}'", status)))?,
        submitted_by: row.get("submitted_by"),
        reviewed_by: row.get("reviewed_by"),
        review_notes: row.get("review_notes"),
        reviewed_at: reviewed_at.map(|s| parse_datetime(&s)).transpose()?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}
