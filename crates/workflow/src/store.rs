//! SQLite storage for the utilization workflow

use chrono::{DateTime, Utc};
use fundtrack_core::SettlementId;
use sqlx::{Row, SqlitePool};

use crate::types::{
    ExpenditureCategory, ExpenditureRecord, RequestFilter, UtilizationCertificate,
    UtilizationRequest, UtilizationStatus,
};
use fundtrack_store::StoreError;

/// SQLite persistence for requests, expenditures, and certificates.
#[derive(Clone)]
pub struct WorkflowStore {
    pool: SqlitePool,
}

impl WorkflowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the schema
    pub async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS utilization_requests (
                request_id TEXT PRIMARY KEY,
                scheme_id INTEGER NOT NULL,
                agency TEXT NOT NULL,
                amount TEXT NOT NULL,
                purpose TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                executor TEXT NOT NULL,
                approved_by TEXT,
                approved_at TEXT,
                rejection_reason TEXT,
                total_expenditure TEXT NOT NULL DEFAULT '0',
                settlement_id TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_requests_agency ON utilization_requests(agency, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS expenditures (
                expenditure_id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                activity TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                amount TEXT NOT NULL,
                category TEXT NOT NULL,
                vendor TEXT NOT NULL DEFAULT '',
                bill_number TEXT NOT NULL DEFAULT '',
                recorded_by TEXT NOT NULL,
                spent_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_expenditures_request ON expenditures(request_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS certificates (
                certificate_no TEXT PRIMARY KEY,
                request_id TEXT NOT NULL UNIQUE,
                scheme_id INTEGER NOT NULL,
                scheme_name TEXT NOT NULL,
                agency TEXT NOT NULL,
                approved_amount TEXT NOT NULL,
                total_expenditure TEXT NOT NULL,
                remaining_balance TEXT NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                issued_by TEXT NOT NULL,
                issued_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Save a request (insert or full-row replace).
    pub async fn save_request(&self, request: &UtilizationRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO utilization_requests
            (request_id, scheme_id, agency, amount, purpose, description, status, executor,
             approved_by, approved_at, rejection_reason, total_expenditure, settlement_id,
             completed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.request_id)
        .bind(request.scheme_id as i64)
        .bind(&request.agency)
        .bind(request.amount.value().to_string())
        .bind(&request.purpose)
        .bind(&request.description)
        .bind(request.status.as_str())
        .bind(&request.executor)
        .bind(&request.approved_by)
        .bind(request.approved_at.map(|t| t.to_rfc3339()))
        .bind(&request.rejection_reason)
        .bind(request.total_expenditure.value().to_string())
        .bind(request.settlement_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(request.completed_at.map(|t| t.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a request by id.
    pub async fn find_request(&self, id: &str) -> Result<Option<UtilizationRequest>, StoreError> {
        let row = sqlx::query("SELECT * FROM utilization_requests WHERE request_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_request).transpose()
    }

    /// An agency's requests, newest first.
    pub async fn list_requests(
        &self,
        agency: &str,
        filter: &RequestFilter,
    ) -> Result<Vec<UtilizationRequest>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM utilization_requests WHERE agency = ? ORDER BY created_at DESC",
        )
        .bind(agency)
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::new();
        for row in rows {
            let request = row_to_request(row)?;
            if let Some(scheme_id) = filter.scheme_id {
                if request.scheme_id != scheme_id {
                    continue;
                }
            }
            if let Some(status) = filter.status {
                if request.status != status {
                    continue;
                }
            }
            requests.push(request);
        }

        Ok(requests)
    }

    pub async fn add_expenditure(&self, record: &ExpenditureRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO expenditures
            (expenditure_id, request_id, activity, description, amount, category, vendor,
             bill_number, recorded_by, spent_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.expenditure_id)
        .bind(&record.request_id)
        .bind(&record.activity)
        .bind(&record.description)
        .bind(record.amount.value().to_string())
        .bind(record.category.as_str())
        .bind(&record.vendor)
        .bind(&record.bill_number)
        .bind(&record.recorded_by)
        .bind(record.spent_at.to_rfc3339())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Expenditures for a request, newest spend first.
    pub async fn list_expenditures(
        &self,
        request_id: &str,
    ) -> Result<Vec<ExpenditureRecord>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM expenditures WHERE request_id = ? ORDER BY spent_at DESC")
                .bind(request_id)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_expenditure).collect()
    }

    pub async fn save_certificate(
        &self,
        certificate: &UtilizationCertificate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO certificates
            (certificate_no, request_id, scheme_id, scheme_name, agency, approved_amount,
             total_expenditure, remaining_balance, period_start, period_end, issued_by, issued_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&certificate.certificate_no)
        .bind(&certificate.request_id)
        .bind(certificate.scheme_id as i64)
        .bind(&certificate.scheme_name)
        .bind(&certificate.agency)
        .bind(certificate.approved_amount.value().to_string())
        .bind(certificate.total_expenditure.value().to_string())
        .bind(certificate.remaining_balance.to_string())
        .bind(certificate.period_start.to_rfc3339())
        .bind(certificate.period_end.to_rfc3339())
        .bind(&certificate.issued_by)
        .bind(certificate.issued_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_certificate(
        &self,
        request_id: &str,
    ) -> Result<Option<UtilizationCertificate>, StoreError> {
        let row = sqlx::query("SELECT * FROM certificates WHERE request_id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_certificate).transpose()
    }
}

fn parse_amount(s: &str) -> Result<fundtrack_core::Amount, StoreError> {
    let value: rust_decimal::Decimal = s
        .parse()
        .map_err(|_| StoreError::Malformed(format!("amount '{}'", s)))?;
    fundtrack_core::Amount::new(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Malformed(format!("timestamp '{}'", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    s.map(|s| parse_datetime(&s)).transpose()
}

fn row_to_request(row: sqlx::sqlite::SqliteRow) -> Result<UtilizationRequest, StoreError> {
    let scheme_id: i64 = row.get("scheme_id");
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    let total_expenditure: String = row.get("total_expenditure");
    let settlement_id: Option<String> = row.get("settlement_id");
    let approved_at: Option<String> = row.get("approved_at");
    let completed_at: Option<String> = row.get("completed_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(UtilizationRequest {
        request_id: row.get("request_id"),
        scheme_id: scheme_id as u64,
        agency: row.get("agency"),
        amount: parse_amount(&amount)?,
        purpose: row.get("purpose"),
        description: row.get("description"),
        status: UtilizationStatus::from_str(&status)
            .ok_or_else(|| StoreError::Malformed(format!("status '{}'", status)))?,
        executor: row.get("executor"),
        approved_by: row.get("approved_by"),
        approved_at: parse_opt_datetime(approved_at)?,
        rejection_reason: row.get("rejection_reason"),
        total_expenditure: parse_amount(&total_expenditure)?,
        settlement_id: settlement_id.map(SettlementId::from),
        completed_at: parse_opt_datetime(completed_at)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn row_to_expenditure(row: sqlx::sqlite::SqliteRow) -> Result<ExpenditureRecord, StoreError> {
    let amount: String = row.get("amount");
    let category: String = row.get("category");
    let spent_at: String = row.get("spent_at");
    let created_at: String = row.get("created_at");

    Ok(ExpenditureRecord {
        expenditure_id: row.get("expenditure_id"),
        request_id: row.get("request_id"),
        activity: row.get("activity"),
        description: row.get("description"),
        amount: parse_amount(&amount)?,
        category: ExpenditureCategory::from_str(&category)
            .ok_or_else(|| StoreError::Malformed(format!("category '{}'", category)))?,
        vendor: row.get("vendor"),
        bill_number: row.get("bill_number"),
        recorded_by: row.get("recorded_by"),
        spent_at: parse_datetime(&spent_at)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_certificate(row: sqlx::sqlite::SqliteRow) -> Result<UtilizationCertificate, StoreError> {
    let scheme_id: i64 = row.get("scheme_id");
    let approved_amount: String = row.get("approved_amount");
    let total_expenditure: String = row.get("total_expenditure");
    let remaining_balance: String = row.get("remaining_balance");
    let period_start: String = row.get("period_start");
    let period_end: String = row.get("period_end");
    let issued_at: String = row.get("issued_at");

    Ok(UtilizationCertificate {
        certificate_no: row.get("certificate_no"),
        request_id: row.get("request_id"),
        scheme_id: scheme_id as u64,
        scheme_name: row.get("scheme_name"),
        agency: row.get("agency"),
        approved_amount: parse_amount(&approved_amount)?,
        total_expenditure: parse_amount(&total_expenditure)?,
        remaining_balance: remaining_balance
            .parse()
            .map_err(|_| StoreError::Malformed(format!("balance '{}'", remaining_balance)))?,
        period_start: parse_datetime(&period_start)?,
        period_end: parse_datetime(&period_end)?,
        issued_by: row.get("issued_by"),
        issued_at: parse_datetime(&issued_at)?,
    })
}
