//! Workflow data structures

use chrono::{DateTime, Utc};
use fundtrack_core::{ids, Amount, SettlementId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a utilization request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtilizationStatus {
    /// Submitted, awaiting an administrator decision
    Pending,
    /// Approved; funds settled against the scheme
    Approved,
    /// Explicitly rejected (terminal)
    Rejected,
    /// At least one expenditure recorded
    InProgress,
    /// Work finished (terminal, enables certificate issuance)
    Completed,
}

impl UtilizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilizationStatus::Pending => "pending",
            UtilizationStatus::Approved => "approved",
            UtilizationStatus::Rejected => "rejected",
            UtilizationStatus::InProgress => "in-progress",
            UtilizationStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UtilizationStatus::Pending),
            "approved" => Some(UtilizationStatus::Approved),
            "rejected" => Some(UtilizationStatus::Rejected),
            "in-progress" => Some(UtilizationStatus::InProgress),
            "completed" => Some(UtilizationStatus::Completed),
            _ => None,
        }
    }
}

/// What an expenditure was spent on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenditureCategory {
    Labor,
    Materials,
    Equipment,
    Transport,
    Other,
}

impl ExpenditureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenditureCategory::Labor => "labor",
            ExpenditureCategory::Materials => "materials",
            ExpenditureCategory::Equipment => "equipment",
            ExpenditureCategory::Transport => "transport",
            ExpenditureCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "labor" => Some(ExpenditureCategory::Labor),
            "materials" => Some(ExpenditureCategory::Materials),
            "equipment" => Some(ExpenditureCategory::Equipment),
            "transport" => Some(ExpenditureCategory::Transport),
            "other" => Some(ExpenditureCategory::Other),
            _ => None,
        }
    }
}

/// A fund utilization request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationRequest {
    pub request_id: String,
    pub scheme_id: u64,
    /// Organization the request belongs to; scopes all reads and mutations
    pub agency: String,
    pub amount: Amount,
    pub purpose: String,
    pub description: String,
    pub status: UtilizationStatus,
    /// Identity of the submitter
    pub executor: String,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub total_expenditure: Amount,
    /// Settlement created on approval
    pub settlement_id: Option<SettlementId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UtilizationRequest {
    /// Build a fresh pending request
    pub fn new(
        scheme_id: u64,
        agency: impl Into<String>,
        executor: impl Into<String>,
        amount: Amount,
        purpose: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: ids::request_id(),
            scheme_id,
            agency: agency.into(),
            amount,
            purpose: purpose.into(),
            description: description.into(),
            status: UtilizationStatus::Pending,
            executor: executor.into(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            total_expenditure: Amount::ZERO,
            settlement_id: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An expenditure recorded against an approved request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenditureRecord {
    pub expenditure_id: String,
    pub request_id: String,
    pub activity: String,
    pub description: String,
    pub amount: Amount,
    pub category: ExpenditureCategory,
    pub vendor: String,
    pub bill_number: String,
    pub recorded_by: String,
    pub spent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Certificate issued when a completed request is closed out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationCertificate {
    pub certificate_no: String,
    pub request_id: String,
    pub scheme_id: u64,
    pub scheme_name: String,
    pub agency: String,
    pub approved_amount: Amount,
    pub total_expenditure: Amount,
    pub remaining_balance: Decimal,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
}

/// Input for submitting a request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub scheme_id: u64,
    pub amount: Amount,
    pub purpose: String,
    #[serde(default)]
    pub description: String,
}

/// Input for recording an expenditure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpenditure {
    pub activity: String,
    #[serde(default)]
    pub description: String,
    pub amount: Amount,
    pub category: Option<ExpenditureCategory>,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub bill_number: String,
    pub spent_at: Option<DateTime<Utc>>,
}

/// Listing filter for an agency's requests
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub scheme_id: Option<u64>,
    pub status: Option<UtilizationStatus>,
}

/// A request annotated with the scheme's live balance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWithBalance {
    #[serde(flatten)]
    pub request: UtilizationRequest,
    pub available_balance: Decimal,
    pub remaining_after_request: Decimal,
}

/// Full detail view of a single request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetail {
    pub request: UtilizationRequest,
    pub expenditures: Vec<ExpenditureRecord>,
    pub certificate: Option<UtilizationCertificate>,
    pub available_balance: Decimal,
    pub remaining_after_request: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            UtilizationStatus::Pending,
            UtilizationStatus::Approved,
            UtilizationStatus::Rejected,
            UtilizationStatus::InProgress,
            UtilizationStatus::Completed,
        ] {
            assert_eq!(UtilizationStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(UtilizationStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_new_request_defaults() {
        let request = UtilizationRequest::new(
            1,
            "District Health Office",
            "clerk@district.gov",
            Amount::new(Decimal::new(500, 0)).unwrap(),
            "clinic supplies",
            "",
        );
        assert!(request.request_id.starts_with("UR-"));
        assert_eq!(request.status, UtilizationStatus::Pending);
        assert!(request.total_expenditure.is_zero());
        assert!(request.settlement_id.is_none());
    }
}
