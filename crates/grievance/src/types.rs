//! Grievance data structures

use chrono::{DateTime, Utc};
use fundtrack_core::ids;
use serde::{Deserialize, Serialize};

/// Grievance category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrievanceCategory {
    FundMisuse,
    Irregularity,
    Delay,
    Corruption,
    Other,
}

impl GrievanceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrievanceCategory::FundMisuse => "fund-misuse",
            GrievanceCategory::Irregularity => "irregularity",
            GrievanceCategory::Delay => "delay",
            GrievanceCategory::Corruption => "corruption",
            GrievanceCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fund-misuse" => Some(GrievanceCategory::FundMisuse),
            "irregularity" => Some(GrievanceCategory::Irregularity),
            "delay" => Some(GrievanceCategory::Delay),
            "corruption" => Some(GrievanceCategory::Corruption),
            "other" => Some(GrievanceCategory::Other),
            _ => None,
        }
    }
}

/// Review status of a grievance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrievanceStatus {
    Pending,
    UnderReview,
    Resolved,
    Rejected,
}

impl GrievanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrievanceStatus::Pending => "pending",
            GrievanceStatus::UnderReview => "under-review",
            GrievanceStatus::Resolved => "resolved",
            GrievanceStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GrievanceStatus::Pending),
            "under-review" => Some(GrievanceStatus::UnderReview),
            "resolved" => Some(GrievanceStatus::Resolved),
            "rejected" => Some(GrievanceStatus::Rejected),
            _ => None,
        }
    }
}

/// A citizen-submitted grievance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grievance {
    pub grievance_id: String,
    pub scheme_id: Option<u64>,
    pub scheme_name: String,
    pub category: GrievanceCategory,
    pub title: String,
    pub description: String,
    pub location: String,
    pub beneficiary_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub status: GrievanceStatus,
    pub submitted_by: String,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Grievance {
    pub fn new(input: NewGrievance, submitted_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            grievance_id: ids::grievance_id(),
            scheme_id: input.scheme_id,
            scheme_name: input.scheme_name,
            category: input.category,
            title: input.title,
            description: input.description,
            location: input.location,
            beneficiary_name: input.beneficiary_name,
            contact_email: input.contact_email,
            contact_phone: input.contact_phone,
            status: GrievanceStatus::Pending,
            submitted_by: submitted_by.into(),
            reviewed_by: None,
            review_notes: None,
            reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Submission input
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrievance {
    pub scheme_id: Option<u64>,
    #[serde(default)]
    pub scheme_name: String,
    pub category: GrievanceCategory,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub beneficiary_name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
}

/// Listing filter. Search matches title, description, grievance id, and
/// scheme name, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct GrievanceFilter {
    pub status: Option<GrievanceStatus>,
    pub category: Option<GrievanceCategory>,
    pub submitted_by: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for category in [
            GrievanceCategory::FundMisuse,
            GrievanceCategory::Irregularity,
            GrievanceCategory::Delay,
            GrievanceCategory::Corruption,
            GrievanceCategory::Other,
        ] {
            assert_eq!(GrievanceCategory::from_str(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(
            GrievanceStatus::from_str("under-review"),
            Some(GrievanceStatus::UnderReview)
        );
        assert_eq!(GrievanceStatus::from_str("nope"), None);
    }
}
