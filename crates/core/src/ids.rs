//! Generated string identifiers
//!
//! Requests, grievances, and certificates are keyed by short generated ids
//! unique within their collection.

use uuid::Uuid;

fn short_uuid() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_uppercase()
}

/// Utilization request id, e.g. `UR-1A2B3C4D`
pub fn request_id() -> String {
    format!("UR-{}", short_uuid())
}

/// Grievance id, e.g. `GR-1A2B3C4D`
pub fn grievance_id() -> String {
    format!("GR-{}", short_uuid())
}

/// Utilization certificate number, e.g. `UC-1A2B3C4D`
pub fn certificate_no() -> String {
    format!("UC-{}", short_uuid())
}

/// Expenditure record id, e.g. `EX-1A2B3C4D`
pub fn expenditure_id() -> String {
    format!("EX-{}", short_uuid())
}
