//! Grievance errors

use thiserror::Error;

/// Errors from grievance intake
#[derive(Debug, Error)]
pub enum GrievanceError {
    #[error("Grievance not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] fundtrack_store::StoreError),
}
