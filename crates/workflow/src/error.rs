//! Workflow errors

use thiserror::Error;

/// Errors from the utilization workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Utilization request not found: {0}")]
    NotFound(String),

    /// The caller's agency does not own the request.
    #[error("Request {0} belongs to another agency")]
    Forbidden(String),

    #[error("Cannot {action} a request that is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] fundtrack_store::StoreError),

    #[error(transparent)]
    Mirror(#[from] fundtrack_mirror::MirrorError),
}
