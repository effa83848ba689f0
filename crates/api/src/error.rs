//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fundtrack_grievance::GrievanceError;
use fundtrack_mirror::MirrorError;
use fundtrack_workflow::WorkflowError;
use serde_json::json;

/// One error type at the HTTP edge; each domain error maps onto a status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Grievance(#[from] GrievanceError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

fn mirror_status(err: &MirrorError) -> StatusCode {
    match err {
        MirrorError::Validation(_) => StatusCode::BAD_REQUEST,
        MirrorError::SchemeNotFound(_) => StatusCode::NOT_FOUND,
        MirrorError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
        MirrorError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MirrorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
        WorkflowError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        WorkflowError::Mirror(inner) => mirror_status(inner),
    }
}

fn grievance_status(err: &GrievanceError) -> StatusCode {
    match err {
        GrievanceError::NotFound(_) => StatusCode::NOT_FOUND,
        GrievanceError::Validation(_) => StatusCode::BAD_REQUEST,
        GrievanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Mirror(err) => mirror_status(err),
            ApiError::Workflow(err) => workflow_status(err),
            ApiError::Grievance(err) => grievance_status(err),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
