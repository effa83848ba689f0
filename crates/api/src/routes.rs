//! HTTP routes and handlers

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use fundtrack_core::Amount;
use fundtrack_grievance::{GrievanceFilter, GrievanceStatus, NewGrievance};
use fundtrack_store::SettlementFilter;
use fundtrack_workflow::{NewExpenditure, NewRequest, RequestFilter, UtilizationStatus};

use crate::context::AppContext;
use crate::error::ApiError;

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/schemes", post(create_scheme).get(list_schemes))
        .route("/schemes/:id", get(get_scheme))
        .route("/schemes/:id/usage", post(use_fund))
        .route("/stats", get(stats))
        .route("/settlements", get(list_settlements))
        .route("/divergence", get(divergence))
        .route("/reconcile", post(reconcile))
        .route("/requests", post(submit_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/approve", post(approve_request))
        .route("/requests/:id/reject", post(reject_request))
        .route("/requests/:id/expenditures", post(record_expenditure))
        .route("/requests/:id/complete", post(complete_request))
        .route(
            "/requests/:id/certificate",
            post(issue_certificate).get(get_certificate),
        )
        .route("/grievances", post(submit_grievance).get(list_grievances))
        .route("/grievances/:id", get(get_grievance))
        .route("/grievances/:id/review", post(review_grievance))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Caller identity, injected by the auth layer in front of this service.
fn require_header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    header_value(headers, name)
        .ok_or_else(|| ApiError::BadRequest(format!("{} header is required", name)))
}

fn checked_amount(value: Decimal) -> Result<Amount, ApiError> {
    Amount::new(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// === Schemes ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSchemeBody {
    name: String,
    total_funds: Decimal,
    #[serde(default)]
    eligibility_criteria: String,
}

async fn create_scheme(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateSchemeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let total = checked_amount(body.total_funds)?;
    let outcome = ctx
        .mirror
        .register_scheme(&body.name, total, &body.eligibility_criteria)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UseFundBody {
    amount: Decimal,
    executor: String,
    #[serde(default)]
    purpose: String,
}

async fn use_fund(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<u64>,
    Json(body): Json<UseFundBody>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = checked_amount(body.amount)?;
    let outcome = ctx
        .mirror
        .apply_fund_usage(id, amount, &body.executor, &body.purpose)
        .await?;
    Ok(Json(outcome))
}

async fn list_schemes(
    State(ctx): State<Arc<AppContext>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.mirror.list_schemes().await?))
}

async fn get_scheme(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.mirror.scheme(id).await?))
}

async fn stats(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.mirror.stats().await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettlementQuery {
    scheme_id: Option<u64>,
    search: Option<String>,
    limit: Option<usize>,
    from_date: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
}

async fn list_settlements(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<SettlementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = SettlementFilter {
        scheme_id: query.scheme_id,
        from: query.from_date,
        to: query.to_date,
        search: query.search,
        limit: query.limit,
    };
    Ok(Json(ctx.mirror.settlement_history(&filter).await?))
}

async fn divergence(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.mirror.detect_divergence().await?))
}

async fn reconcile(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.mirror.reconcile().await?))
}

// === Utilization requests ===

async fn submit_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<NewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    let user = require_header(&headers, "x-user")?;
    let request = ctx.workflow.submit(&agency, &user, body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestQuery {
    scheme_id: Option<u64>,
    status: Option<String>,
}

async fn list_requests(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<RequestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    let status = query
        .status
        .as_deref()
        .map(|s| {
            UtilizationStatus::from_str(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", s)))
        })
        .transpose()?;

    let filter = RequestFilter {
        scheme_id: query.scheme_id,
        status,
    };
    Ok(Json(ctx.workflow.list(&agency, &filter).await?))
}

async fn get_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    Ok(Json(ctx.workflow.get(&agency, &id).await?))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    #[serde(default)]
    approved_by: Option<String>,
}

async fn approve_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<ApproveBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let approved_by = body
        .and_then(|Json(b)| b.approved_by)
        .or_else(|| header_value(&headers, "x-user"))
        .unwrap_or_default();
    let (request, outcome) = ctx.workflow.approve(&id, &approved_by).await?;
    Ok(Json(serde_json::json!({
        "request": request,
        "settlementId": outcome.settlement_id,
        "appliedToLedger": outcome.applied_to_ledger,
        "appliedToFallback": outcome.applied_to_fallback,
        "warning": outcome.warning,
    })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RejectBody {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    rejected_by: Option<String>,
}

async fn reject_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<RejectBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let rejected_by = body
        .rejected_by
        .or_else(|| header_value(&headers, "x-user"))
        .unwrap_or_default();
    let request = ctx
        .workflow
        .reject(&id, body.reason.as_deref(), &rejected_by)
        .await?;
    Ok(Json(request))
}

async fn record_expenditure(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<NewExpenditure>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    let user = require_header(&headers, "x-user")?;
    let record = ctx
        .workflow
        .record_expenditure(&agency, &id, &user, body)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn complete_request(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    Ok(Json(ctx.workflow.complete(&agency, &id).await?))
}

async fn issue_certificate(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let agency = require_header(&headers, "x-agency")?;
    let user = require_header(&headers, "x-user")?;
    let certificate = ctx.workflow.issue_certificate(&agency, &id, &user).await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

async fn get_certificate(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let certificate = ctx
        .workflow
        .store()
        .find_certificate(&id)
        .await
        .map_err(fundtrack_workflow::WorkflowError::Store)?
        .ok_or_else(|| {
            ApiError::Workflow(fundtrack_workflow::WorkflowError::NotFound(id.clone()))
        })?;
    Ok(Json(certificate))
}

// === Grievances ===

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitGrievanceBody {
    #[serde(flatten)]
    grievance: NewGrievance,
    submitted_by: String,
}

async fn submit_grievance(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<SubmitGrievanceBody>,
) -> Result<impl IntoResponse, ApiError> {
    let grievance = ctx
        .grievances
        .submit(&body.submitted_by, body.grievance)
        .await?;
    Ok((StatusCode::CREATED, Json(grievance)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrievanceQuery {
    status: Option<String>,
    category: Option<String>,
    submitted_by: Option<String>,
    search: Option<String>,
    limit: Option<usize>,
}

async fn list_grievances(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<GrievanceQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            GrievanceStatus::from_str(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", s)))
        })
        .transpose()?;
    let category = query
        .category
        .as_deref()
        .map(|c| {
            fundtrack_grievance::GrievanceCategory::from_str(c)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown category '{}'", c)))
        })
        .transpose()?;

    let filter = GrievanceFilter {
        status,
        category,
        submitted_by: query.submitted_by,
        search: query.search,
        limit: query.limit,
    };
    Ok(Json(ctx.grievances.list(&filter).await?))
}

async fn get_grievance(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ctx.grievances.get(&id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody {
    status: String,
    #[serde(default)]
    review_notes: Option<String>,
    #[serde(default)]
    reviewed_by: Option<String>,
}

async fn review_grievance(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> Result<impl IntoResponse, ApiError> {
    let status = GrievanceStatus::from_str(&body.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status '{}'", body.status)))?;
    let reviewed_by = body
        .reviewed_by
        .or_else(|| header_value(&headers, "x-user"))
        .unwrap_or_default();
    let grievance = ctx
        .grievances
        .review(&id, status, body.review_notes.as_deref(), &reviewed_by)
        .await?;
    Ok(Json(grievance))
}
