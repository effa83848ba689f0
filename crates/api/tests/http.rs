//! HTTP surface tests
//!
//! Drives the router directly with tower's `oneshot`, one request at a time,
//! the way the service sees real traffic.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use fundtrack_api::{router, AppContext, ChainMode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

async fn test_app(mode: ChainMode) -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let chain = AppContext::chain_for_mode(mode, Duration::from_secs(5));
    let ctx = Arc::new(AppContext::new(temp_dir.path(), chain).await.unwrap());
    (router(ctx), temp_dir)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_scheme_registration_and_usage() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes",
            json!({ "name": "Health", "totalFunds": 1000, "eligibilityCriteria": "rural households" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["schemeId"], 1);
    assert_eq!(body["appliedToLedger"], true);
    assert!(body["ledgerTxHash"].as_str().unwrap().starts_with("0x"));
    assert!(body["warning"].is_null());

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes/1/usage",
            json!({ "amount": 400, "executor": "treasury@example.gov", "purpose": "vaccines" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appliedToLedger"], true);
    assert_eq!(body["appliedToFallback"], true);
    assert!(body["settlementId"].as_str().unwrap().starts_with("0x"));

    let response = app.clone().oneshot(get("/schemes/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["usedFunds"], "400");
    assert_eq!(body["remainingFunds"], "600");
}

#[tokio::test]
async fn test_insufficient_funds_is_bad_request() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    app.clone()
        .oneshot(post_json("/schemes", json!({ "name": "Health", "totalFunds": 1000 })))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json(
            "/schemes/1/usage",
            json!({ "amount": 400, "executor": "treasury@example.gov" }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes/1/usage",
            json!({ "amount": 700, "executor": "treasury@example.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("600"));
    assert!(message.contains("700"));
}

#[tokio::test]
async fn test_unknown_scheme_is_not_found() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes/99/usage",
            json!({ "amount": 10, "executor": "treasury@example.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_negative_amount_is_rejected() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    app.clone()
        .oneshot(post_json("/schemes", json!({ "name": "Health", "totalFunds": 1000 })))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes/1/usage",
            json!({ "amount": -5, "executor": "treasury@example.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chain_off_degrades_with_warning() {
    let (app, _dir) = test_app(ChainMode::Off).await;

    let response = app
        .clone()
        .oneshot(post_json("/schemes", json!({ "name": "Health", "totalFunds": 1000 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["schemeId"], 1);
    assert_eq!(body["appliedToLedger"], false);
    assert!(body["ledgerTxHash"].is_null());
    assert!(body["warning"].as_str().is_some());

    let response = app
        .clone()
        .oneshot(post_json(
            "/schemes/1/usage",
            json!({ "amount": 250, "executor": "treasury@example.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appliedToLedger"], false);
    assert_eq!(body["appliedToFallback"], true);
    assert!(body["settlementId"].as_str().unwrap().starts_with("fb_"));

    // Divergence is visible and reconciliation reports it as deferred
    let response = app.clone().oneshot(get("/divergence")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["fallbackOnly"], json!([1]));
}

#[tokio::test]
async fn test_request_lifecycle_over_http() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    app.clone()
        .oneshot(post_json("/schemes", json!({ "name": "Health", "totalFunds": 1000 })))
        .await
        .unwrap();

    // Identity headers are mandatory for agency routes
    let response = app
        .clone()
        .oneshot(post_json(
            "/requests",
            json!({ "schemeId": 1, "amount": 400, "purpose": "clinic supplies" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/requests")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-agency", "District Health")
        .header("x-user", "clerk@district.gov")
        .body(Body::from(
            serde_json::to_vec(&json!({
                "schemeId": 1, "amount": 400, "purpose": "clinic supplies"
            }))
            .unwrap(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let request_id = body["requestId"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "pending");

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/requests/{}/approve", request_id),
            json!({ "approvedBy": "admin@state.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appliedToLedger"], true);
    assert_eq!(body["request"]["status"], "approved");

    // Another agency cannot read the request
    let request = Request::builder()
        .uri(format!("/requests/{}", request_id))
        .header("x-agency", "Roads Department")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_grievance_over_http() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/grievances",
            json!({
                "category": "delay",
                "title": "Delayed disbursement",
                "description": "Funds sanctioned in March have not reached the clinic",
                "submittedBy": "citizen@example.org"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let grievance_id = body["grievanceId"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "pending");

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/grievances/{}/review", grievance_id),
            json!({ "status": "under-review", "reviewedBy": "admin@state.gov" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "under-review");

    let response = app
        .clone()
        .oneshot(get("/grievances?status=under-review"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, _dir) = test_app(ChainMode::Mock).await;

    app.clone()
        .oneshot(post_json("/schemes", json!({ "name": "Health", "totalFunds": 1000 })))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/schemes", json!({ "name": "Roads", "totalFunds": 5000 })))
        .await
        .unwrap();

    let response = app.clone().oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totalSchemes"], 2);
    assert_eq!(body["totalAllocated"], "6000");
}
