//! General API integration tests
//!
//! Health endpoints and authentication behavior shared by all routes.

use axum::http::StatusCode;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_detailed_health_endpoint() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/health/detailed").await;

    response.assert_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["components"]["database"]["status"], "healthy");
    // No external clients are configured in the test app
    assert_eq!(json["components"]["tenant_api"]["status"], "not_configured");
    assert_eq!(
        json["components"]["object_storage"]["status"],
        "not_configured"
    );
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/live").await.assert_ok();
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new().await;
    app.get("/api/v1/health/ready").await.assert_ok();
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;
    let response = app.get("/api/v1/acme/reports").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_rejects_garbage_token() {
    let app = TestApp::new().await;
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/acme/reports")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.request_with_auth(request, "not-a-jwt").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
