//! Report rendering integration tests
//!
//! These drive the render endpoints end to end: seeded analytics data in,
//! a PDF file on disk out, with the report row moving through its lifecycle.

use axum::http::StatusCode;

use crate::common::TestApp;

const TENANT_ID: i64 = 7;
const TENANT_CODE: &str = "acme";

const START: &str = "2024-06-01T00:00:00Z";
const END: &str = "2024-06-08T00:00:00Z";

/// App with a tenant and analytics rows covering the test period
async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    app.seed_tenant(TENANT_ID, TENANT_CODE, "Acme Corp", 5000).await;

    app.seed_rule(1, "Brute force login", 1, 4, 0).await;
    app.seed_rule(2, "Impossible travel", 3, 5, 1).await;
    app.seed_alert(1, TENANT_ID, 12, 0, "2024-06-02 10:00:00").await;
    app.seed_alert(1, TENANT_ID, 3, 0, "2024-06-03 08:30:00").await;
    app.seed_alert(2, TENANT_ID, 7, 0, "2024-06-03 21:15:00").await;
    // Trial alerts never appear in reports
    app.seed_alert(2, TENANT_ID, 99, 1, "2024-06-04 12:00:00").await;

    app.seed_eps(TENANT_CODE, "2024-06-02 00:00:00", 86400, 1.0, 4.5).await;
    app.seed_eps(TENANT_CODE, "2024-06-03 00:00:00", 172800, 2.0, 9.1).await;

    app
}

async fn register(app: &TestApp, report_type: i64) -> i64 {
    let response = app
        .post_json_auth(
            &format!("/api/v1/{}/reports", TENANT_CODE),
            serde_json::json!({
                "name": "June report",
                "type": report_type,
                "start_date": START,
                "end_date": END,
            }),
        )
        .await;
    response.assert_created();
    let json: serde_json::Value = response.json();
    json["new_report_id"].as_i64().expect("report id")
}

fn render_uri(template: &str, report_id: i64, zone: &str) -> String {
    format!(
        "/api/v1/render/{}/{}/{}/{}/{}/{}",
        template, TENANT_ID, report_id, START, END, zone
    )
}

#[tokio::test]
async fn test_render_incident_report_writes_pdf() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    let response = app
        .get_auth(&render_uri("incident_alerts_report", report_id, "UTC"))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json["file_name"],
        format!("report_incident_alerts_report_{}.pdf", report_id)
    );

    let bytes = std::fs::read(json["path"].as_str().unwrap()).expect("rendered file on disk");
    assert!(bytes.starts_with(b"%PDF"));
    // No object storage configured, so no object URL
    assert!(json.get("object_url").is_none());
}

#[tokio::test]
async fn test_render_marks_report_done() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    app.get_auth(&render_uri("incident_alerts_report", report_id, "UTC"))
        .await
        .assert_ok();

    let list: serde_json::Value = app
        .get_auth(&format!("/api/v1/{}/reports", TENANT_CODE))
        .await
        .json();
    assert_eq!(list["records"][0]["id"].as_i64().unwrap(), report_id);
    // 3 = done
    assert_eq!(list["records"][0]["status"], 3);
}

#[tokio::test]
async fn test_render_eps_report() {
    let app = seeded_app().await;
    let report_id = register(&app, 2).await;

    let response = app.get_auth(&render_uri("eps_report", report_id, "UTC")).await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json["file_name"],
        format!("report_eps_report_{}.pdf", report_id)
    );
}

#[tokio::test]
async fn test_render_top_rules_report() {
    let app = seeded_app().await;
    let report_id = register(&app, 3).await;

    let response = app
        .get_auth(&render_uri("top_10_rules_report", report_id, "UTC"))
        .await;

    response.assert_ok();
}

#[tokio::test]
async fn test_render_accepts_escaped_timezone() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    app.get_auth(&render_uri(
        "incident_alerts_report",
        report_id,
        "America@Sao_Paulo",
    ))
    .await
    .assert_ok();
}

#[tokio::test]
async fn test_render_unknown_timezone_is_rejected() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    let response = app
        .get_auth(&render_uri(
            "incident_alerts_report",
            report_id,
            "Atlantis@Capital",
        ))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    // The failed render leaves the report retryable (1 = on hold)
    let list: serde_json::Value = app
        .get_auth(&format!("/api/v1/{}/reports", TENANT_CODE))
        .await
        .json();
    assert_eq!(list["records"][0]["status"], 1);
}

#[tokio::test]
async fn test_render_template_must_match_report_type() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    let response = app.get_auth(&render_uri("eps_report", report_id, "UTC")).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_render_unknown_report_is_not_found() {
    let app = seeded_app().await;

    let response = app
        .get_auth(&render_uri("incident_alerts_report", 999, "UTC"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_render_rejects_inverted_period() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    let uri = format!(
        "/api/v1/render/incident_alerts_report/{}/{}/{}/{}/UTC",
        TENANT_ID, report_id, END, START
    );
    let response = app.get_auth(&uri).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_render_requires_authentication() {
    let app = seeded_app().await;
    let report_id = register(&app, 1).await;

    let response = app
        .get(&render_uri("incident_alerts_report", report_id, "UTC"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
