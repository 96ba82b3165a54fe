//! Report registry integration tests
//!
//! Registration and listing, including the filter/sort query grammar and
//! its rejection of malformed entries.

use axum::http::StatusCode;
use serde_json::json;

use crate::common::{TestApp, TEST_USER};

const TENANT_ID: i64 = 7;
const TENANT_CODE: &str = "acme";

async fn app_with_tenant() -> TestApp {
    let app = TestApp::new().await;
    app.seed_tenant(TENANT_ID, TENANT_CODE, "Acme Corp", 5000).await;
    app
}

fn report_body(name: &str, report_type: i64) -> serde_json::Value {
    json!({
        "name": name,
        "type": report_type,
        "start_date": "2024-06-01T00:00:00Z",
        "end_date": "2024-06-08T00:00:00Z",
    })
}

async fn register(app: &TestApp, name: &str, report_type: i64) -> i64 {
    let response = app
        .post_json_auth(
            &format!("/api/v1/{}/reports", TENANT_CODE),
            report_body(name, report_type),
        )
        .await;
    response.assert_created();
    let json: serde_json::Value = response.json();
    json["new_report_id"].as_i64().expect("report id")
}

#[tokio::test]
async fn test_register_report_returns_detail_code() {
    let app = app_with_tenant().await;
    let response = app
        .post_json_auth(
            &format!("/api/v1/{}/reports", TENANT_CODE),
            report_body("Weekly incidents", 1),
        )
        .await;

    response.assert_created();
    let json: serde_json::Value = response.json();
    assert_eq!(json["detail"], "api072");
    assert!(json["new_report_id"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn test_register_unknown_tenant_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .post_json_auth("/api/v1/ghost/reports", report_body("Weekly", 1))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_rejects_inverted_period() {
    let app = app_with_tenant().await;
    let body = json!({
        "name": "Backwards",
        "type": 1,
        "start_date": "2024-06-08T00:00:00Z",
        "end_date": "2024-06-01T00:00:00Z",
    });
    let response = app
        .post_json_auth(&format!("/api/v1/{}/reports", TENANT_CODE), body)
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_rejects_unknown_type() {
    let app = app_with_tenant().await;
    let response = app
        .post_json_auth(
            &format!("/api/v1/{}/reports", TENANT_CODE),
            report_body("Mystery", 9),
        )
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_list_empty_registry() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!("/api/v1/{}/reports", TENANT_CODE))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 0);
    assert_eq!(json["current_page"], 1);
    assert_eq!(json["page_size"], 100);
    assert_eq!(json["number_pages"], 0);
    assert!(json["records"].as_array().unwrap().is_empty());
    // Always present, empty when nothing has been registered yet
    let creators = json["available_filters"]["created_by"].as_array().unwrap();
    assert!(creators.is_empty());
}

#[tokio::test]
async fn test_list_is_paginated_newest_first() {
    let app = app_with_tenant().await;
    let mut ids = Vec::new();
    for i in 1..=5 {
        ids.push(register(&app, &format!("Report {}", i), 1).await);
    }

    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?page=2&page_size=2",
            TENANT_CODE
        ))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 5);
    assert_eq!(json["current_page"], 2);
    assert_eq!(json["number_pages"], 3);

    // Default order is id descending, so page 2 holds the 3rd and 2nd ids
    let records = json["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"].as_i64().unwrap(), ids[2]);
    assert_eq!(records[1]["id"].as_i64().unwrap(), ids[1]);
}

#[tokio::test]
async fn test_list_filters_by_name_substring() {
    let app = app_with_tenant().await;
    register(&app, "Weekly incidents", 1).await;
    register(&app, "Monthly summary", 2).await;

    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=name%3Aweekly",
            TENANT_CODE
        ))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["name"], "Weekly incidents");
}

#[tokio::test]
async fn test_list_filters_by_type_list() {
    let app = app_with_tenant().await;
    register(&app, "Incidents", 1).await;
    register(&app, "Events", 2).await;
    register(&app, "Rules", 3).await;

    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=type%3A1%2C3",
            TENANT_CODE
        ))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 2);
}

#[tokio::test]
async fn test_list_filters_through_report_type_relation() {
    let app = app_with_tenant().await;
    register(&app, "Incidents", 1).await;
    register(&app, "Events", 2).await;

    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=report_type.code_name%3Aeps_report",
            TENANT_CODE
        ))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 1);
    assert_eq!(json["records"][0]["type"], 2);
}

#[tokio::test]
async fn test_list_sorts_ascending() {
    let app = app_with_tenant().await;
    let first = register(&app, "First", 1).await;
    register(&app, "Second", 1).await;

    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?sorts=id%3AASC",
            TENANT_CODE
        ))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["records"][0]["id"].as_i64().unwrap(), first);
}

#[tokio::test]
async fn test_malformed_filter_is_rejected() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=no-separator",
            TENANT_CODE
        ))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let json: serde_json::Value = response.json();
    assert_eq!(json["error"], "validation_error");
    assert!(json["message"].as_str().unwrap().contains("no-separator"));
}

#[tokio::test]
async fn test_unknown_filter_field_is_rejected() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=favourite_colour%3Ablue",
            TENANT_CODE
        ))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_filter_value_is_rejected() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?filters=status%3Aalmost_done",
            TENANT_CODE
        ))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_sort_direction_is_rejected() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!(
            "/api/v1/{}/reports?sorts=id%3Asideways",
            TENANT_CODE
        ))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_page_is_bad_request() {
    let app = app_with_tenant().await;
    let response = app
        .get_auth(&format!("/api/v1/{}/reports?page=0", TENANT_CODE))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_available_filters_lists_creators() {
    let app = app_with_tenant().await;
    register(&app, "Weekly incidents", 1).await;

    let response = app
        .get_auth(&format!("/api/v1/{}/reports", TENANT_CODE))
        .await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    let creators = json["available_filters"]["created_by"].as_array().unwrap();
    assert_eq!(creators, &[serde_json::Value::from(TEST_USER)]);
}

#[tokio::test]
async fn test_list_is_tenant_scoped() {
    let app = app_with_tenant().await;
    app.seed_tenant(8, "globex", "Globex", 1000).await;
    register(&app, "Acme report", 1).await;

    let response = app.get_auth("/api/v1/globex/reports").await;

    response.assert_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json["count"], 0);
}
