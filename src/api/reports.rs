//! Report registry endpoints
//!
//! Registration and listing of reports, scoped to a tenant taken from the
//! URL path. Filter and sort entries arrive as repeated `filters=` and
//! `sorts=` query parameters, so the query string is parsed by hand rather
//! than through an extractor that only keeps the last value.

use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::db::query::PageParams;
use crate::middleware::AuthUser;
use crate::models::{CreateReportRequest, PaginatedReports, RegisterReportResponse};
use crate::services::{ReportService, TenantInfo};
use crate::utils::error::{AppError, AppResult};
use crate::utils::timefmt::{escape_zone, DEFAULT_DEVICE_ZONE};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/{tenant_code}/reports",
        get(list_reports).post(register_report),
    )
}

/// Parsed report-list query string
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ListQuery {
    pub page: i64,
    pub page_size: i64,
    pub filters: Vec<String>,
    pub sorts: Vec<String>,
}

impl ListQuery {
    pub(crate) fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let mut query = ListQuery {
            page: 1,
            page_size: 100,
            ..Default::default()
        };

        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(query),
        };

        for pair in raw.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " "))
                .map_err(|_| AppError::BadRequest(format!("Malformed query value: {}", value)))?
                .into_owned();

            match key {
                "page" => {
                    query.page = value
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("Invalid page: {}", value)))?;
                }
                "page_size" => {
                    query.page_size = value.parse().map_err(|_| {
                        AppError::BadRequest(format!("Invalid page_size: {}", value))
                    })?;
                }
                "filters" => query.filters.push(value),
                "sorts" => query.sorts.push(value),
                // Unknown parameters are ignored, matching common API practice
                _ => {}
            }
        }

        if query.page < 1 {
            return Err(AppError::BadRequest("page must be >= 1".to_string()));
        }
        if query.page_size < 1 || query.page_size > 1000 {
            return Err(AppError::BadRequest(
                "page_size must be between 1 and 1000".to_string(),
            ));
        }

        Ok(query)
    }
}

/// Resolve a tenant code to its record. Uses the platform tenant API when
/// configured, otherwise the locally replicated tenants table.
pub(crate) async fn resolve_tenant(
    state: &AppState,
    tenant_code: &str,
    token: &str,
) -> AppResult<TenantInfo> {
    if let Some(api) = &state.tenant_api {
        return Ok(api.get_tenant_info(tenant_code, token).await?);
    }

    let row: Option<(i64, String, String)> =
        sqlx::query_as("SELECT id, code, name FROM tenants WHERE code = ?")
            .bind(tenant_code)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

    row.map(|(id, code, name)| TenantInfo {
        id,
        code,
        name,
        timezone: None,
    })
    .ok_or_else(|| AppError::NotFound(format!("Tenant not found: {}", tenant_code)))
}

/// List the tenant's registered reports
async fn list_reports(
    State(state): State<AppState>,
    Path(tenant_code): Path<String>,
    RawQuery(raw): RawQuery,
    user: AuthUser,
) -> AppResult<Json<PaginatedReports>> {
    let query = ListQuery::parse(raw.as_deref())?;
    let tenant = resolve_tenant(&state, &tenant_code, &user.token).await?;

    let service = ReportService::new(state.db.clone());
    let page = PageParams {
        page: query.page,
        page_size: query.page_size,
    };
    let result = service
        .list(tenant.id, page, &query.filters, &query.sorts)
        .await?;

    Ok(Json(result))
}

/// Register a report for later rendering
async fn register_report(
    State(state): State<AppState>,
    Path(tenant_code): Path<String>,
    user: AuthUser,
    Json(req): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<RegisterReportResponse>)> {
    let tenant = resolve_tenant(&state, &tenant_code, &user.token).await?;

    let service = ReportService::new(state.db.clone());
    let report_type = req.report_type;
    let (start_date, end_date) = (req.start_date, req.end_date);
    let response = service.register(tenant.id, &user.email, req).await?;

    info!(
        tenant = %tenant.code,
        report_id = response.new_report_id,
        "Report registered"
    );

    if let Some(publisher) = &state.publisher {
        // Both events carry the user's timezone. A failed profile lookup
        // only loses the timezone, never the registration.
        let timezone = match &state.tenant_api {
            Some(api) => match api.get_user_profile(&user.email, &user.token).await {
                Ok(profile) => profile.timezone,
                Err(e) => {
                    warn!(user = %user.email, "Profile lookup failed: {}", e);
                    None
                }
            },
            None => None,
        };
        let zone = timezone.unwrap_or_else(|| DEFAULT_DEVICE_ZONE.to_string());

        publisher
            .publish(
                "report.report.created",
                &tenant.code,
                &created_event(
                    response.new_report_id,
                    report_type,
                    &user.email,
                    start_date,
                    end_date,
                    tenant.id,
                    &zone,
                ),
            )
            .await;

        publisher
            .publish(
                "report.user.activity.history",
                &tenant.code,
                &json!({
                    "email": user.email,
                    "action": "report_registered",
                    "report_id": response.new_report_id,
                    "timezone": escape_zone(&zone),
                }),
            )
            .await;
    }

    Ok((StatusCode::CREATED, Json(response)))
}

/// Payload of the `report.report.created` event. The registration fields
/// ride along so the render worker does not have to read them back.
pub(crate) fn created_event(
    report_id: i64,
    report_type: i64,
    created_by: &str,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    tenant_id: i64,
    zone: &str,
) -> serde_json::Value {
    json!({
        "report_id": report_id,
        "type": report_type,
        "created_by": created_by,
        "start_date": start_date,
        "end_date": end_date,
        "tenant_id": tenant_id,
        "user_timezone": escape_zone(zone),
    })
}
