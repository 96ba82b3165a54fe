//! Report rendering endpoints
//!
//! One endpoint per template. Start and end arrive as RFC 3339 timestamps in
//! UTC; the trailing path segment is the user's IANA timezone with `/`
//! escaped as `@` so it fits in a single segment.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::models::ReportTemplate;
use crate::services::{RenderService, RenderedReport};
use crate::utils::error::{AppError, AppResult};
use crate::utils::timefmt::parse_datetime_param;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/render/incident_alerts_report/{tenant_id}/{report_id}/{start}/{end}/{zone}",
            get(render_incident_alerts),
        )
        .route(
            "/render/eps_report/{tenant_id}/{report_id}/{start}/{end}/{zone}",
            get(render_eps),
        )
        .route(
            "/render/top_10_rules_report/{tenant_id}/{report_id}/{start}/{end}/{zone}",
            get(render_top_rules),
        )
}

type RenderPath = Path<(i64, i64, String, String, String)>;

async fn render_incident_alerts(
    State(state): State<AppState>,
    path: RenderPath,
) -> AppResult<Json<RenderedReport>> {
    render_template(state, ReportTemplate::IncidentAlerts, path).await
}

async fn render_eps(
    State(state): State<AppState>,
    path: RenderPath,
) -> AppResult<Json<RenderedReport>> {
    render_template(state, ReportTemplate::Eps, path).await
}

async fn render_top_rules(
    State(state): State<AppState>,
    path: RenderPath,
) -> AppResult<Json<RenderedReport>> {
    render_template(state, ReportTemplate::Top10Rules, path).await
}

async fn render_template(
    state: AppState,
    template: ReportTemplate,
    Path((tenant_id, report_id, start, end, zone)): RenderPath,
) -> AppResult<Json<RenderedReport>> {
    let start = parse_datetime_param(&start).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let end = parse_datetime_param(&end).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if end <= start {
        return Err(AppError::BadRequest(
            "end must be after start".to_string(),
        ));
    }

    let service = RenderService::new(
        state.db.clone(),
        state.config.reports.output_dir.clone(),
        state.storage.clone(),
        state.search.clone(),
    );
    let rendered = service
        .render(template, tenant_id, report_id, start, end, &zone)
        .await?;

    if let Some(publisher) = &state.publisher {
        publisher
            .publish(
                "report.report.ready",
                &tenant_id.to_string(),
                &json!({
                    "report_id": report_id,
                    "type": template.code_name(),
                    "file_name": rendered.file_name,
                    "object_url": rendered.object_url,
                }),
            )
            .await;
    }

    Ok(Json(rendered))
}
