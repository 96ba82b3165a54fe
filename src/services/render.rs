//! Report rendering service
//!
//! Turns a registered report into a PDF document: loads the analytics data
//! for the template, lays out the document, writes it to the local output
//! directory and pushes a copy to object storage when configured. The report
//! row moves `on_hold -> processing -> done`; a failed render puts it back
//! on hold so it can be retried.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::{error, info};

use crate::db::analytics_repository::AnalyticsRepository;
use crate::db::report_repository::ReportRepository;
use crate::models::{EpsMetrics, IncidentData, ReportStatus, ReportTemplate, TopRules};
use crate::services::chart::{bucketize, Bucket, ChartPoint};
use crate::services::pdf::ReportPdf;
use crate::services::search::SearchClient;
use crate::services::storage::ObjectStorageClient;
use crate::utils::error::{AppError, AppResult};
use crate::utils::timefmt::{resolve_zone, to_local_naive};
use crate::DbPool;

/// Where the rendered document ended up
#[derive(Debug, serde::Serialize)]
pub struct RenderedReport {
    pub file_name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_url: Option<String>,
}

/// Data set backing one template, fully loaded before layout starts.
/// The PDF builder is not `Send`, so every query completes first and the
/// document is then laid out synchronously.
enum TemplateData {
    Incidents(IncidentData),
    Eps {
        metrics: EpsMetrics,
        events: Vec<(NaiveDateTime, f64)>,
    },
    TopRules(TopRules),
}

pub struct RenderService {
    pool: DbPool,
    output_dir: PathBuf,
    storage: Option<Arc<ObjectStorageClient>>,
    search: Option<Arc<SearchClient>>,
}

impl RenderService {
    pub fn new(
        pool: DbPool,
        output_dir: PathBuf,
        storage: Option<Arc<ObjectStorageClient>>,
        search: Option<Arc<SearchClient>>,
    ) -> Self {
        Self {
            pool,
            output_dir,
            storage,
            search,
        }
    }

    /// Render one report. `zone` is the user's IANA timezone, possibly in
    /// its escaped form (`America@Sao_Paulo`).
    pub async fn render(
        &self,
        template: ReportTemplate,
        tenant_id: i64,
        report_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
        zone: &str,
    ) -> AppResult<RenderedReport> {
        let repo = ReportRepository::new(&self.pool);
        let report = repo
            .get_by_id(report_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report not found: {}", report_id)))?;

        if ReportTemplate::from_type_id(report.report_type) != Some(template) {
            return Err(AppError::BadRequest(format!(
                "Report {} is not a {}",
                report_id,
                template.code_name()
            )));
        }

        repo.set_status(report_id, ReportStatus::Processing).await?;

        match self
            .render_inner(template, tenant_id, report_id, start, end, zone)
            .await
        {
            Ok(rendered) => {
                repo.set_status(report_id, ReportStatus::Done).await?;
                info!(report_id, file = %rendered.file_name, "Report rendered");
                Ok(rendered)
            }
            Err(e) => {
                error!(report_id, "Render failed: {}", e);
                // Back to the queue so the render can be retried. The render
                // error is what the caller sees even when the reset fails too.
                if let Err(status_err) = repo.set_status(report_id, ReportStatus::OnHold).await {
                    error!(report_id, "Could not reset report status: {}", status_err);
                }
                Err(e)
            }
        }
    }

    async fn render_inner(
        &self,
        template: ReportTemplate,
        tenant_id: i64,
        report_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
        zone: &str,
    ) -> AppResult<RenderedReport> {
        let tz = resolve_zone(zone).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let analytics = AnalyticsRepository::new(&self.pool);
        let tenant_name = self.tenant_name(tenant_id).await?;

        let data = match template {
            ReportTemplate::IncidentAlerts => {
                TemplateData::Incidents(analytics.incidents(tenant_id, start, end).await?)
            }
            ReportTemplate::Eps => {
                let metrics = analytics.eps_metrics(tenant_id, start, end).await?;
                let events = self
                    .event_series(tenant_id, start, end)
                    .await
                    .unwrap_or_default();
                TemplateData::Eps { metrics, events }
            }
            ReportTemplate::Top10Rules => {
                TemplateData::TopRules(analytics.top_rules(tenant_id, start, end).await?)
            }
        };

        let bytes = build_document(template, &tenant_name, &data, start, end, tz)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let file_name = template.file_name(report_id);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create output dir: {}", e)))?;
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot write report file: {}", e)))?;

        // An upload failure loses the blob copy, not the render; the local
        // file stays in place either way.
        let object_url = match &self.storage {
            Some(storage) => match storage.upload_report(&file_name, bytes).await {
                Ok(url) => Some(url),
                Err(e) => {
                    error!(file = %file_name, "Blob upload failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(RenderedReport {
            file_name,
            path: path.display().to_string(),
            object_url,
        })
    }

    async fn tenant_name(&self, tenant_id: i64) -> AppResult<String> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        name.ok_or_else(|| AppError::NotFound(format!("Tenant not found: {}", tenant_id)))
    }

    /// Events-over-time series from the search cluster, when configured
    async fn event_series(
        &self,
        tenant_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<(NaiveDateTime, f64)>> {
        let search = match &self.search {
            Some(search) => search,
            None => return Ok(Vec::new()),
        };
        let code: Option<String> = sqlx::query_scalar("SELECT code FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let code = match code {
            Some(code) => code,
            None => return Ok(Vec::new()),
        };
        let bucket = Bucket::for_period(start, end);
        search.event_histogram(&code, start, end, bucket).await
    }
}

/// Lay out the whole document from already-loaded data. Synchronous so the
/// non-`Send` PDF builder never lives across an await point.
fn build_document(
    template: ReportTemplate,
    tenant_name: &str,
    data: &TemplateData,
    start: NaiveDateTime,
    end: NaiveDateTime,
    tz: Tz,
) -> Result<Vec<u8>> {
    let mut pdf = ReportPdf::new(template.display_name())?;
    pdf.text_line(&format!("Tenant: {}", tenant_name));
    pdf.text_line(&format!(
        "Period: {} to {} ({})",
        to_local_naive(start, tz).format("%Y-%m-%d %H:%M"),
        to_local_naive(end, tz).format("%Y-%m-%d %H:%M"),
        tz.name()
    ));
    pdf.text_line(&format!(
        "Generated: {}",
        chrono::Utc::now()
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M %Z")
    ));
    pdf.spacer(4.0);

    match data {
        TemplateData::Incidents(data) => incident_pages(&mut pdf, data),
        TemplateData::Eps { metrics, events } => {
            eps_pages(&mut pdf, metrics, events, start, end, tz)
        }
        TemplateData::TopRules(rules) => top_rules_pages(&mut pdf, rules),
    }

    pdf.finish()
}

fn incident_pages(pdf: &mut ReportPdf, data: &IncidentData) {
    pdf.heading("Incidents per day");
    let points: Vec<ChartPoint> = data
        .series
        .iter()
        .map(|d| ChartPoint {
            label: d.date.clone(),
            value: d.incidents as f64,
        })
        .collect();
    pdf.bar_chart("Registered incidents", &points);

    pdf.heading("Incident details");
    if data.table.is_empty() {
        pdf.text_line("No incidents registered in the selected period");
        return;
    }
    // One table per day, the day label as the section heading
    for (day, alerts) in data.by_day() {
        pdf.heading(&day);
        let rows: Vec<Vec<String>> = alerts
            .iter()
            .map(|a| {
                vec![
                    a.alert_id.to_string(),
                    a.rule_name.clone(),
                    a.triggers.to_string(),
                ]
            })
            .collect();
        pdf.table(&["Alert", "Rule", "Triggers"], &rows);
    }
}

fn eps_pages(
    pdf: &mut ReportPdf,
    metrics: &EpsMetrics,
    events: &[(NaiveDateTime, f64)],
    start: NaiveDateTime,
    end: NaiveDateTime,
    tz: Tz,
) {
    pdf.heading("Events per second");
    if let Some(licensed) = metrics.licensed {
        pdf.text_line(&format!("Licensed rate: {} events/s", licensed));
    }
    pdf.text_line(&format!(
        "Total events in period: {}",
        metrics.total_events()
    ));

    let avg_points: Vec<ChartPoint> = metrics
        .days
        .iter()
        .map(|d| ChartPoint {
            label: to_local_naive(d.date, tz).format("%d/%m").to_string(),
            value: d.average,
        })
        .collect();
    pdf.line_chart("Average EPS", &avg_points);

    let peak_points: Vec<ChartPoint> = metrics
        .days
        .iter()
        .map(|d| ChartPoint {
            label: to_local_naive(d.date, tz).format("%d/%m").to_string(),
            value: d.peak,
        })
        .collect();
    pdf.line_chart("Peak EPS", &peak_points);

    if !events.is_empty() {
        pdf.heading("Event volume");
        let local: Vec<(NaiveDateTime, f64)> = events
            .iter()
            .map(|(ts, v)| (to_local_naive(*ts, tz), *v))
            .collect();
        let points = bucketize(to_local_naive(start, tz), to_local_naive(end, tz), &local);
        pdf.bar_chart("Events received", &points);
    }

    pdf.heading("Daily totals");
    if metrics.days.is_empty() {
        pdf.text_line("No metrics recorded in the selected period");
        return;
    }
    let rows: Vec<Vec<String>> = metrics
        .days
        .iter()
        .map(|d| {
            vec![
                to_local_naive(d.date, tz).format("%Y-%m-%d").to_string(),
                d.total.to_string(),
                format!("{:.2}", d.average),
                format!("{:.2}", d.peak),
            ]
        })
        .collect();
    pdf.table(&["Date", "Total events", "Average EPS", "Peak EPS"], &rows);
}

fn top_rules_pages(pdf: &mut ReportPdf, rules: &TopRules) {
    if rules.is_empty() {
        pdf.text_line("No rules triggered in the selected period");
        return;
    }

    pdf.heading("Top 10 rules");
    let rows: Vec<Vec<String>> = rules
        .general
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.rule_type.clone(),
                r.alerts.to_string(),
            ]
        })
        .collect();
    pdf.table(&["Rule", "Type", "Alerts"], &rows);

    let sections = [
        ("Match rules", &rules.match_rules),
        ("Threshold rules", &rules.threshold),
        ("Correlation rules", &rules.correlated),
        ("Advanced rules", &rules.advanced),
    ];
    for (title, detail) in sections {
        if detail.is_empty() {
            continue;
        }
        pdf.heading(title);
        let rows: Vec<Vec<String>> = detail
            .iter()
            .map(|r| {
                vec![
                    r.name.clone(),
                    r.severity.clone().unwrap_or_default(),
                    r.source.clone().unwrap_or_default(),
                    r.alerts.to_string(),
                ]
            })
            .collect();
        pdf.table(&["Rule", "Severity", "Source", "Alerts"], &rows);
    }
}
