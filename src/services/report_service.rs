//! Report registry service
//!
//! Registration and listing of report requests. Rendering is handled
//! separately by the render service; a newly registered report just sits in
//! the registry as on-hold until its document is requested.

use std::collections::BTreeMap;

use validator::Validate;

use crate::db::query::PageParams;
use crate::db::report_repository::{NewReport, ReportRepository};
use crate::models::{CreateReportRequest, PaginatedReports, RegisterReportResponse};
use crate::utils::error::{AppError, AppResult};
use crate::DbPool;

/// Detail code returned on successful registration, kept stable for API
/// clients that match on it
const REGISTERED_DETAIL: &str = "api072";

pub struct ReportService {
    pool: DbPool,
}

impl ReportService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a report request for later rendering
    pub async fn register(
        &self,
        tenant_id: i64,
        created_by: &str,
        req: CreateReportRequest,
    ) -> AppResult<RegisterReportResponse> {
        req.validate()?;

        let repo = ReportRepository::new(&self.pool);
        let report = repo
            .create(&NewReport {
                name: req.name,
                report_type: req.report_type,
                start_date: req.start_date.naive_utc(),
                end_date: req.end_date.naive_utc(),
                tenant_id,
                created_by: created_by.to_string(),
            })
            .await?;

        Ok(RegisterReportResponse {
            detail: REGISTERED_DETAIL.to_string(),
            new_report_id: report.id,
        })
    }

    /// List the tenant's reports with user-supplied filters and sorts.
    /// Malformed filter or sort entries are rejected, not dropped.
    pub async fn list(
        &self,
        tenant_id: i64,
        page: PageParams,
        filters: &[String],
        sorts: &[String],
    ) -> AppResult<PaginatedReports> {
        let repo = ReportRepository::new(&self.pool);
        let result = repo.list(tenant_id, page, filters, sorts).await?;

        let created_by = repo.distinct_created_by(tenant_id).await?;
        let mut available_filters = BTreeMap::new();
        available_filters.insert("created_by".to_string(), created_by);

        Ok(PaginatedReports {
            current_page: page.page,
            page_size: page.page_size,
            number_pages: page.number_pages(result.count),
            count: result.count,
            available_filters,
            records: result.records,
        })
    }

    /// Fetch one report, scoped to the tenant
    pub async fn get(&self, tenant_id: i64, report_id: i64) -> AppResult<crate::models::Report> {
        let repo = ReportRepository::new(&self.pool);
        repo.get_by_id(report_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report not found: {}", report_id)))
    }
}
