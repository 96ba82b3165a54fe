//! Repository for the report registry

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::db::query::{self, BindValue, PageParams};
use crate::models::report::REPORT_SCHEMA;
use crate::models::Report;
use crate::utils::timefmt::parse_db_timestamp;

const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns selected for every report read
const REPORT_COLUMNS: &str = "report.id, report.name, report.status, report.type AS type_id, \
     report.start_date, report.end_date, report.tenant_id, report.created_by, \
     report.created_at, report.updated_at";

/// Row returned from the report table
#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    name: Option<String>,
    status: i64,
    type_id: i64,
    start_date: String,
    end_date: String,
    tenant_id: i64,
    created_by: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

fn row_to_report(row: ReportRow) -> Result<Report> {
    let start_date = parse_db_timestamp(&row.start_date)
        .with_context(|| format!("Unparseable start_date on report {}", row.id))?;
    let end_date = parse_db_timestamp(&row.end_date)
        .with_context(|| format!("Unparseable end_date on report {}", row.id))?;
    Ok(Report {
        id: row.id,
        name: row.name,
        status: row.status,
        report_type: row.type_id,
        start_date,
        end_date,
        tenant_id: row.tenant_id,
        created_by: row.created_by,
        created_at: row.created_at.as_deref().and_then(parse_db_timestamp),
        updated_at: row.updated_at.as_deref().and_then(parse_db_timestamp),
    })
}

/// Report to be inserted
#[derive(Debug, Clone)]
pub struct NewReport {
    pub name: String,
    pub report_type: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub tenant_id: i64,
    pub created_by: String,
}

/// A page of reports together with the total match count
#[derive(Debug)]
pub struct ReportPage {
    pub count: i64,
    pub records: Vec<Report>,
}

/// Repository for report registry operations
pub struct ReportRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReportRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new report in `on_hold` status
    pub async fn create(&self, report: &NewReport) -> Result<Report> {
        let now = chrono::Utc::now().format(DB_DATETIME_FORMAT).to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO report (name, status, type, start_date, end_date, tenant_id,
                                created_by, created_at, updated_at)
            VALUES (?, 1, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.name)
        .bind(report.report_type)
        .bind(report.start_date.format(DB_DATETIME_FORMAT).to_string())
        .bind(report.end_date.format(DB_DATETIME_FORMAT).to_string())
        .bind(report.tenant_id)
        .bind(&report.created_by)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .context("Failed to insert report")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id, report.tenant_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created report"))
    }

    /// Get a report by ID, scoped to a tenant
    pub async fn get_by_id(&self, id: i64, tenant_id: i64) -> Result<Option<Report>> {
        let sql = format!(
            "SELECT {} FROM report WHERE report.id = ? AND report.tenant_id = ?",
            REPORT_COLUMNS
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(self.pool)
            .await
            .context("Failed to fetch report")?;

        row.map(row_to_report).transpose()
    }

    /// Update the lifecycle status of a report
    pub async fn set_status(&self, id: i64, status: crate::models::ReportStatus) -> Result<()> {
        sqlx::query("UPDATE report SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_i64())
            .bind(chrono::Utc::now().format(DB_DATETIME_FORMAT).to_string())
            .bind(id)
            .execute(self.pool)
            .await
            .context("Failed to update report status")?;
        Ok(())
    }

    /// List reports for a tenant with pagination and generic filters/sorts.
    ///
    /// A trailing `id DESC` sort keeps the ordering stable regardless of the
    /// caller's sort choice.
    pub async fn list(
        &self,
        tenant_id: i64,
        page: PageParams,
        filters: &[String],
        sorts: &[String],
    ) -> Result<ReportPage, crate::utils::error::AppError> {
        let predicate = query::build_filters(&REPORT_SCHEMA, filters)?;
        let mut order_terms = query::build_sorts(&REPORT_SCHEMA, sorts)?;
        order_terms.push("report.id DESC".to_string());

        let where_sql = match predicate {
            Some(ref p) => format!("report.tenant_id = ? AND {}", p.sql),
            None => "report.tenant_id = ?".to_string(),
        };

        let count_sql = format!("SELECT COUNT(*) FROM report WHERE {}", where_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(tenant_id);
        if let Some(ref p) = predicate {
            for bind in &p.binds {
                count_query = match bind {
                    BindValue::Int(v) => count_query.bind(*v),
                    BindValue::Float(v) => count_query.bind(*v),
                    BindValue::Text(v) => count_query.bind(v.clone()),
                    BindValue::Bool(v) => count_query.bind(*v),
                };
            }
        }
        let count = count_query
            .fetch_one(self.pool)
            .await
            .map_err(|e| crate::utils::error::AppError::Database(e.to_string()))?;

        let list_sql = format!(
            "SELECT {} FROM report WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            REPORT_COLUMNS,
            where_sql,
            order_terms.join(", ")
        );
        let mut list_query = sqlx::query_as::<_, ReportRow>(&list_sql).bind(tenant_id);
        if let Some(ref p) = predicate {
            for bind in &p.binds {
                list_query = match bind {
                    BindValue::Int(v) => list_query.bind(*v),
                    BindValue::Float(v) => list_query.bind(*v),
                    BindValue::Text(v) => list_query.bind(v.clone()),
                    BindValue::Bool(v) => list_query.bind(*v),
                };
            }
        }
        let rows = list_query
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(self.pool)
            .await
            .map_err(|e| crate::utils::error::AppError::Database(e.to_string()))?;

        let records = rows
            .into_iter()
            .map(row_to_report)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| crate::utils::error::AppError::Database(e.to_string()))?;

        Ok(ReportPage { count, records })
    }

    /// Distinct creators of reports for a tenant (drives available filters)
    pub async fn distinct_created_by(&self, tenant_id: i64) -> Result<Vec<String>> {
        let values: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT created_by FROM report \
             WHERE tenant_id = ? AND created_by IS NOT NULL ORDER BY created_by",
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch distinct created_by values")?;
        Ok(values)
    }
}
