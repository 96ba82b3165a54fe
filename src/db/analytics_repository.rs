//! Repository for the alerting analytics tables
//!
//! Read-only queries powering the three report templates. All queries are
//! tenant- and period-scoped; timestamps are compared as their stored
//! `YYYY-MM-DD HH:MM:SS` text form.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use crate::models::{
    EpsDay, EpsMetrics, IncidentAlert, IncidentData, IncidentDay, RankedRule, RankedRuleDetail,
    TopRules,
};
use crate::utils::timefmt::parse_db_timestamp;

const DB_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SEVERITY_CASE: &str = "CASE rule.severity \
     WHEN 1 THEN 'Info' WHEN 2 THEN 'Low' WHEN 3 THEN 'Medium' \
     WHEN 4 THEN 'High' WHEN 5 THEN 'Critical' END";

const SOURCE_CASE: &str = "CASE rule.source \
     WHEN 0 THEN 'Default' WHEN 1 THEN 'Tenant' WHEN 2 THEN 'Channel' END";

#[derive(Debug, sqlx::FromRow)]
struct IncidentDayRow {
    day: String,
    incidents: i64,
    alert_sum: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct IncidentAlertRow {
    alert_id: i64,
    rule_name: String,
    day: String,
    triggers: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RankedRuleRow {
    id: i64,
    name: String,
    rule_type: Option<String>,
    alerts: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct RankedRuleDetailRow {
    id: i64,
    name: String,
    alerts: i64,
    severity: Option<String>,
    source: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct EpsRow {
    eps_date: String,
    eps_total: Option<i64>,
    eps_avg: Option<f64>,
    eps: Option<f64>,
    eps_licensed: Option<i64>,
}

/// Repository for analytics queries
pub struct AnalyticsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalyticsRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Incidents and alert sums per day, plus the flat incident table,
    /// for non-trial alerts in the period
    pub async fn incidents(
        &self,
        tenant_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<IncidentData> {
        let start = start.format(DB_DATETIME_FORMAT).to_string();
        let end = end.format(DB_DATETIME_FORMAT).to_string();

        let series_rows = sqlx::query_as::<_, IncidentDayRow>(
            r#"
            SELECT strftime('%m/%d/%Y', alert.created_at) AS day,
                   COUNT(alert.id) AS incidents,
                   COALESCE(SUM(alert.triggers), 0) AS alert_sum
            FROM alert
            WHERE alert.tenant_id = ? AND alert.trial = 0
              AND alert.created_at BETWEEN ? AND ?
            GROUP BY day
            ORDER BY MIN(alert.created_at)
            "#,
        )
        .bind(tenant_id)
        .bind(&start)
        .bind(&end)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch incident series")?;

        let table_rows = sqlx::query_as::<_, IncidentAlertRow>(
            r#"
            SELECT alert.id AS alert_id, rule.name AS rule_name,
                   strftime('%m/%d/%Y', alert.created_at) AS day,
                   alert.triggers
            FROM alert
            INNER JOIN rule ON rule.id = alert.rule_id
            WHERE alert.tenant_id = ? AND alert.trial = 0
              AND alert.created_at BETWEEN ? AND ?
            ORDER BY alert.created_at, alert.id
            "#,
        )
        .bind(tenant_id)
        .bind(&start)
        .bind(&end)
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch incident table")?;

        Ok(IncidentData {
            series: series_rows
                .into_iter()
                .map(|r| IncidentDay {
                    date: r.day,
                    incidents: r.incidents,
                    alert_sum: r.alert_sum,
                })
                .collect(),
            table: table_rows
                .into_iter()
                .map(|r| IncidentAlert {
                    alert_id: r.alert_id,
                    rule_name: r.rule_name,
                    date: r.day,
                    triggers: r.triggers,
                })
                .collect(),
        })
    }

    /// Top-10 rules overall and per rule type, ranked by triggered-alert sum
    pub async fn top_rules(
        &self,
        tenant_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<TopRules> {
        let start = start.format(DB_DATETIME_FORMAT).to_string();
        let end = end.format(DB_DATETIME_FORMAT).to_string();

        let general_rows = sqlx::query_as::<_, RankedRuleRow>(
            r#"
            SELECT rule.id, rule.name,
                   CASE rule.rule_type
                        WHEN 1 THEN 'Match' WHEN 2 THEN 'Threshold'
                        WHEN 3 THEN 'Correlation' WHEN 4 THEN 'Advanced' END AS rule_type,
                   COALESCE(SUM(alert.triggers), 0) AS alerts
            FROM rule
            INNER JOIN alert ON alert.rule_id = rule.id
            WHERE alert.tenant_id = ? AND alert.created_at BETWEEN ? AND ?
            GROUP BY rule.id
            ORDER BY alerts DESC
            LIMIT 10
            "#,
        )
            .bind(tenant_id)
            .bind(&start)
            .bind(&end)
            .fetch_all(self.pool)
            .await
            .context("Failed to fetch overall top rules")?;

        let general = general_rows
            .into_iter()
            .map(|r| RankedRule {
                id: r.id,
                name: r.name,
                rule_type: r.rule_type.unwrap_or_default(),
                alerts: r.alerts,
            })
            .collect();

        Ok(TopRules {
            general,
            match_rules: self.top_rules_of_type(tenant_id, 1, &start, &end).await?,
            threshold: self.top_rules_of_type(tenant_id, 2, &start, &end).await?,
            correlated: self.top_rules_of_type(tenant_id, 3, &start, &end).await?,
            advanced: self.top_rules_of_type(tenant_id, 4, &start, &end).await?,
        })
    }

    async fn top_rules_of_type(
        &self,
        tenant_id: i64,
        rule_type: i64,
        start: &str,
        end: &str,
    ) -> Result<Vec<RankedRuleDetail>> {
        let sql = format!(
            r#"
            SELECT rule.id, rule.name,
                   COALESCE(SUM(alert.triggers), 0) AS alerts,
                   {SEVERITY_CASE} AS severity,
                   {SOURCE_CASE} AS source
            FROM rule
            INNER JOIN alert ON alert.rule_id = rule.id
            WHERE alert.tenant_id = ? AND rule.rule_type = ?
              AND alert.created_at BETWEEN ? AND ?
            GROUP BY rule.id
            ORDER BY alerts DESC
            LIMIT 10
            "#
        );
        let rows = sqlx::query_as::<_, RankedRuleDetailRow>(&sql)
            .bind(tenant_id)
            .bind(rule_type)
            .bind(start)
            .bind(end)
            .fetch_all(self.pool)
            .await
            .with_context(|| format!("Failed to fetch top rules of type {}", rule_type))?;

        Ok(rows
            .into_iter()
            .map(|r| RankedRuleDetail {
                id: r.id,
                name: r.name,
                alerts: r.alerts,
                severity: r.severity,
                source: r.source,
            })
            .collect())
    }

    /// Events-per-second metrics for the tenant, joined to its licensed rate
    pub async fn eps_metrics(
        &self,
        tenant_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<EpsMetrics> {
        let rows = sqlx::query_as::<_, EpsRow>(
            r#"
            SELECT event_metrics.eps_date, event_metrics.eps_total,
                   event_metrics.eps_avg, event_metrics.eps,
                   tenants.eps_licensed
            FROM event_metrics
            INNER JOIN tenants ON event_metrics.tenant_code = tenants.code
            WHERE tenants.id = ?
              AND date(event_metrics.eps_date) >= date(?)
              AND date(event_metrics.eps_date) <= date(?)
            ORDER BY event_metrics.eps_date
            "#,
        )
        .bind(tenant_id)
        .bind(start.format(DB_DATETIME_FORMAT).to_string())
        .bind(end.format(DB_DATETIME_FORMAT).to_string())
        .fetch_all(self.pool)
        .await
        .context("Failed to fetch EPS metrics")?;

        let licensed = rows.first().and_then(|r| r.eps_licensed);
        let days = rows
            .into_iter()
            .filter_map(|r| {
                let date = parse_db_timestamp(&r.eps_date)?.naive_utc();
                Some(EpsDay {
                    date,
                    total: r.eps_total.unwrap_or(0),
                    average: r.eps_avg.unwrap_or(0.0),
                    peak: r.eps.unwrap_or(0.0),
                })
            })
            .collect();

        Ok(EpsMetrics { licensed, days })
    }
}
