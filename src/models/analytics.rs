//! Analytics query result models
//!
//! Row shapes returned by the analytics repository and the composed data
//! models that feed the PDF templates.

use chrono::NaiveDateTime;
use serde::Serialize;

/// One day of the incidents/alerts series
#[derive(Debug, Clone, Serialize)]
pub struct IncidentDay {
    /// Day label as `MM/DD/YYYY`
    pub date: String,
    pub incidents: i64,
    pub alert_sum: i64,
}

/// One alert row of the incident table
#[derive(Debug, Clone, Serialize)]
pub struct IncidentAlert {
    pub alert_id: i64,
    pub rule_name: String,
    /// Day label as `MM/DD/YYYY`
    pub date: String,
    pub triggers: i64,
}

/// Ranked rule in the overall top-10 listing
#[derive(Debug, Clone, Serialize)]
pub struct RankedRule {
    pub id: i64,
    pub name: String,
    /// Rule type label (Match/Threshold/Correlation/Advanced)
    pub rule_type: String,
    pub alerts: i64,
}

/// Ranked rule in a per-type top-10 listing
#[derive(Debug, Clone, Serialize)]
pub struct RankedRuleDetail {
    pub id: i64,
    pub name: String,
    pub alerts: i64,
    /// Severity label (Info/Low/Medium/High/Critical)
    pub severity: Option<String>,
    /// Source label (Default/Tenant/Channel)
    pub source: Option<String>,
}

/// Complete top-10 rules data set
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopRules {
    pub general: Vec<RankedRule>,
    pub match_rules: Vec<RankedRuleDetail>,
    pub threshold: Vec<RankedRuleDetail>,
    pub correlated: Vec<RankedRuleDetail>,
    pub advanced: Vec<RankedRuleDetail>,
}

impl TopRules {
    pub fn is_empty(&self) -> bool {
        self.general.is_empty()
    }
}

/// One day of events-per-second metrics
#[derive(Debug, Clone, Serialize)]
pub struct EpsDay {
    pub date: NaiveDateTime,
    /// Total registered events
    pub total: i64,
    pub average: f64,
    pub peak: f64,
}

/// EPS metrics for a period, with the tenant's licensed rate
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpsMetrics {
    pub licensed: Option<i64>,
    pub days: Vec<EpsDay>,
}

impl EpsMetrics {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_events(&self) -> i64 {
        self.days.iter().map(|d| d.total).sum()
    }
}

/// Incidents data set for a period
#[derive(Debug, Clone, Default, Serialize)]
pub struct IncidentData {
    pub series: Vec<IncidentDay>,
    pub table: Vec<IncidentAlert>,
}

impl IncidentData {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty() || self.table.is_empty()
    }

    /// Incident rows grouped by day, preserving day order of appearance
    pub fn by_day(&self) -> Vec<(String, Vec<&IncidentAlert>)> {
        let mut groups: Vec<(String, Vec<&IncidentAlert>)> = Vec::new();
        for row in &self.table {
            match groups.iter_mut().find(|(day, _)| *day == row.date) {
                Some((_, rows)) => rows.push(row),
                None => groups.push((row.date.clone(), vec![row])),
            }
        }
        groups
    }
}
