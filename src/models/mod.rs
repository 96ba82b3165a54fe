//! Data models

pub mod analytics;
pub mod report;

pub use analytics::{
    EpsDay, EpsMetrics, IncidentAlert, IncidentData, IncidentDay, RankedRule, RankedRuleDetail,
    TopRules,
};
pub use report::{
    CreateReportRequest, PaginatedReports, RegisterReportResponse, Report, ReportStatus,
    ReportTemplate, REPORT_SCHEMA,
};
