//! Report registry models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::db::query::{ColumnDef, ColumnType, EntitySchema, RelationDef, RelationKind};

/// Lifecycle status of a registered report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    OnHold = 1,
    Processing = 2,
    Done = 3,
}

impl ReportStatus {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(ReportStatus::OnHold),
            2 => Some(ReportStatus::Processing),
            3 => Some(ReportStatus::Done),
            _ => None,
        }
    }
}

/// Report template identifiers, matching the `report_type.code_name` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTemplate {
    IncidentAlerts,
    Eps,
    Top10Rules,
}

impl ReportTemplate {
    pub fn code_name(self) -> &'static str {
        match self {
            ReportTemplate::IncidentAlerts => "incident_alerts_report",
            ReportTemplate::Eps => "eps_report",
            ReportTemplate::Top10Rules => "top_10_rules_report",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ReportTemplate::IncidentAlerts => "Registered Incidents",
            ReportTemplate::Eps => "Registered Events",
            ReportTemplate::Top10Rules => "Top 10 Rules",
        }
    }

    /// File name of the rendered document
    pub fn file_name(self, report_id: i64) -> String {
        format!("report_{}_{}.pdf", self.code_name(), report_id)
    }

    /// Template seeded under the given `report_type.id`
    pub fn from_type_id(type_id: i64) -> Option<Self> {
        match type_id {
            1 => Some(ReportTemplate::IncidentAlerts),
            2 => Some(ReportTemplate::Eps),
            3 => Some(ReportTemplate::Top10Rules),
            _ => None,
        }
    }
}

/// A registered report request
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub name: Option<String>,
    pub status: i64,
    #[serde(rename = "type")]
    pub report_type: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub tenant_id: i64,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for registering a report
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_period"))]
pub struct CreateReportRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(rename = "type")]
    #[validate(range(min = 1, max = 3))]
    pub report_type: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

fn validate_period(req: &CreateReportRequest) -> Result<(), ValidationError> {
    if req.end_date <= req.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    Ok(())
}

/// Response for a successful registration
#[derive(Debug, Serialize)]
pub struct RegisterReportResponse {
    pub detail: String,
    pub new_report_id: i64,
}

/// Paginated report list response
#[derive(Debug, Serialize)]
pub struct PaginatedReports {
    pub current_page: i64,
    pub page_size: i64,
    pub number_pages: i64,
    pub count: i64,
    /// Distinct values usable as filters, keyed by field name
    pub available_filters: BTreeMap<String, Vec<String>>,
    pub records: Vec<Report>,
}

static REPORT_TYPE_SCHEMA: EntitySchema = EntitySchema {
    table: "report_type",
    columns: &[
        ColumnDef {
            field: "id",
            column: "report_type.id",
            ty: ColumnType::Integer,
        },
        ColumnDef {
            field: "name",
            column: "report_type.name",
            ty: ColumnType::Text,
        },
        ColumnDef {
            field: "code_name",
            column: "report_type.code_name",
            ty: ColumnType::Text,
        },
    ],
    relations: &[],
};

fn report_type_schema() -> &'static EntitySchema {
    &REPORT_TYPE_SCHEMA
}

/// Filter/sort schema of the `report` table
pub static REPORT_SCHEMA: EntitySchema = EntitySchema {
    table: "report",
    columns: &[
        ColumnDef {
            field: "id",
            column: "report.id",
            ty: ColumnType::Integer,
        },
        ColumnDef {
            field: "name",
            column: "report.name",
            ty: ColumnType::Text,
        },
        ColumnDef {
            field: "status",
            column: "report.status",
            ty: ColumnType::Integer,
        },
        ColumnDef {
            field: "type",
            column: "report.type",
            ty: ColumnType::Integer,
        },
        ColumnDef {
            field: "start_date",
            column: "report.start_date",
            ty: ColumnType::Timestamp,
        },
        ColumnDef {
            field: "end_date",
            column: "report.end_date",
            ty: ColumnType::Timestamp,
        },
        ColumnDef {
            field: "tenant_id",
            column: "report.tenant_id",
            ty: ColumnType::Integer,
        },
        ColumnDef {
            field: "created_by",
            column: "report.created_by",
            ty: ColumnType::Text,
        },
        ColumnDef {
            field: "created_at",
            column: "report.created_at",
            ty: ColumnType::Timestamp,
        },
        ColumnDef {
            field: "updated_at",
            column: "report.updated_at",
            ty: ColumnType::Timestamp,
        },
    ],
    relations: &[RelationDef {
        field: "report_type",
        kind: RelationKind::ToOne,
        target: report_type_schema,
        join: "report_type.id = report.type",
    }],
};
