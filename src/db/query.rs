//! Generic filter/sort query building
//!
//! Turns untyped `key:value` filter strings and `field:direction` sort
//! strings into SQL predicates against a declared entity schema. This is the
//! typed replacement for reflection-driven query building: every reachable
//! column and relationship is registered up front, and user input only ever
//! reaches the database through bind parameters.
//!
//! Filter grammar: `key[,key2,...]:value[,value2,...]`
//! - comma-separated keys are OR-combined
//! - comma-separated values are OR-combined
//! - separate filter entries are AND-combined
//! - a key may be a dot path through declared relationships
//!   (`report_type.code_name`), generating an EXISTS subquery per hop
//!
//! Malformed or unknown entries are rejected with a typed error rather than
//! silently dropped, so callers get a 422 naming the offending entry instead
//! of an unfiltered result set.

use std::fmt;

use thiserror::Error;

/// Declared type of a filterable column, driving value coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

/// A filterable/sortable column
pub struct ColumnDef {
    /// Field name as exposed in the API
    pub field: &'static str,
    /// Table-qualified SQL column expression
    pub column: &'static str,
    pub ty: ColumnType,
}

/// Relationship cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    ToOne,
    ToMany,
}

/// A traversable relationship to another entity
pub struct RelationDef {
    /// Relationship name as exposed in the API
    pub field: &'static str,
    pub kind: RelationKind,
    /// Target entity schema (function to allow cyclic references)
    pub target: fn() -> &'static EntitySchema,
    /// SQL predicate linking a target row to the enclosing row, e.g.
    /// `report_type.id = report.type`
    pub join: &'static str,
}

/// Schema of a filterable entity
pub struct EntitySchema {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
    pub relations: &'static [RelationDef],
}

impl EntitySchema {
    fn column(&self, field: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field == field)
    }

    fn relation(&self, field: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.field == field)
    }
}

/// Errors raised while interpreting filter/sort strings
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("malformed filter entry '{0}' (expected key:value)")]
    MalformedFilter(String),
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },
    #[error("invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
    #[error("invalid sort direction '{0}' (expected ASC or DESC)")]
    InvalidDirection(String),
    #[error("sort field '{0}' nests more than one relationship level")]
    SortTooDeep(String),
}

/// Value bound into the generated SQL
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Int(v) => write!(f, "{}", v),
            BindValue::Float(v) => write!(f, "{}", v),
            BindValue::Text(v) => write!(f, "{}", v),
            BindValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A SQL fragment with its ordered bind values
#[derive(Debug, Default, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl Predicate {
    fn new(sql: String, binds: Vec<BindValue>) -> Self {
        Self { sql, binds }
    }

    /// OR-combine predicates, parenthesizing the result
    fn any(mut parts: Vec<Predicate>) -> Predicate {
        if parts.len() == 1 {
            return parts.pop().expect("non-empty");
        }
        let sql = parts
            .iter()
            .map(|p| p.sql.as_str())
            .collect::<Vec<_>>()
            .join(" OR ");
        let binds = parts.into_iter().flat_map(|p| p.binds).collect();
        Predicate::new(format!("({})", sql), binds)
    }

    /// AND-combine predicates
    pub fn all(mut parts: Vec<Predicate>) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => {
                let sql = parts
                    .iter()
                    .map(|p| p.sql.as_str())
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let binds = parts.into_iter().flat_map(|p| p.binds).collect();
                Some(Predicate::new(format!("({})", sql), binds))
            }
        }
    }
}

/// Build the AND-combined predicate for a list of filter entries.
/// Returns `None` when no filters were given.
pub fn build_filters(
    schema: &'static EntitySchema,
    filters: &[String],
) -> Result<Option<Predicate>, QueryError> {
    let mut parts = Vec::with_capacity(filters.len());
    for entry in filters {
        parts.push(filter_entry(schema, entry)?);
    }
    Ok(Predicate::all(parts))
}

fn filter_entry(schema: &'static EntitySchema, entry: &str) -> Result<Predicate, QueryError> {
    let (key, value) = entry
        .split_once(':')
        .ok_or_else(|| QueryError::MalformedFilter(entry.to_string()))?;
    if key.is_empty() {
        return Err(QueryError::MalformedFilter(entry.to_string()));
    }

    let mut alternatives = Vec::new();
    for k in key.split(',') {
        alternatives.push(single_filter(schema, k.trim(), value)?);
    }
    Ok(Predicate::any(alternatives))
}

fn single_filter(
    schema: &'static EntitySchema,
    key: &str,
    value: &str,
) -> Result<Predicate, QueryError> {
    match key.split_once('.') {
        None => {
            let col = schema.column(key).ok_or_else(|| QueryError::UnknownField {
                entity: schema.table.to_string(),
                field: key.to_string(),
            })?;
            column_predicate(col, value)
        }
        Some((rel_name, rest)) => {
            let rel = schema
                .relation(rel_name)
                .ok_or_else(|| QueryError::UnknownField {
                    entity: schema.table.to_string(),
                    field: rel_name.to_string(),
                })?;
            let target = (rel.target)();
            let inner = single_filter(target, rest, value)?;
            // EXISTS covers both cardinalities; a to-one relation simply
            // matches at most one row.
            let sql = format!(
                "EXISTS (SELECT 1 FROM {} WHERE {} AND {})",
                target.table, rel.join, inner.sql
            );
            Ok(Predicate::new(sql, inner.binds))
        }
    }
}

/// Generate the comparison for a single column, coercing the raw value
/// according to the column's declared type
fn column_predicate(col: &ColumnDef, value: &str) -> Result<Predicate, QueryError> {
    let invalid = || QueryError::InvalidValue {
        field: col.field.to_string(),
        value: value.to_string(),
    };
    let values: Vec<&str> = value.split(',').collect();

    match col.ty {
        // Booleans never accept value lists; the whole raw value is parsed
        ColumnType::Boolean => {
            let parsed = parse_bool(value).ok_or_else(invalid)?;
            Ok(Predicate::new(
                format!("{} = ?", col.column),
                vec![BindValue::Bool(parsed)],
            ))
        }
        ColumnType::Integer => {
            let binds = values
                .iter()
                .map(|v| v.trim().parse::<i64>().map(BindValue::Int))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid())?;
            Ok(in_list(col.column, binds))
        }
        ColumnType::Float => {
            let binds = values
                .iter()
                .map(|v| v.trim().parse::<f64>().map(BindValue::Float))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid())?;
            Ok(in_list(col.column, binds))
        }
        // Case-insensitive substring match, OR-combined per value
        ColumnType::Text => {
            let parts = values
                .iter()
                .map(|v| {
                    Predicate::new(
                        format!("LOWER({}) LIKE '%' || LOWER(?) || '%'", col.column),
                        vec![BindValue::Text(v.to_string())],
                    )
                })
                .collect();
            Ok(Predicate::any(parts))
        }
        // Timestamps (and anything else) compare as exact string membership
        ColumnType::Timestamp => {
            let binds = values
                .iter()
                .map(|v| BindValue::Text(v.to_string()))
                .collect();
            Ok(in_list(col.column, binds))
        }
    }
}

fn in_list(column: &str, binds: Vec<BindValue>) -> Predicate {
    let placeholders = vec!["?"; binds.len()].join(", ");
    Predicate::new(format!("{} IN ({})", column, placeholders), binds)
}

/// Lenient boolean parsing (y/yes/t/true/on/1 and n/no/f/false/off/0)
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Build ORDER BY terms for a list of sort entries.
///
/// Direction defaults to ascending when the `:` separator is absent. A sort
/// field may traverse a single relationship level
/// (`report_type.name:DESC`), emitted as a correlated scalar subquery.
pub fn build_sorts(
    schema: &'static EntitySchema,
    sorts: &[String],
) -> Result<Vec<String>, QueryError> {
    sorts.iter().map(|s| sort_entry(schema, s)).collect()
}

fn sort_entry(schema: &'static EntitySchema, entry: &str) -> Result<String, QueryError> {
    let (field, direction) = match entry.split_once(':') {
        Some((f, d)) => (f, d),
        None => (entry, "ASC"),
    };

    let direction = match direction.trim().to_ascii_uppercase().as_str() {
        "ASC" => "ASC",
        "DESC" => "DESC",
        other => return Err(QueryError::InvalidDirection(other.to_string())),
    };

    match field.split_once('.') {
        None => {
            let col = schema
                .column(field.trim())
                .ok_or_else(|| QueryError::UnknownField {
                    entity: schema.table.to_string(),
                    field: field.to_string(),
                })?;
            Ok(format!("{} {}", col.column, direction))
        }
        Some((rel_name, rest)) => {
            if rest.contains('.') {
                return Err(QueryError::SortTooDeep(field.to_string()));
            }
            let rel = schema
                .relation(rel_name.trim())
                .ok_or_else(|| QueryError::UnknownField {
                    entity: schema.table.to_string(),
                    field: rel_name.to_string(),
                })?;
            let target = (rel.target)();
            let col = target
                .column(rest.trim())
                .ok_or_else(|| QueryError::UnknownField {
                    entity: target.table.to_string(),
                    field: rest.to_string(),
                })?;
            Ok(format!(
                "(SELECT {} FROM {} WHERE {}) {}",
                col.column, target.table, rel.join, direction
            ))
        }
    }
}

/// Pagination parameters (1-based page index)
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: i64,
    pub page_size: i64,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 100,
        }
    }
}

impl PageParams {
    pub fn offset(&self) -> i64 {
        self.page_size
            .saturating_mul(self.page.saturating_sub(1).max(0))
    }

    /// Total page count for a result set
    pub fn number_pages(&self, count: i64) -> i64 {
        if self.page_size <= 0 {
            return 0;
        }
        (count + self.page_size - 1) / self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static DETAIL_SCHEMA: EntitySchema = EntitySchema {
        table: "detail",
        columns: &[
            ColumnDef {
                field: "id",
                column: "detail.id",
                ty: ColumnType::Integer,
            },
            ColumnDef {
                field: "label",
                column: "detail.label",
                ty: ColumnType::Text,
            },
        ],
        relations: &[],
    };

    fn detail_schema() -> &'static EntitySchema {
        &DETAIL_SCHEMA
    }

    static ITEM_SCHEMA: EntitySchema = EntitySchema {
        table: "item",
        columns: &[
            ColumnDef {
                field: "id",
                column: "item.id",
                ty: ColumnType::Integer,
            },
            ColumnDef {
                field: "name",
                column: "item.name",
                ty: ColumnType::Text,
            },
            ColumnDef {
                field: "score",
                column: "item.score",
                ty: ColumnType::Float,
            },
            ColumnDef {
                field: "active",
                column: "item.active",
                ty: ColumnType::Boolean,
            },
            ColumnDef {
                field: "created_at",
                column: "item.created_at",
                ty: ColumnType::Timestamp,
            },
        ],
        relations: &[RelationDef {
            field: "detail",
            kind: RelationKind::ToOne,
            target: detail_schema,
            join: "detail.id = item.detail_id",
        }],
    };

    fn filters(entries: &[&str]) -> Result<Option<Predicate>, QueryError> {
        let owned: Vec<String> = entries.iter().map(|s| s.to_string()).collect();
        build_filters(&ITEM_SCHEMA, &owned)
    }

    #[test]
    fn test_integer_list_membership() {
        let p = filters(&["id:1,2,3"]).unwrap().unwrap();
        assert_eq!(p.sql, "item.id IN (?, ?, ?)");
        assert_eq!(
            p.binds,
            vec![BindValue::Int(1), BindValue::Int(2), BindValue::Int(3)]
        );
    }

    #[test]
    fn test_text_substring_match() {
        let p = filters(&["name:abc"]).unwrap().unwrap();
        assert_eq!(p.sql, "LOWER(item.name) LIKE '%' || LOWER(?) || '%'");
        assert_eq!(p.binds, vec![BindValue::Text("abc".to_string())]);
    }

    #[test]
    fn test_text_value_list_is_or_combined() {
        let p = filters(&["name:ab,cd"]).unwrap().unwrap();
        assert_eq!(
            p.sql,
            "(LOWER(item.name) LIKE '%' || LOWER(?) || '%' OR \
             LOWER(item.name) LIKE '%' || LOWER(?) || '%')"
        );
        assert_eq!(p.binds.len(), 2);
    }

    #[test]
    fn test_key_list_is_or_combined() {
        let p = filters(&["id,score:2"]).unwrap().unwrap();
        assert_eq!(p.sql, "(item.id IN (?) OR item.score IN (?))");
        assert_eq!(p.binds, vec![BindValue::Int(2), BindValue::Float(2.0)]);
    }

    #[test]
    fn test_entries_are_and_combined() {
        let p = filters(&["id:1", "name:x"]).unwrap().unwrap();
        assert!(p.sql.starts_with('('));
        assert!(p.sql.contains(" AND "));
        assert_eq!(p.binds.len(), 2);
    }

    #[test]
    fn test_boolean_rejects_lists() {
        assert!(matches!(
            filters(&["active:true,false"]),
            Err(QueryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_boolean_spellings() {
        for v in ["true", "T", "yes", "on", "1", "Y"] {
            let p = filters(&[&format!("active:{}", v)]).unwrap().unwrap();
            assert_eq!(p.binds, vec![BindValue::Bool(true)], "value {}", v);
        }
        for v in ["false", "F", "no", "off", "0", "N"] {
            let p = filters(&[&format!("active:{}", v)]).unwrap().unwrap();
            assert_eq!(p.binds, vec![BindValue::Bool(false)], "value {}", v);
        }
    }

    #[test]
    fn test_timestamp_exact_membership() {
        let p = filters(&["created_at:2024-01-01 00:00:00"]).unwrap().unwrap();
        assert_eq!(p.sql, "item.created_at IN (?)");
    }

    #[test]
    fn test_relationship_filter_wraps_in_exists() {
        let p = filters(&["detail.label:foo"]).unwrap().unwrap();
        assert_eq!(
            p.sql,
            "EXISTS (SELECT 1 FROM detail WHERE detail.id = item.detail_id \
             AND LOWER(detail.label) LIKE '%' || LOWER(?) || '%')"
        );
    }

    #[test]
    fn test_malformed_entry_is_rejected() {
        assert_eq!(
            filters(&["no-separator"]),
            Err(QueryError::MalformedFilter("no-separator".to_string()))
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            filters(&["nope:1"]),
            Err(QueryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_invalid_integer_value() {
        assert!(matches!(
            filters(&["id:abc"]),
            Err(QueryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_no_filters_yields_none() {
        assert!(filters(&[]).unwrap().is_none());
    }

    #[test]
    fn test_sort_defaults_to_ascending() {
        let sorts = build_sorts(&ITEM_SCHEMA, &["name".to_string()]).unwrap();
        assert_eq!(sorts, vec!["item.name ASC".to_string()]);
    }

    #[test]
    fn test_sort_direction_case_insensitive() {
        let sorts = build_sorts(&ITEM_SCHEMA, &["id:desc".to_string()]).unwrap();
        assert_eq!(sorts, vec!["item.id DESC".to_string()]);
    }

    #[test]
    fn test_sort_through_relation() {
        let sorts = build_sorts(&ITEM_SCHEMA, &["detail.label:DESC".to_string()]).unwrap();
        assert_eq!(
            sorts,
            vec![
                "(SELECT detail.label FROM detail WHERE detail.id = item.detail_id) DESC"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_sort_rejects_bad_direction() {
        assert_eq!(
            build_sorts(&ITEM_SCHEMA, &["id:sideways".to_string()]),
            Err(QueryError::InvalidDirection("SIDEWAYS".to_string()))
        );
    }

    #[test]
    fn test_sort_rejects_deep_nesting() {
        assert!(matches!(
            build_sorts(&ITEM_SCHEMA, &["detail.inner.label".to_string()]),
            Err(QueryError::SortTooDeep(_))
        ));
    }

    #[test]
    fn test_page_math() {
        let p = PageParams {
            page: 3,
            page_size: 20,
        };
        assert_eq!(p.offset(), 40);
        assert_eq!(p.number_pages(0), 0);
        assert_eq!(p.number_pages(41), 3);
        assert_eq!(p.number_pages(60), 3);
        assert_eq!(p.number_pages(61), 4);
    }

    #[test]
    fn test_offset_saturates_on_huge_page() {
        let p = PageParams {
            page: i64::MAX,
            page_size: 1000,
        };
        assert_eq!(p.offset(), i64::MAX);

        let p = PageParams {
            page: 0,
            page_size: 1000,
        };
        assert_eq!(p.offset(), 0);
    }
}
