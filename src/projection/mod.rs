//! Record projection: nested Jira JSON -> flat mirror rows.
//!
//! A [`FieldMap`] declares, in column order, where each column's value lives
//! in the source record (a dotted path such as `fields.status.name`) and what
//! type it is stored as. Projection never fails on a missing optional field;
//! the column simply becomes [`Cell::Null`].
//!
//! # Submodules
//!
//! - [`mappings`] - Field maps for each mirrored entity
//! - [`temporal`] - Timestamp parsing and UTC normalization

pub mod mappings;
pub mod temporal;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Keys tried, in order, when a path ends on an object instead of a scalar.
const UNWRAP_KEYS: &[&str] = &["displayName", "name", "value", "key"];

/// Storage type of a mirror column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Timestamp,
}

impl ColumnKind {
    /// SQL type declared for the column when the table is created.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Recover a kind from a declared SQL type. Unknown types read as text.
    #[must_use]
    pub fn from_sql_type(declared: &str) -> Self {
        match declared.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" | "BIGINT" => Self::Integer,
            "REAL" | "FLOAT" | "DOUBLE" => Self::Real,
            "TIMESTAMP" | "DATETIME" => Self::Timestamp,
            _ => Self::Text,
        }
    }
}

/// A column name plus its storage type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A single typed value in a mirror row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text view of the cell, if it holds text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Render the cell as a key string (issue keys, sprint ids).
    #[must_use]
    pub fn to_key(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(n) => Some(n.to_string()),
            Self::Real(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Timestamp(ts) => Some(ts.to_rfc3339()),
        }
    }
}

/// One flattened row, aligned with its batch's columns.
pub type MirrorRow = Vec<Cell>;

/// A batch of rows sharing one column list.
///
/// The column list is also the type hint used when a table is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<MirrorRow>,
}

impl RowBatch {
    /// An empty batch with the given columns.
    #[must_use]
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate one column's cells across all rows.
    ///
    /// Yields nothing if the column does not exist.
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Cell> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    /// Append another batch's rows. Columns must match exactly.
    ///
    /// # Errors
    ///
    /// Returns `Projection` if the column lists differ.
    pub fn extend(&mut self, other: Self) -> Result<()> {
        if other.columns != self.columns {
            return Err(Error::Projection(
                "cannot merge row batches with different columns".to_string(),
            ));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Prefix every row with a constant value (e.g. the owning sprint id).
    #[must_use]
    pub fn with_leading_column(mut self, column: ColumnSpec, value: &Cell) -> Self {
        self.columns.insert(0, column);
        for row in &mut self.rows {
            row.insert(0, value.clone());
        }
        self
    }
}

/// Where one column's value comes from.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Dotted path into the source record.
    pub path: String,
    pub column: String,
    pub kind: ColumnKind,
    /// Missing required fields fail the projection instead of yielding null.
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn new(path: impl Into<String>, column: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            path: path.into(),
            column: column.into(),
            kind,
            required: false,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Ordered declarative mapping from source paths to columns.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: Vec<FieldSpec>,
}

impl FieldMap {
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// The column list this map produces, in declared order.
    #[must_use]
    pub fn columns(&self) -> Vec<ColumnSpec> {
        self.fields
            .iter()
            .map(|f| ColumnSpec::new(f.column.clone(), f.kind))
            .collect()
    }

    /// Source paths, e.g. for building a Jira `fields=` parameter.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.path.as_str())
    }
}

/// Project one record into a row.
///
/// # Errors
///
/// Returns `MalformedTemporalValue` for unparsable (or missing required)
/// timestamps and `Projection` for other missing required fields or values
/// that cannot be coerced into their column type.
pub fn project(map: &FieldMap, record: &Value) -> Result<MirrorRow> {
    map.fields
        .iter()
        .map(|field| project_field(field, record))
        .collect()
}

/// Project a batch of records; any failing record fails the batch.
///
/// # Errors
///
/// See [`project`].
pub fn project_batch(map: &FieldMap, records: &[Value]) -> Result<RowBatch> {
    let rows = records
        .iter()
        .map(|record| project(map, record))
        .collect::<Result<Vec<_>>>()?;
    Ok(RowBatch {
        columns: map.columns(),
        rows,
    })
}

/// Walk a dotted path. Missing segments and non-object parents yield `None`.
#[must_use]
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |node, segment| node.as_object()?.get(segment))
        .filter(|v| !v.is_null())
}

/// One-level unwrap of author/value objects to their identifying scalar.
fn unwrap_scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(obj) => UNWRAP_KEYS
            .iter()
            .find_map(|k| obj.get(*k).filter(|v| !v.is_null() && !v.is_object())),
        Value::Null => None,
        other => Some(other),
    }
}

fn project_field(field: &FieldSpec, record: &Value) -> Result<Cell> {
    let Some(value) = lookup(record, &field.path).and_then(unwrap_scalar) else {
        if !field.required {
            return Ok(Cell::Null);
        }
        return Err(match field.kind {
            ColumnKind::Timestamp => Error::MalformedTemporalValue {
                column: field.column.clone(),
                value: String::new(),
            },
            _ => Error::Projection(format!(
                "required field '{}' missing for column '{}'",
                field.path, field.column
            )),
        });
    };

    match field.kind {
        ColumnKind::Text => Ok(Cell::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        ColumnKind::Integer => coerce_integer(value)
            .map(Cell::Integer)
            .ok_or_else(|| mismatch(field, value, "integer")),
        ColumnKind::Real => coerce_real(value)
            .map(Cell::Real)
            .ok_or_else(|| mismatch(field, value, "number")),
        ColumnKind::Timestamp => {
            let raw = value.as_str().ok_or_else(|| Error::MalformedTemporalValue {
                column: field.column.clone(),
                value: value.to_string(),
            })?;
            temporal::parse_utc(raw)
                .map(Cell::Timestamp)
                .ok_or_else(|| Error::MalformedTemporalValue {
                    column: field.column.clone(),
                    value: raw.to_string(),
                })
        }
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_real(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn mismatch(field: &FieldSpec, value: &Value, expected: &str) -> Error {
    Error::Projection(format!(
        "column '{}' expects {expected}, got {value}",
        field.column
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue_map() -> FieldMap {
        FieldMap::new(vec![
            FieldSpec::new("key", "issue_key", ColumnKind::Text).required(),
            FieldSpec::new("fields.assignee", "assignee", ColumnKind::Text),
            FieldSpec::new("fields.customfield_10015", "estimate", ColumnKind::Real),
            FieldSpec::new("fields.created", "created", ColumnKind::Timestamp).required(),
            FieldSpec::new("fields.duedate", "due_date", ColumnKind::Timestamp),
        ])
    }

    #[test]
    fn test_project_flattens_in_declared_order() {
        let record = json!({
            "key": "PROJ-1",
            "fields": {
                "assignee": {"displayName": "Dana Lee", "accountId": "abc"},
                "customfield_10015": 3,
                "created": "2024-03-01T09:15:00.000+0000",
                "duedate": "2024-03-08"
            }
        });
        let row = project(&issue_map(), &record).unwrap();
        assert_eq!(row[0], Cell::Text("PROJ-1".into()));
        assert_eq!(row[1], Cell::Text("Dana Lee".into()));
        assert_eq!(row[2], Cell::Real(3.0));
        assert!(matches!(row[3], Cell::Timestamp(_)));
        assert!(matches!(row[4], Cell::Timestamp(_)));
    }

    #[test]
    fn test_missing_optional_fields_become_null() {
        let record = json!({
            "key": "PROJ-2",
            "fields": {"created": "2024-03-01T09:15:00.000Z", "assignee": null}
        });
        let row = project(&issue_map(), &record).unwrap();
        assert_eq!(row[1], Cell::Null);
        assert_eq!(row[2], Cell::Null);
        assert_eq!(row[4], Cell::Null);
    }

    #[test]
    fn test_unparsable_timestamp_fails() {
        let record = json!({"key": "PROJ-3", "fields": {"created": "last tuesday"}});
        let err = project(&issue_map(), &record).unwrap_err();
        assert!(matches!(err, Error::MalformedTemporalValue { ref column, .. } if column == "created"));
    }

    #[test]
    fn test_missing_required_temporal_fails() {
        let record = json!({"key": "PROJ-4", "fields": {}});
        let err = project(&issue_map(), &record).unwrap_err();
        assert!(matches!(err, Error::MalformedTemporalValue { .. }));
    }

    #[test]
    fn test_missing_required_text_is_projection_error() {
        let record = json!({"fields": {"created": "2024-03-01"}});
        assert!(matches!(
            project(&issue_map(), &record),
            Err(Error::Projection(_))
        ));
    }

    #[test]
    fn test_unwrap_prefers_display_name_then_value() {
        assert_eq!(
            unwrap_scalar(&json!({"value": "Grow revenue", "id": "1"})),
            Some(&json!("Grow revenue"))
        );
        assert_eq!(unwrap_scalar(&json!({"id": "1"})), None);
    }

    #[test]
    fn test_unwrap_skips_null_identifiers() {
        assert_eq!(
            unwrap_scalar(&json!({"displayName": null, "name": "Bob"})),
            Some(&json!("Bob"))
        );
    }

    #[test]
    fn test_lookup_through_non_object_is_none() {
        let record = json!({"fields": {"status": "Done"}});
        assert!(lookup(&record, "fields.status.name").is_none());
    }

    #[test]
    fn test_batch_keeps_columns_for_empty_input() {
        let batch = project_batch(&issue_map(), &[]).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.columns.len(), 5);
    }
}
