// borevault-core/src/application/ingestion.rs
//
// Bulk CSV entry point. Rows are validated field-by-field against the table
// schema; valid and invalid rows are separated without aborting the batch,
// valid rows are coerced to the schema's logical types and stored as a new
// version (create when the record is absent, update when present). The
// caller always gets the full error breakdown, partial failure included.
//
// Zero valid rows means zero storage mutations.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::{info, instrument};

use crate::domain::registry;
use crate::domain::schema::{Field, LogicalType, TableSchema};
use crate::domain::value::{Row, Value};
use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::csv_rows::csv_records;

use super::versioned::VersionedStore;

const REQUIRED_FIELD_ERROR: &str = "Required field is missing or null";

// =============================================================================
//  1. RESULT SHAPES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based row number (excluding the header), for user display.
    pub row: usize,
    pub field: String,
    pub value: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldErrorEntry {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldErrorSummary {
    pub count: usize,
    pub errors: Vec<FieldErrorEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub success: bool,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub record_id: String,
    pub version: Option<u32>,
    pub file_path: Option<String>,
    pub errors: Vec<RowError>,
    pub error_summary: BTreeMap<String, FieldErrorSummary>,
}

impl IngestionResult {
    fn empty(record_id: &str) -> Self {
        Self {
            success: true,
            total_rows: 0,
            valid_rows: 0,
            invalid_rows: 0,
            record_id: record_id.to_string(),
            version: None,
            file_path: None,
            errors: Vec::new(),
            error_summary: BTreeMap::new(),
        }
    }

    fn summarize(errors: &[RowError]) -> BTreeMap<String, FieldErrorSummary> {
        let mut summary: BTreeMap<String, FieldErrorSummary> = BTreeMap::new();
        for error in errors {
            let entry = summary.entry(error.field.clone()).or_default();
            entry.count += 1;
            entry.errors.push(FieldErrorEntry {
                row: error.row,
                error: error.error.clone(),
            });
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct IngestRequest<'a> {
    pub table_name: &'a str,
    pub project_id: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub user_id: &'a str,
    pub comment: Option<&'a str>,
    pub skip_errors: bool,
}

impl IngestRequest<'_> {
    pub fn record_id(&self) -> String {
        format!("{}/{}/{}", self.project_id, self.entity_type, self.entity_id)
    }
}

// =============================================================================
//  2. ENGINE
// =============================================================================

pub struct CsvIngestion<'a> {
    store: &'a VersionedStore,
}

impl<'a> CsvIngestion<'a> {
    pub fn new(store: &'a VersionedStore) -> Self {
        Self { store }
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        request: &IngestRequest<'_>,
    ) -> Result<IngestionResult, VaultError> {
        let file = std::fs::File::open(path)?;
        let (_, records) = csv_records(file)?;
        self.ingest_records(records, request).await
    }

    pub async fn ingest_str(
        &self,
        content: &str,
        request: &IngestRequest<'_>,
    ) -> Result<IngestionResult, VaultError> {
        let (_, records) = csv_records(content.as_bytes())?;
        self.ingest_records(records, request).await
    }

    #[instrument(skip(self, records), fields(rows = records.len()))]
    async fn ingest_records(
        &self,
        records: Vec<Vec<(String, String)>>,
        request: &IngestRequest<'_>,
    ) -> Result<IngestionResult, VaultError> {
        let record_id = request.record_id();
        let schema = registry::lookup(request.table_name)
            .ok_or_else(|| DomainError::UnknownTable(request.table_name.to_string()))?;

        let total_rows = records.len();
        if total_rows == 0 {
            return Ok(IngestionResult::empty(&record_id));
        }

        let (valid_rows, invalid_count, errors) =
            validate_and_separate(&records, schema, request.skip_errors);
        info!(
            record_id,
            valid = valid_rows.len(),
            invalid = invalid_count,
            "csv validation complete"
        );

        if valid_rows.is_empty() {
            return Ok(IngestionResult {
                success: false,
                total_rows,
                valid_rows: 0,
                invalid_rows: invalid_count,
                record_id,
                version: None,
                file_path: None,
                error_summary: IngestionResult::summarize(&errors),
                errors,
            });
        }

        let default_comment = format!(
            "Bulk CSV upload: {} rows, {} errors",
            valid_rows.len(),
            invalid_count
        );
        let comment = request.comment.unwrap_or(&default_comment);

        let metadata = if self.store.get_metadata(&record_id).await?.is_some() {
            self.store
                .update_record(&record_id, &valid_rows, request.user_id, Some(comment))
                .await?
        } else {
            self.store
                .create_record(
                    &record_id,
                    &valid_rows,
                    request.table_name,
                    request.user_id,
                    Some(comment),
                )
                .await?
        };

        let version = metadata.current_version;
        Ok(IngestionResult {
            success: invalid_count == 0,
            total_rows,
            valid_rows: valid_rows.len(),
            invalid_rows: invalid_count,
            file_path: Some(self.store.version_key(&record_id, version)),
            record_id,
            version: Some(version),
            error_summary: IngestionResult::summarize(&errors),
            errors,
        })
    }
}

// =============================================================================
//  3. VALIDATION
// =============================================================================

fn cell<'r>(record: &'r [(String, String)], field: &str) -> Option<&'r str> {
    record
        .iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn validate_and_separate(
    records: &[Vec<(String, String)>],
    schema: &TableSchema,
    skip_errors: bool,
) -> (Vec<Row>, usize, Vec<RowError>) {
    let mut valid_rows = Vec::new();
    let mut invalid_count = 0;
    let mut errors = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let mut row_errors = Vec::new();

        for field in &schema.fields {
            let value = cell(record, &field.name);

            if value.is_none() {
                if !field.nullable {
                    row_errors.push(RowError {
                        row: index + 1,
                        field: field.name.clone(),
                        value: None,
                        error: REQUIRED_FIELD_ERROR.to_string(),
                    });
                }
                continue;
            }

            if let Some(message) = validate_cell(&field.logical_type, value.unwrap_or("")) {
                row_errors.push(RowError {
                    row: index + 1,
                    field: field.name.clone(),
                    value: value.map(str::to_string),
                    error: message,
                });
            }
        }

        if row_errors.is_empty() {
            valid_rows.push(coerce_row(record, schema));
        } else {
            invalid_count += 1;
            errors.extend(row_errors);
            if !skip_errors {
                break;
            }
        }
    }

    (valid_rows, invalid_count, errors)
}

fn validate_cell(logical_type: &LogicalType, raw: &str) -> Option<String> {
    match logical_type {
        LogicalType::String => None,
        LogicalType::Int32 | LogicalType::Int64 => {
            if parse_integer(raw).is_some() {
                None
            } else {
                Some(format!("Expected integer, got: {raw}"))
            }
        }
        LogicalType::Float64 => {
            if raw.parse::<f64>().is_ok() {
                None
            } else {
                Some(format!("Expected float, got: {raw}"))
            }
        }
        LogicalType::Boolean => {
            if parse_boolean(raw).is_some() {
                None
            } else {
                Some(format!("Expected boolean, got: {raw}"))
            }
        }
        LogicalType::TimestampMs => {
            if parse_timestamp(raw).is_some() {
                None
            } else {
                Some(format!("Expected timestamp, got: {raw}"))
            }
        }
        LogicalType::List(_) => match serde_json::from_str::<Json>(raw) {
            Ok(Json::Array(_)) => None,
            _ => Some(format!("Expected list, got: {raw}")),
        },
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(i);
    }
    // Spreadsheet exports render integer cells as "4.0".
    let f = raw.parse::<f64>().ok()?;
    if f.fract() == 0.0 && f.is_finite() {
        Some(f as i64)
    } else {
        None
    }
}

/// Accepted tokens: true/false/1/0/yes/no, case-insensitive.
fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

// =============================================================================
//  4. COERCION
// =============================================================================

/// Coerce a validated record to the schema's logical types. Unparseable
/// cells land as explicit nulls — only nullable fields reach this point
/// with bad cells, the required check ran in validation.
fn coerce_row(record: &[(String, String)], schema: &TableSchema) -> Row {
    schema
        .fields
        .iter()
        .map(|field| (field.name.clone(), coerce_cell(record, field)))
        .collect()
}

fn coerce_cell(record: &[(String, String)], field: &Field) -> Value {
    let Some(raw) = cell(record, &field.name) else {
        return Value::Null;
    };

    match &field.logical_type {
        LogicalType::Int32 | LogicalType::Int64 => {
            parse_integer(raw).map(Value::Int).unwrap_or(Value::Null)
        }
        LogicalType::Float64 => raw
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        LogicalType::Boolean => parse_boolean(raw).map(Value::Bool).unwrap_or(Value::Null),
        LogicalType::TimestampMs => parse_timestamp(raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        LogicalType::List(_) => match serde_json::from_str::<Json>(raw) {
            Ok(Json::Array(items)) => Value::List(items.iter().map(Value::from_json).collect()),
            // A bare scalar becomes a one-element list.
            _ => Value::List(vec![Value::Str(raw.to_string())]),
        },
        LogicalType::String => Value::Str(raw.to_string()),
    }
}

// =============================================================================
//  5. TESTS
// =============================================================================
