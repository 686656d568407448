// borevault-core/src/infrastructure/columnar.rs
//
// Parquet storage engine over the object-store port. Implements immutable
// writes (overwrite-guarded), schema-validated batches, unique path
// generation for ad-hoc writes, partitioned dataset writes, and reads with
// optional equality filters.
//
// All files are written with Snappy compression and dictionary encoding;
// the choice is fixed so that independent writers interoperate.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float32Array, Float64Array, Float64Builder,
    Int32Array, Int32Builder, Int64Array, Int64Builder, LargeStringArray, ListArray, ListBuilder,
    RecordBatch, StringArray, StringBuilder, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampMillisecondBuilder, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::domain::schema::{types_compatible, Field, LogicalType, TableSchema};
use crate::domain::value::{row_get, Row, Value};
use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::error::{InfrastructureError, ObjectStoreError};
use crate::ports::object_store::CONTENT_TYPE_PARQUET;
use crate::ports::ObjectStore;

/// Equality predicate for reads. Filtering happens after decode; the read
/// contract only promises "optionally predicate-pushed-down".
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: Value) -> Self {
        Self {
            column: column.to_string(),
            value,
        }
    }
}

pub struct ColumnarEngine {
    store: Arc<dyn ObjectStore>,
    base_path: String,
}

impl ColumnarEngine {
    pub fn new(store: Arc<dyn ObjectStore>, base_path: &str) -> Self {
        Self {
            store,
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Full object-store key for an engine-relative path.
    pub fn full_key(&self, relative: &str) -> String {
        if self.base_path.is_empty() {
            relative.trim_start_matches('/').to_string()
        } else {
            format!("{}/{}", self.base_path, relative.trim_start_matches('/'))
        }
    }

    // =========================================================================
    //  WRITE PATH
    // =========================================================================

    /// Write rows as a single Parquet file under a generated unique name
    /// (`{path stem}_{YYYYMMDD_HHMMSS}_{token}.parquet`), or as a partitioned
    /// dataset when `partition_columns` is given. Returns the written key
    /// (dataset root for partitioned writes).
    pub async fn write(
        &self,
        path: &str,
        rows: &[Row],
        expected_schema: Option<&TableSchema>,
        partition_columns: Option<&[String]>,
        allow_overwrite: bool,
    ) -> Result<String, VaultError> {
        let schema = self.resolve_schema(rows, expected_schema)?;

        match partition_columns {
            Some(columns) if !columns.is_empty() => {
                self.write_partitioned(path, rows, &schema, columns, allow_overwrite)
                    .await
            }
            _ => {
                let key = self.full_key(&unique_file_path(path));
                self.put_batch(&key, rows, &schema, allow_overwrite).await?;
                Ok(key)
            }
        }
    }

    /// Write rows at the exact relative path, no unique suffix. Versioned
    /// repositories use this for their fixed `v{N}.parquet` names and rely
    /// on the overwrite guard for correctness.
    pub async fn write_exact(
        &self,
        relative_path: &str,
        rows: &[Row],
        expected_schema: Option<&TableSchema>,
        allow_overwrite: bool,
    ) -> Result<String, VaultError> {
        let schema = self.resolve_schema(rows, expected_schema)?;
        let key = self.full_key(relative_path);
        self.put_batch(&key, rows, &schema, allow_overwrite).await?;
        Ok(key)
    }

    fn resolve_schema(
        &self,
        rows: &[Row],
        expected_schema: Option<&TableSchema>,
    ) -> Result<TableSchema, VaultError> {
        if rows.is_empty() {
            return Err(DomainError::schema_validation(vec![
                "cannot write an empty row set".to_string(),
            ])
            .into());
        }
        let Some(expected) = expected_schema else {
            return Ok(infer_schema(rows));
        };

        // The schema the rows realize against the declared target: columns
        // with no observed value carry no type of their own and adopt the
        // declared one; columns with every value present realize whatever
        // nullability the target declares. Observed nulls force nullable, so
        // a null in a non-nullable column still fails validation below.
        let observed = observe_columns(rows);
        let mut actual_fields = Vec::with_capacity(observed.len());
        for (position, column) in observed.into_iter().enumerate() {
            let declared = expected
                .fields
                .get(position)
                .filter(|f| f.name == column.name);
            let logical_type = column
                .logical_type
                .or_else(|| declared.map(|f| f.logical_type.clone()))
                .unwrap_or(LogicalType::String);
            let nullable = if column.saw_null {
                true
            } else {
                declared.map(|f| f.nullable).unwrap_or(false)
            };
            actual_fields.push(Field::new(&column.name, logical_type, nullable));
        }
        let actual = TableSchema::new("inferred", actual_fields);

        validate_schema(expected, &actual)?;
        Ok(expected.clone())
    }

    async fn put_batch(
        &self,
        key: &str,
        rows: &[Row],
        schema: &TableSchema,
        allow_overwrite: bool,
    ) -> Result<(), VaultError> {
        let batch = rows_to_batch(schema, rows)?;
        let data = encode_batch(&batch)?;
        self.store
            .put(key, data, CONTENT_TYPE_PARQUET, allow_overwrite)
            .await
            .map_err(InfrastructureError::from)?;
        debug!(key, rows = rows.len(), "wrote parquet object");
        Ok(())
    }

    async fn write_partitioned(
        &self,
        path: &str,
        rows: &[Row],
        schema: &TableSchema,
        partition_columns: &[String],
        allow_overwrite: bool,
    ) -> Result<String, VaultError> {
        for column in partition_columns {
            if schema.field(column).is_none() {
                return Err(DomainError::schema_validation(vec![format!(
                    "partition column '{column}' is not part of the schema"
                )])
                .into());
            }
        }

        // Files in a partitioned dataset hold the non-partition columns only.
        let file_schema = TableSchema::new(
            &schema.name,
            schema
                .fields
                .iter()
                .filter(|f| !partition_columns.contains(&f.name))
                .cloned()
                .collect(),
        );

        let mut groups: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for row in rows {
            let partition_path = partition_columns
                .iter()
                .map(|column| {
                    let value = row_get(row, column).unwrap_or(&Value::Null);
                    format!("{column}={}", partition_value_str(value))
                })
                .collect::<Vec<_>>()
                .join("/");
            let trimmed: Row = row
                .iter()
                .filter(|(name, _)| !partition_columns.contains(name))
                .cloned()
                .collect();
            groups.entry(partition_path).or_default().push(trimmed);
        }

        let root = self.full_key(path.trim_end_matches('/'));
        for (partition_path, group) in groups {
            let key = format!(
                "{root}/{partition_path}/part_{}.parquet",
                unique_suffix()
            );
            self.put_batch(&key, &group, &file_schema, allow_overwrite)
                .await?;
        }
        Ok(root)
    }

    // =========================================================================
    //  READ PATH
    // =========================================================================

    /// Read a Parquet file back into rows, optionally filtered. A missing
    /// key surfaces as the store's distinguished NotFound.
    pub async fn read(
        &self,
        relative_path: &str,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<Row>, VaultError> {
        let key = self.full_key(relative_path);
        self.read_key(&key, filters).await
    }

    /// Read by absolute object-store key (legacy layouts address the bucket
    /// directly, without the engine prefix).
    pub async fn read_key(
        &self,
        key: &str,
        filters: Option<&[Filter]>,
    ) -> Result<Vec<Row>, VaultError> {
        let data = self
            .store
            .get(key)
            .await
            .map_err(InfrastructureError::from)?;
        let mut rows = decode_rows(data)?;

        if let Some(filters) = filters {
            rows.retain(|row| {
                filters
                    .iter()
                    .all(|f| row_get(row, &f.column) == Some(&f.value))
            });
        }
        Ok(rows)
    }
}

// =============================================================================
//  SCHEMA VALIDATION
// =============================================================================

/// Compare an expected table schema against the schema realized by a row
/// set. Collects every offending field before failing.
pub fn validate_schema(expected: &TableSchema, actual: &TableSchema) -> Result<(), DomainError> {
    if expected.fields.len() != actual.fields.len() {
        return Err(DomainError::schema_validation(vec![format!(
            "field count mismatch: expected {} fields, got {}",
            expected.fields.len(),
            actual.fields.len()
        )]));
    }

    let mut violations = Vec::new();
    for (expected_field, actual_field) in expected.fields.iter().zip(actual.fields.iter()) {
        if expected_field.name != actual_field.name {
            violations.push(format!(
                "field name mismatch: expected '{}', got '{}'",
                expected_field.name, actual_field.name
            ));
        }
        if !types_compatible(&expected_field.logical_type, &actual_field.logical_type) {
            violations.push(format!(
                "field '{}' type mismatch: expected {:?}, got {:?}",
                expected_field.name, expected_field.logical_type, actual_field.logical_type
            ));
        }
        if expected_field.nullable != actual_field.nullable {
            violations.push(format!(
                "field '{}' nullability mismatch: expected nullable={}, got nullable={}",
                expected_field.name, expected_field.nullable, actual_field.nullable
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::schema_validation(violations))
    }
}

struct ObservedColumn {
    name: String,
    logical_type: Option<LogicalType>,
    saw_null: bool,
}

/// Per-column observations over a row set: the first non-null value decides
/// the type, and any observed null marks the column nullable.
fn observe_columns(rows: &[Row]) -> Vec<ObservedColumn> {
    let mut columns = Vec::new();
    if let Some(first) = rows.first() {
        for (name, _) in first {
            let mut logical: Option<LogicalType> = None;
            let mut saw_null = false;
            for row in rows {
                match row_get(row, name) {
                    Some(Value::Null) | None => saw_null = true,
                    Some(value) => {
                        if logical.is_none() {
                            logical = value_logical_type(value);
                        }
                    }
                }
            }
            columns.push(ObservedColumn {
                name: name.clone(),
                logical_type: logical,
                saw_null,
            });
        }
    }
    columns
}

/// Infer a table schema from a row set alone: a column that never carries a
/// value decays to nullable string.
pub fn infer_schema(rows: &[Row]) -> TableSchema {
    let fields = observe_columns(rows)
        .into_iter()
        .map(|column| {
            Field::new(
                &column.name,
                column.logical_type.unwrap_or(LogicalType::String),
                column.saw_null,
            )
        })
        .collect();
    TableSchema::new("inferred", fields)
}

fn value_logical_type(value: &Value) -> Option<LogicalType> {
    match value {
        Value::Null => None,
        Value::Str(_) => Some(LogicalType::String),
        Value::Int(_) => Some(LogicalType::Int64),
        Value::Float(_) => Some(LogicalType::Float64),
        Value::Bool(_) => Some(LogicalType::Boolean),
        Value::Timestamp(_) => Some(LogicalType::TimestampMs),
        Value::List(items) => {
            let inner = items
                .iter()
                .find_map(value_logical_type)
                .unwrap_or(LogicalType::Float64);
            Some(LogicalType::List(Box::new(inner)))
        }
    }
}

// =============================================================================
//  ROWS <-> BATCH
// =============================================================================

enum ColumnBuilder {
    Str(StringBuilder),
    I32(Int32Builder),
    I64(Int64Builder),
    F64(Float64Builder),
    Bool(BooleanBuilder),
    Ts(TimestampMillisecondBuilder),
    ListStr(ListBuilder<StringBuilder>),
    ListI64(ListBuilder<Int64Builder>),
    ListF64(ListBuilder<Float64Builder>),
}

impl ColumnBuilder {
    fn for_type(logical: &LogicalType) -> Result<Self, DomainError> {
        Ok(match logical {
            LogicalType::String => ColumnBuilder::Str(StringBuilder::new()),
            LogicalType::Int32 => ColumnBuilder::I32(Int32Builder::new()),
            LogicalType::Int64 => ColumnBuilder::I64(Int64Builder::new()),
            LogicalType::Float64 => ColumnBuilder::F64(Float64Builder::new()),
            LogicalType::Boolean => ColumnBuilder::Bool(BooleanBuilder::new()),
            LogicalType::TimestampMs => ColumnBuilder::Ts(TimestampMillisecondBuilder::new()),
            LogicalType::List(inner) => match inner.as_ref() {
                LogicalType::String => ColumnBuilder::ListStr(ListBuilder::new(StringBuilder::new())),
                LogicalType::Int32 | LogicalType::Int64 => {
                    ColumnBuilder::ListI64(ListBuilder::new(Int64Builder::new()))
                }
                LogicalType::Float64 => {
                    ColumnBuilder::ListF64(ListBuilder::new(Float64Builder::new()))
                }
                other => {
                    return Err(DomainError::schema_validation(vec![format!(
                        "unsupported list element type {other:?}"
                    )]))
                }
            },
        })
    }

    fn append(&mut self, field: &str, value: &Value) -> Result<(), String> {
        match (self, value) {
            (ColumnBuilder::Str(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Str(b), Value::Str(s)) => b.append_value(s),
            (ColumnBuilder::I32(b), Value::Null) => b.append_null(),
            (ColumnBuilder::I32(b), Value::Int(i)) => {
                let narrowed = i32::try_from(*i)
                    .map_err(|_| format!("field '{field}': {i} overflows int32"))?;
                b.append_value(narrowed);
            }
            (ColumnBuilder::I64(b), Value::Null) => b.append_null(),
            (ColumnBuilder::I64(b), Value::Int(i)) => b.append_value(*i),
            (ColumnBuilder::F64(b), Value::Null) => b.append_null(),
            (ColumnBuilder::F64(b), Value::Float(f)) => b.append_value(*f),
            (ColumnBuilder::F64(b), Value::Int(i)) => b.append_value(*i as f64),
            (ColumnBuilder::Bool(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Bool(b), Value::Bool(v)) => b.append_value(*v),
            (ColumnBuilder::Ts(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Ts(b), Value::Timestamp(ts)) => {
                b.append_value(ts.timestamp_millis())
            }
            (ColumnBuilder::ListStr(b), Value::Null) => b.append_null(),
            (ColumnBuilder::ListStr(b), Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Null => b.values().append_null(),
                        Value::Str(s) => b.values().append_value(s),
                        other => {
                            return Err(format!(
                                "field '{field}': expected string list element, got {other:?}"
                            ))
                        }
                    }
                }
                b.append(true);
            }
            (ColumnBuilder::ListI64(b), Value::Null) => b.append_null(),
            (ColumnBuilder::ListI64(b), Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Null => b.values().append_null(),
                        Value::Int(i) => b.values().append_value(*i),
                        other => {
                            return Err(format!(
                                "field '{field}': expected integer list element, got {other:?}"
                            ))
                        }
                    }
                }
                b.append(true);
            }
            (ColumnBuilder::ListF64(b), Value::Null) => b.append_null(),
            (ColumnBuilder::ListF64(b), Value::List(items)) => {
                for item in items {
                    match item {
                        Value::Null => b.values().append_null(),
                        Value::Float(f) => b.values().append_value(*f),
                        Value::Int(i) => b.values().append_value(*i as f64),
                        other => {
                            return Err(format!(
                                "field '{field}': expected float list element, got {other:?}"
                            ))
                        }
                    }
                }
                b.append(true);
            }
            (_, other) => {
                return Err(format!(
                    "field '{field}': value {other:?} does not match the column type"
                ))
            }
        }
        Ok(())
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Str(mut b) => Arc::new(b.finish()),
            ColumnBuilder::I32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::I64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::F64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Bool(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Ts(mut b) => Arc::new(b.finish()),
            ColumnBuilder::ListStr(mut b) => Arc::new(b.finish()),
            ColumnBuilder::ListI64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::ListF64(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Project rows (already in schema order) into an Arrow batch. Cell-level
/// type mismatches are collected per field into one validation error.
pub fn rows_to_batch(schema: &TableSchema, rows: &[Row]) -> Result<RecordBatch, VaultError> {
    let mut builders: Vec<ColumnBuilder> = schema
        .fields
        .iter()
        .map(|f| ColumnBuilder::for_type(&f.logical_type))
        .collect::<Result<_, _>>()?;

    let mut violations = Vec::new();
    for row in rows {
        for (field, builder) in schema.fields.iter().zip(builders.iter_mut()) {
            let value = row_get(row, &field.name).unwrap_or(&Value::Null);
            if let Err(violation) = builder.append(&field.name, value) {
                violations.push(violation);
            }
        }
    }
    if !violations.is_empty() {
        violations.dedup();
        return Err(DomainError::schema_validation(violations).into());
    }

    let arrays: Vec<ArrayRef> = builders.into_iter().map(ColumnBuilder::finish).collect();
    let batch = RecordBatch::try_new(schema.to_arrow(), arrays)
        .map_err(InfrastructureError::from)?;
    Ok(batch)
}

/// Decode one batch column cell into a Value.
fn scalar_at(array: &dyn Array, index: usize) -> Result<Value, InfrastructureError> {
    if array.is_null(index) {
        return Ok(Value::Null);
    }

    let unsupported = |dt: &DataType| {
        InfrastructureError::Arrow(arrow::error::ArrowError::NotYetImplemented(format!(
            "unsupported column type {dt:?}"
        )))
    };

    let value = match array.data_type() {
        DataType::Utf8 => {
            let a = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Str(a.value(index).to_string())
        }
        DataType::LargeUtf8 => {
            let a = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Str(a.value(index).to_string())
        }
        DataType::Int32 => {
            let a = array
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Int(i64::from(a.value(index)))
        }
        DataType::Int64 => {
            let a = array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Int(a.value(index))
        }
        DataType::Float32 => {
            let a = array
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Float(f64::from(a.value(index)))
        }
        DataType::Float64 => {
            let a = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Float(a.value(index))
        }
        DataType::Boolean => {
            let a = array
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Bool(a.value(index))
        }
        DataType::Timestamp(unit, _) => {
            let millis = match unit {
                TimeUnit::Second => {
                    let a = array
                        .as_any()
                        .downcast_ref::<TimestampSecondArray>()
                        .ok_or_else(|| unsupported(array.data_type()))?;
                    a.value(index) * 1_000
                }
                TimeUnit::Millisecond => {
                    let a = array
                        .as_any()
                        .downcast_ref::<TimestampMillisecondArray>()
                        .ok_or_else(|| unsupported(array.data_type()))?;
                    a.value(index)
                }
                TimeUnit::Microsecond => {
                    let a = array
                        .as_any()
                        .downcast_ref::<TimestampMicrosecondArray>()
                        .ok_or_else(|| unsupported(array.data_type()))?;
                    a.value(index) / 1_000
                }
                TimeUnit::Nanosecond => {
                    let a = array
                        .as_any()
                        .downcast_ref::<arrow::array::TimestampNanosecondArray>()
                        .ok_or_else(|| unsupported(array.data_type()))?;
                    a.value(index) / 1_000_000
                }
            };
            let ts = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| unsupported(array.data_type()))?;
            Value::Timestamp(ts)
        }
        DataType::List(_) => {
            let a = array
                .as_any()
                .downcast_ref::<ListArray>()
                .ok_or_else(|| unsupported(array.data_type()))?;
            let items = a.value(index);
            let mut list = Vec::with_capacity(items.len());
            for i in 0..items.len() {
                list.push(scalar_at(items.as_ref(), i)?);
            }
            Value::List(list)
        }
        other => return Err(unsupported(other)),
    };
    Ok(value)
}

pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<Row>, InfrastructureError> {
    let schema = batch.schema();
    let mut rows = Vec::with_capacity(batch.num_rows());
    for row_idx in 0..batch.num_rows() {
        let mut row: Row = Vec::with_capacity(batch.num_columns());
        for (col_idx, field) in schema.fields().iter().enumerate() {
            let value = scalar_at(batch.column(col_idx).as_ref(), row_idx)?;
            row.push((field.name().clone(), value));
        }
        rows.push(row);
    }
    Ok(rows)
}

// =============================================================================
//  ENCODE / DECODE
// =============================================================================

fn encode_batch(batch: &RecordBatch) -> Result<Bytes, InfrastructureError> {
    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_dictionary_enabled(true)
        .build();

    let mut data: Vec<u8> = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut data, batch.schema(), Some(properties))?;
    writer.write(batch)?;
    // The footer only lands on close.
    writer.close()?;
    Ok(Bytes::from(data))
}

fn decode_rows(data: Bytes) -> Result<Vec<Row>, InfrastructureError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        rows.extend(batch_to_rows(&batch)?);
    }
    Ok(rows)
}

// =============================================================================
//  PATH GENERATION
// =============================================================================

fn unique_suffix() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let token: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
    format!("{timestamp}_{token}")
}

/// `uploads/data.parquet` -> `uploads/data_{ts}_{token}.parquet`
fn unique_file_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    let (parent, file) = match trimmed.rsplit_once('/') {
        Some((parent, file)) => (Some(parent), file),
        None => (None, trimmed),
    };
    let stem = file.strip_suffix(".parquet").unwrap_or(file);
    let stem = if stem.is_empty() { "data" } else { stem };
    let name = format!("{stem}_{}.parquet", unique_suffix());
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}/{name}"),
        _ => name,
    }
}

fn partition_value_str(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Timestamp(ts) => crate::domain::value::format_timestamp(ts),
        Value::List(_) => "list".to_string(),
    }
}

// =============================================================================
//  TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::object_store::MemoryStore;

    fn sample_schema() -> TableSchema {
        TableSchema::new(
            "samples",
            vec![
                Field::new("id", LogicalType::String, false),
                Field::new("depth", LogicalType::Float64, true),
                Field::new("blows", LogicalType::Int64, true),
                Field::new("approved", LogicalType::Boolean, true),
                Field::new("measured_at", LogicalType::TimestampMs, true),
                Field::new(
                    "penetration",
                    LogicalType::List(Box::new(LogicalType::Float64)),
                    true,
                ),
            ],
        )
    }

    fn sample_rows() -> Vec<Row> {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        vec![
            vec![
                ("id".into(), Value::Str("s1".into())),
                ("depth".into(), Value::Float(2.5)),
                ("blows".into(), Value::Int(12)),
                ("approved".into(), Value::Bool(true)),
                ("measured_at".into(), Value::Timestamp(ts)),
                (
                    "penetration".into(),
                    Value::List(vec![Value::Float(6.0), Value::Float(9.0), Value::Null]),
                ),
            ],
            vec![
                ("id".into(), Value::Str("s2".into())),
                ("depth".into(), Value::Null),
                ("blows".into(), Value::Int(0)),
                ("approved".into(), Value::Null),
                ("measured_at".into(), Value::Null),
                ("penetration".into(), Value::Null),
            ],
        ]
    }

    fn engine() -> (Arc<MemoryStore>, ColumnarEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = ColumnarEngine::new(store.clone(), "parquet-data");
        (store, engine)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_values_and_nulls() {
        let (_store, engine) = engine();
        let schema = sample_schema();
        let rows = sample_rows();

        let key = engine
            .write_exact("records/r1/versions/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap();
        assert_eq!(key, "parquet-data/records/r1/versions/v1.parquet");

        let back = engine
            .read("records/r1/versions/v1.parquet", None)
            .await
            .unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(row_get(&back[0], "id"), Some(&Value::Str("s1".into())));
        assert_eq!(row_get(&back[0], "depth"), Some(&Value::Float(2.5)));
        assert_eq!(row_get(&back[1], "blows"), Some(&Value::Int(0)));
        assert_eq!(row_get(&back[1], "depth"), Some(&Value::Null));
        assert_eq!(
            row_get(&back[0], "penetration"),
            Some(&Value::List(vec![
                Value::Float(6.0),
                Value::Float(9.0),
                Value::Null
            ]))
        );
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(row_get(&back[0], "measured_at"), Some(&Value::Timestamp(ts)));
    }

    #[tokio::test]
    async fn test_empty_row_set_rejected() {
        let (_store, engine) = engine();
        let err = engine
            .write("uploads/data.parquet", &[], Some(&sample_schema()), None, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::SchemaValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_schema_mismatch_lists_every_offending_field() {
        let schema = TableSchema::new(
            "t",
            vec![
                Field::new("a", LogicalType::Int64, false),
                Field::new("b", LogicalType::String, false),
            ],
        );
        let actual = TableSchema::new(
            "t",
            vec![
                Field::new("a", LogicalType::String, false),
                Field::new("wrong", LogicalType::String, true),
            ],
        );
        let err = validate_schema(&schema, &actual).unwrap_err();
        match err {
            DomainError::SchemaValidation { violations } => {
                assert_eq!(violations.len(), 3, "{violations:?}");
            }
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_int_widening_is_compatible() {
        // Int32 expected, Int64 cells: family compatibility admits the write.
        let schema = TableSchema::new("t", vec![Field::new("n", LogicalType::Int32, true)]);
        let rows: Vec<Row> = vec![vec![("n".into(), Value::Int(41))]];
        let (_store, engine) = engine();
        engine
            .write_exact("t/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap();
        let back = engine.read("t/v1.parquet", None).await.unwrap();
        assert_eq!(row_get(&back[0], "n"), Some(&Value::Int(41)));
    }

    #[tokio::test]
    async fn test_write_exact_respects_overwrite_guard() {
        let (_store, engine) = engine();
        let schema = sample_schema();
        let rows = sample_rows();
        engine
            .write_exact("r/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap();
        let err = engine
            .write_exact("r/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Infrastructure(InfrastructureError::ObjectStore(
                ObjectStoreError::OverwriteForbidden(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_unique_path_suffix() {
        let (store, engine) = engine();
        let rows = sample_rows();
        let key = engine
            .write("uploads/data.parquet", &rows, None, None, false)
            .await
            .unwrap();
        assert!(key.starts_with("parquet-data/uploads/data_"));
        assert!(key.ends_with(".parquet"));
        assert_eq!(store.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_partitioned_write_layout() {
        let (store, engine) = engine();
        let schema = TableSchema::new(
            "t",
            vec![
                Field::new("project", LogicalType::String, false),
                Field::new("depth", LogicalType::Float64, true),
            ],
        );
        let rows: Vec<Row> = vec![
            vec![
                ("project".into(), Value::Str("p1".into())),
                ("depth".into(), Value::Float(1.0)),
            ],
            vec![
                ("project".into(), Value::Str("p2".into())),
                ("depth".into(), Value::Float(2.0)),
            ],
            vec![
                ("project".into(), Value::Str("p1".into())),
                ("depth".into(), Value::Float(3.0)),
            ],
        ];

        let root = engine
            .write(
                "datasets/depths",
                &rows,
                Some(&schema),
                Some(&["project".to_string()]),
                false,
            )
            .await
            .unwrap();
        assert_eq!(root, "parquet-data/datasets/depths");

        let keys = store.keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().any(|k| k.contains("project=p1/part_")));
        assert!(keys.iter().any(|k| k.contains("project=p2/part_")));

        // Partition files hold only the non-partition columns.
        let p1_key = keys.iter().find(|k| k.contains("project=p1")).unwrap();
        let rows = engine.read_key(p1_key, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(row_get(&rows[0], "project").is_none());
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let (_store, engine) = engine();
        let err = engine.read("nope/v1.parquet", None).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Infrastructure(InfrastructureError::ObjectStore(
                ObjectStoreError::NotFound(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_read_with_equality_filter() {
        let (_store, engine) = engine();
        let rows = sample_rows();
        engine
            .write_exact("f/v1.parquet", &rows, Some(&sample_schema()), false)
            .await
            .unwrap();

        let filtered = engine
            .read(
                "f/v1.parquet",
                Some(&[Filter::eq("id", Value::Str("s2".into()))]),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(row_get(&filtered[0], "blows"), Some(&Value::Int(0)));
    }

    #[tokio::test]
    async fn test_rows_realize_declared_type_and_nullability() {
        // "id" is present in every row but the schema declares it nullable;
        // "measured_at" is null in every row but declares a timestamp. Both
        // must validate against the registry-style schema.
        let schema = TableSchema::new(
            "t",
            vec![
                Field::new("id", LogicalType::String, true),
                Field::new("measured_at", LogicalType::TimestampMs, true),
            ],
        );
        let rows: Vec<Row> = vec![
            vec![
                ("id".into(), Value::Str("a".into())),
                ("measured_at".into(), Value::Null),
            ],
            vec![
                ("id".into(), Value::Str("b".into())),
                ("measured_at".into(), Value::Null),
            ],
        ];
        let (_store, engine) = engine();
        engine
            .write_exact("realize/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap();
        let back = engine.read("realize/v1.parquet", None).await.unwrap();
        assert_eq!(row_get(&back[1], "id"), Some(&Value::Str("b".into())));
        assert_eq!(row_get(&back[0], "measured_at"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_null_in_non_nullable_column_fails_validation() {
        let schema = TableSchema::new("t", vec![Field::new("id", LogicalType::String, false)]);
        let rows: Vec<Row> = vec![vec![("id".into(), Value::Null)]];
        let (_store, engine) = engine();
        let err = engine
            .write_exact("nn/v1.parquet", &rows, Some(&schema), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_infer_schema_from_rows() {
        let rows: Vec<Row> = vec![
            vec![
                ("a".into(), Value::Null),
                ("b".into(), Value::Int(1)),
                ("c".into(), Value::Str("x".into())),
            ],
            vec![
                ("a".into(), Value::Float(0.5)),
                ("b".into(), Value::Int(2)),
                ("c".into(), Value::Str("y".into())),
            ],
        ];
        let schema = infer_schema(&rows);
        assert_eq!(schema.field("a").unwrap().logical_type, LogicalType::Float64);
        assert!(schema.field("a").unwrap().nullable);
        assert_eq!(schema.field("b").unwrap().logical_type, LogicalType::Int64);
        assert!(!schema.field("b").unwrap().nullable);
    }

    #[test]
    fn test_unique_file_path_shapes() {
        let path = unique_file_path("uploads/data.parquet");
        assert!(path.starts_with("uploads/data_"));
        let bare = unique_file_path("data");
        assert!(bare.starts_with("data_"));
        assert!(!bare.contains('/'));
    }

    #[test]
    fn test_cell_type_mismatch_is_a_validation_error() {
        let schema = TableSchema::new("t", vec![Field::new("n", LogicalType::Int64, true)]);
        let rows: Vec<Row> = vec![vec![("n".into(), Value::Str("not-a-number".into()))]];
        let err = rows_to_batch(&schema, &rows).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::SchemaValidation { .. })
        ));
    }
}
