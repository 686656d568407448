// borevault-core/src/domain/schema.rs

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
//  1. LOGICAL TYPES
// =============================================================================

/// Logical column types used by the schema registry.
///
/// Deliberately narrower than Arrow's type system: these are the only types
/// the original PostgreSQL-derived catalogue needs, and the compatibility
/// relation below is defined over their families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    String,
    Int32,
    Int64,
    Float64,
    Boolean,
    /// Millisecond-precision UTC timestamp.
    TimestampMs,
    List(Box<LogicalType>),
}

impl LogicalType {
    pub fn is_string(&self) -> bool {
        matches!(self, LogicalType::String)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, LogicalType::Int32 | LogicalType::Int64)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, LogicalType::Float64)
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, LogicalType::TimestampMs)
    }

    /// Map to the Arrow type written into Parquet files.
    pub fn to_arrow(&self) -> DataType {
        match self {
            LogicalType::String => DataType::Utf8,
            LogicalType::Int32 => DataType::Int32,
            LogicalType::Int64 => DataType::Int64,
            LogicalType::Float64 => DataType::Float64,
            LogicalType::Boolean => DataType::Boolean,
            LogicalType::TimestampMs => DataType::Timestamp(TimeUnit::Millisecond, None),
            LogicalType::List(inner) => {
                DataType::List(Arc::new(ArrowField::new("item", inner.to_arrow(), true)))
            }
        }
    }

    /// Map an Arrow type back into the registry's logical families.
    /// Returns None for Arrow types the engine never produces.
    pub fn from_arrow(data_type: &DataType) -> Option<LogicalType> {
        match data_type {
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Some(LogicalType::String),
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::UInt8
            | DataType::UInt16 => Some(LogicalType::Int32),
            DataType::Int64 | DataType::UInt32 | DataType::UInt64 => Some(LogicalType::Int64),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                Some(LogicalType::Float64)
            }
            DataType::Boolean => Some(LogicalType::Boolean),
            DataType::Timestamp(_, _) => Some(LogicalType::TimestampMs),
            DataType::List(field) | DataType::LargeList(field) => {
                LogicalType::from_arrow(field.data_type()).map(|t| LogicalType::List(Box::new(t)))
            }
            _ => None,
        }
    }
}

/// Compatibility relation used by write-path schema validation.
///
/// Two types are compatible iff they are equal, or belong to the same family
/// (string, integer, floating, timestamp). This permits incidental widening
/// across reader/writer versions without changing the column meaning.
pub fn types_compatible(expected: &LogicalType, actual: &LogicalType) -> bool {
    if expected == actual {
        return true;
    }
    (expected.is_string() && actual.is_string())
        || (expected.is_integer() && actual.is_integer())
        || (expected.is_floating() && actual.is_floating())
        || (expected.is_timestamp() && actual.is_timestamp())
}

// =============================================================================
//  2. FIELDS & TABLE SCHEMAS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: &str, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            logical_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl TableSchema {
    pub fn new(name: &str, fields: Vec<Field>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Arrow schema for batches written under this table schema.
    pub fn to_arrow(&self) -> Arc<ArrowSchema> {
        let fields: Vec<ArrowField> = self
            .fields
            .iter()
            .map(|f| ArrowField::new(&f.name, f.logical_type.to_arrow(), f.nullable))
            .collect();
        Arc::new(ArrowSchema::new(fields))
    }
}

// =============================================================================
//  3. TESTS
// =============================================================================
