// borevault-core/src/domain/value.rs
//
// Dynamic cell values. Payloads cross the repository boundary as arbitrary
// keyed mappings and are projected onto a fixed table schema; `Value` is the
// cell-level currency of that projection.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// JSON rendition used by read-path payloads: nulls stay null and
    /// timestamps become ISO-8601 strings with a trailing `Z`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Str(s) => Json::String(s.clone()),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Bool(b) => Json::Bool(*b),
            Value::Timestamp(ts) => Json::String(format_timestamp(ts)),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Lossy conversion from JSON payloads coming off the wire.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            // Nested objects have no columnar rendition; store them verbatim.
            Json::Object(_) => Value::Str(json.to_string()),
        }
    }
}

/// ISO-8601 with millisecond precision and a trailing `Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant in the wire format used throughout metadata documents.
pub fn now_iso() -> String {
    format_timestamp(&Utc::now())
}

/// One row: column/value pairs in schema order.
pub type Row = Vec<(String, Value)>;

pub fn row_get<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(name, _)| name == column)
        .map(|(_, value)| value)
}

/// Row as a JSON object, in row order.
pub fn row_to_json(row: &Row) -> Json {
    let mut map = serde_json::Map::new();
    for (name, value) in row {
        map.insert(name.clone(), value.to_json());
    }
    Json::Object(map)
}
