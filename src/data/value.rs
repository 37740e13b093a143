use serde::Serialize;

/// A single cell materialized from a database row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
    Json(serde_json::Value),
}

impl Value {
    /// Convert into a plain JSON value for API responses
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int64(i) | Value::Timestamp(i) => serde_json::json!(i),
            Value::Float64(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s),
            Value::Json(v) => v,
        }
    }
}
