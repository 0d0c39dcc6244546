//! Query-related data models.
//!
//! This module defines the validated query request handed to the executor and
//! the result payload returned to clients.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One result row: column label to text value (or null), in column order.
pub type ResultRow = serde_json::Map<String, JsonValue>;

/// A validated SELECT statement and its row cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Executed exactly as received, never rewritten
    pub sql: String,
    pub max_rows: u32,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, max_rows: u32) -> Self {
        Self {
            sql: sql.into(),
            max_rows,
        }
    }
}

/// Resolve the `maxRows` tool argument.
///
/// Absent, null and non-numeric values fall back to `default`. Integers are used
/// as given, fractional numbers are truncated toward zero and strings holding
/// an integer are parsed. Negative values are rejected.
pub fn resolve_max_rows(value: Option<&JsonValue>, default: u32) -> GatewayResult<u32> {
    let requested = match value {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|v| v.min(i64::MAX as u64) as i64))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match requested {
        None => Ok(default),
        Some(n) if n < 0 => Err(GatewayError::invalid_argument(format!(
            "maxRows must not be negative (got {})",
            n
        ))),
        Some(n) => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
    }
}

/// Result payload of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Column labels in result-set order
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
    /// Always equal to `rows.len()`
    pub row_count: usize,
}

impl QueryResult {
    /// Build a result; the row count is derived from the rows.
    pub fn new(columns: Vec<String>, rows: Vec<ResultRow>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    /// Build a result from labels and positional text values.
    ///
    /// A label that appears twice keeps its first position and the later value.
    pub fn from_text_rows(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .map(|(label, value)| (label, value.map_or(JsonValue::Null, JsonValue::String)))
                    .collect::<ResultRow>()
            })
            .collect();
        Self::new(columns, rows)
    }

    /// Pretty-printed JSON text of this payload.
    pub fn to_pretty_json(&self) -> GatewayResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GatewayError::internal(format!("Failed to serialize result: {}", e)))
    }
}
