//! Query execution tool.
//!
//! This module implements the `oracle_select` MCP tool: it checks the SQL with
//! the read-only filter, runs it with a row cap and timeout, and wraps the
//! result as a single text content item.

use crate::db::{DbPool, QueryExecutor};
use crate::error::{GatewayError, GatewayResult};
use crate::models::query::resolve_max_rows;
use crate::models::{QueryRequest, QueryResult};
use crate::tools::sql_validator;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

/// Name under which the tool is advertised and called.
pub const TOOL_NAME: &str = "oracle_select";

/// One item of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Result of a `tools/call`, always a one-element `content` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<Content>,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
        }
    }
}

/// Handler for query execution.
///
/// Owns a handle to the process-wide pool; clones share the same pool.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    pool: DbPool,
    executor: QueryExecutor,
    default_max_rows: u32,
}

impl QueryToolHandler {
    pub fn new(pool: DbPool, executor: QueryExecutor, default_max_rows: u32) -> Self {
        Self {
            pool,
            executor,
            default_max_rows,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Validate `arguments` into a request without touching the database.
    pub fn parse_arguments(&self, arguments: Option<&JsonValue>) -> GatewayResult<QueryRequest> {
        let arguments = match arguments {
            Some(JsonValue::Object(map)) => map,
            Some(JsonValue::Null) | None => {
                return Err(GatewayError::invalid_argument(format!(
                    "{} missing arguments",
                    TOOL_NAME
                )));
            }
            Some(_) => {
                return Err(GatewayError::invalid_argument(format!(
                    "{} arguments must be an object",
                    TOOL_NAME
                )));
            }
        };

        let sql = match arguments.get("sql") {
            Some(JsonValue::String(sql)) => sql.as_str(),
            Some(JsonValue::Null) | None => "",
            Some(_) => return Err(GatewayError::invalid_argument("sql must be a string")),
        };

        sql_validator::validate_select(sql)?;
        let max_rows = resolve_max_rows(arguments.get("maxRows"), self.default_max_rows)?;

        Ok(QueryRequest::new(sql, max_rows))
    }

    /// Run the query described by `arguments`.
    pub async fn query(&self, arguments: Option<&JsonValue>) -> GatewayResult<QueryResult> {
        let request = self.parse_arguments(arguments)?;
        let result = self.executor.execute_query(&self.pool, &request).await?;

        info!(
            db_type = %self.pool.db_type(),
            row_count = result.row_count,
            max_rows = request.max_rows,
            "Query executed"
        );

        Ok(result)
    }

    /// Run the query and wrap the pretty-printed result as tool output.
    pub async fn call(&self, arguments: Option<&JsonValue>) -> GatewayResult<ToolOutput> {
        let result = self.query(arguments).await?;
        Ok(ToolOutput::text(result.to_pretty_json()?))
    }
}
