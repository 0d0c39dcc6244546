//! MCP tool implementations.
//!
//! - `query`: the `oracle_select` tool, SELECT-only and row-limited
//! - `sql_validator`: lexical read-only filter applied before execution

pub mod query;
pub mod sql_validator;

pub use query::{Content, QueryToolHandler, TOOL_NAME, ToolOutput};
