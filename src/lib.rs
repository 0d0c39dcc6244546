//! SELECT MCP Server Library
//!
//! This library serves one MCP tool, `oracle_select`, over newline-delimited
//! JSON-RPC on stdio. The tool runs read-only SELECT statements against a
//! single PostgreSQL, MySQL/MariaDB or SQLite database with a row cap and a
//! statement timeout.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use mcp::GatewayService;
