//! Data models for the SELECT MCP server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use query::{QueryRequest, QueryResult, ResultRow};
