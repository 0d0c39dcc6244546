//! MCP server integration module.
//!
//! `protocol` holds the JSON-RPC envelope and capability types, `service`
//! routes requests to the capability methods and the query tool.

pub mod protocol;
pub mod service;

pub use protocol::{Request, RequestId, Response};
pub use service::GatewayService;
