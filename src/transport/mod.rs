//! Transport layer for the MCP server.
//!
//! Only the stdio transport exists: newline-delimited JSON on standard input
//! and output.

pub mod stdio;

pub use stdio::{StdioTransport, serve};

use crate::error::GatewayResult;
use std::future::Future;

/// Trait for MCP transport implementations.
///
/// Transports handle the low-level communication between the MCP server
/// and clients, abstracting away the protocol details.
pub trait Transport: Send + Sync {
    /// Start the transport and begin handling requests.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
