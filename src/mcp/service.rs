//! MCP request dispatcher.
//!
//! This module defines the GatewayService that validates envelopes, routes
//! `initialize`, `tools/list` and `tools/call` through fixed tables, and turns
//! every handler failure into a JSON-RPC error.

use crate::error::{GatewayError, GatewayResult, codes};
use crate::mcp::protocol::{
    ErrorObject, InitializeResult, InputSchema, ListToolsResult, PropertySchema, Request,
    Response, ServerCapabilities, ServerInfo, ToolDescriptor,
};
use crate::tools::query::{QueryToolHandler, TOOL_NAME};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Initialize,
    ListTools,
    CallTool,
}

/// Top-level methods served.
const METHODS: &[(&str, Method)] = &[
    ("initialize", Method::Initialize),
    ("tools/list", Method::ListTools),
    ("tools/call", Method::CallTool),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Select,
}

/// Tools reachable through `tools/call`.
const TOOLS: &[(&str, Tool)] = &[(TOOL_NAME, Tool::Select)];

fn lookup<T: Copy>(table: &[(&str, T)], name: &str) -> Option<T> {
    table
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, value)| *value)
}

/// The fixed one-entry tool catalog.
pub fn tool_catalog() -> Vec<ToolDescriptor> {
    let mut properties = BTreeMap::new();
    properties.insert(
        "sql",
        PropertySchema {
            kind: "string",
            description: "SELECT SQL to run.",
        },
    );
    properties.insert(
        "maxRows",
        PropertySchema {
            kind: "integer",
            description: "Max rows to return (default 200).",
        },
    );

    vec![ToolDescriptor {
        name: TOOL_NAME,
        description: "Run a SELECT query against the database (SELECT-only, row-limited).",
        input_schema: InputSchema {
            kind: "object",
            properties,
            required: vec!["sql"],
        },
    }]
}

#[derive(Debug, Clone)]
pub struct GatewayService {
    query_tool: QueryToolHandler,
    server_info: ServerInfo,
}

impl GatewayService {
    /// Create a new GatewayService around the query tool.
    pub fn new(query_tool: QueryToolHandler) -> Self {
        Self {
            query_tool,
            server_info: ServerInfo::from_build_env(),
        }
    }

    pub fn query_tool(&self) -> &QueryToolHandler {
        &self.query_tool
    }

    /// Handle one decoded message.
    ///
    /// Returns the response to write, or `None` for notifications and for
    /// invalid envelopes without a usable id.
    pub async fn handle_message(&self, message: JsonValue) -> Option<Response> {
        let request = match Request::try_from(message) {
            Ok(request) => request,
            Err(invalid) => {
                warn!(
                    id = ?invalid.id,
                    reason = invalid.reason,
                    "Invalid request envelope"
                );
                return invalid.id.map(|id| {
                    Response::error(id, ErrorObject::new(codes::INVALID_REQUEST, "Invalid Request"))
                });
            }
        };

        let outcome = self.dispatch(&request).await;

        match (request.id, outcome) {
            (None, Ok(_)) => None,
            (None, Err(err)) => {
                debug!(method = %request.method, error = %err.message, "Notification failed");
                None
            }
            (Some(id), Ok(result)) => Some(Response::success(id, result)),
            (Some(id), Err(err)) => Some(Response::error(id, err)),
        }
    }

    /// Route a request and run its handler.
    async fn dispatch(&self, request: &Request) -> Result<JsonValue, ErrorObject> {
        let Some(method) = lookup(METHODS, &request.method) else {
            debug!(method = %request.method, "Unknown method");
            return Err(ErrorObject::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ));
        };

        debug!(method = %request.method, id = ?request.id, "Dispatching request");

        let result = match method {
            Method::Initialize => to_json(self.initialize()),
            Method::ListTools => to_json(self.list_tools()),
            Method::CallTool => self.call_tool(request.params.as_ref()).await,
        };

        result.map_err(|err| {
            error!(
                method = %request.method,
                id = ?request.id,
                kind = err.kind(),
                retryable = err.is_retryable(),
                error = %err,
                "Request failed"
            );
            ErrorObject::new(err.rpc_code(), err.rpc_message())
        })
    }

    /// `initialize`: parameters are ignored.
    pub fn initialize(&self) -> InitializeResult {
        InitializeResult {
            server_info: self.server_info.clone(),
            capabilities: ServerCapabilities::default(),
        }
    }

    /// `tools/list`: parameters are ignored.
    pub fn list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            tools: tool_catalog(),
        }
    }

    /// `tools/call`: run the named tool with `params.arguments`.
    pub async fn call_tool(&self, params: Option<&JsonValue>) -> GatewayResult<JsonValue> {
        let name = params
            .and_then(|p| p.get("name"))
            .and_then(JsonValue::as_str)
            .ok_or_else(|| GatewayError::invalid_argument("tools/call missing params.name"))?;
        let arguments = params.and_then(|p| p.get("arguments"));

        let Some(tool) = lookup(TOOLS, name) else {
            return Err(GatewayError::invalid_argument(format!(
                "Unknown tool: {}",
                name
            )));
        };

        match tool {
            Tool::Select => to_json(self.query_tool.call(arguments).await?),
        }
    }
}

fn to_json<T: Serialize>(value: T) -> GatewayResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::internal(format!("Failed to serialize result: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbPool, QueryExecutor};
    use crate::mcp::protocol::{Outcome, RequestId};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    fn create_test_service() -> GatewayService {
        let pool = SqlitePoolOptions::new()
            .connect_lazy("sqlite::memory:")
            .unwrap();
        let handler = QueryToolHandler::new(DbPool::SQLite(pool), QueryExecutor::new(), 200);
        GatewayService::new(handler)
    }

    fn error_of(response: Option<Response>) -> ErrorObject {
        match response.expect("expected a response").outcome {
            Outcome::Error(err) => err,
            Outcome::Result(r) => panic!("expected error, got {}", r),
        }
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(lookup(METHODS, "tools/call"), Some(Method::CallTool));
        assert_eq!(lookup(METHODS, "Tools/Call"), None);
        assert_eq!(lookup(TOOLS, "oracle_select"), Some(Tool::Select));
        assert_eq!(lookup(TOOLS, "query"), None);
    }

    #[test]
    fn test_catalog_shape() {
        let value = serde_json::to_value(tool_catalog()).unwrap();
        assert_eq!(
            value,
            json!([{
                "name": "oracle_select",
                "description": "Run a SELECT query against the database (SELECT-only, row-limited).",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "maxRows": {"type": "integer", "description": "Max rows to return (default 200)."},
                        "sql": {"type": "string", "description": "SELECT SQL to run."}
                    },
                    "required": ["sql"]
                }
            }])
        );
    }

    #[tokio::test]
    async fn test_initialize_ignores_params() {
        let service = create_test_service();
        let response = service
            .handle_message(json!({
                "protocolVersion": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {"anything": [1, 2, 3]}
            }))
            .await
            .unwrap();
        match response.outcome {
            Outcome::Result(result) => {
                assert_eq!(result["capabilities"], json!({"tools": {}}));
                assert_eq!(result["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
            }
            Outcome::Error(e) => panic!("unexpected error {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({"protocolVersion": "2.0", "id": "m", "method": "ping"}))
                .await,
        );
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
        assert_eq!(err.message, "Method not found: ping");
    }

    #[tokio::test]
    async fn test_invalid_envelope_with_id() {
        let service = create_test_service();
        let response = service
            .handle_message(json!({"protocolVersion": "1.0", "id": 9, "method": "initialize"}))
            .await
            .unwrap();
        assert_eq!(response.id, RequestId::Number(9.into()));
        assert_eq!(
            error_of(Some(response)),
            ErrorObject::new(codes::INVALID_REQUEST, "Invalid Request")
        );
    }

    #[tokio::test]
    async fn test_notifications_never_answered() {
        let service = create_test_service();
        let messages = [
            json!({"protocolVersion": "2.0", "method": "initialize"}),
            json!({"protocolVersion": "2.0", "id": null, "method": "nope"}),
            json!({"protocolVersion": "3.0", "method": "initialize"}),
            json!({"protocolVersion": "2.0", "method": "tools/call", "params": {}}),
            json!({"protocolVersion": "2.0", "id": {"x": 1}, "method": "initialize"}),
        ];
        for message in messages {
            assert!(service.handle_message(message).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_tools_call_missing_name() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({
                    "protocolVersion": "2.0",
                    "id": 2,
                    "method": "tools/call",
                    "params": {"arguments": {"sql": "select 1"}}
                }))
                .await,
        );
        assert_eq!(err.code, codes::SERVER_ERROR);
        assert_eq!(err.message, "Server error: tools/call missing params.name");
    }

    #[tokio::test]
    async fn test_non_string_method_is_invalid_request() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({"protocolVersion": "2.0", "id": 6, "method": 5}))
                .await,
        );
        assert_eq!(err, ErrorObject::new(codes::INVALID_REQUEST, "Invalid Request"));
    }

    #[tokio::test]
    async fn test_tools_call_non_string_name() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({
                    "protocolVersion": "2.0",
                    "id": 7,
                    "method": "tools/call",
                    "params": {"name": 42, "arguments": {"sql": "select 1"}}
                }))
                .await,
        );
        assert_eq!(err.code, codes::SERVER_ERROR);
        assert_eq!(err.message, "Server error: tools/call missing params.name");
    }

    #[tokio::test]
    async fn test_tools_call_unknown_tool() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({
                    "protocolVersion": "2.0",
                    "id": 3,
                    "method": "tools/call",
                    "params": {"name": "drop_everything", "arguments": {}}
                }))
                .await,
        );
        assert_eq!(err.code, codes::SERVER_ERROR);
        assert_eq!(err.message, "Server error: Unknown tool: drop_everything");
    }

    #[tokio::test]
    async fn test_tools_call_security_failure() {
        let service = create_test_service();
        let err = error_of(
            service
                .handle_message(json!({
                    "protocolVersion": "2.0",
                    "id": 4,
                    "method": "tools/call",
                    "params": {"name": "oracle_select", "arguments": {"sql": "DELETE FROM t"}}
                }))
                .await,
        );
        assert_eq!(err.code, codes::SERVER_ERROR);
        assert_eq!(err.message, "Server error: Only SELECT is allowed");
    }
}
