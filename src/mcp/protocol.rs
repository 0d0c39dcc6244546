//! JSON-RPC envelope types.
//!
//! Incoming lines are parsed into a [`Request`] here and nowhere else; the
//! dispatcher only ever sees typed values. Outgoing messages are [`Response`]
//! values serialized by the transport.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Literal every envelope must carry.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Request identifier, echoed back in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

/// A validated request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// `None` for notifications
    pub id: Option<RequestId>,
    pub method: String,
    pub params: Option<JsonValue>,
}

impl Request {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Why an envelope was refused, plus the id to answer to if one was readable.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEnvelope {
    pub id: Option<RequestId>,
    pub reason: &'static str,
}

/// Wire shape of an incoming message before validation.
///
/// Every member is optional so that a structurally wrong envelope still yields
/// its id.
#[derive(Debug, Default, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "protocolVersion", default)]
    protocol_version: Option<JsonValue>,
    /// Standard JSON-RPC spelling, accepted as an alias
    #[serde(default)]
    jsonrpc: Option<JsonValue>,
    #[serde(default)]
    id: Option<JsonValue>,
    #[serde(default)]
    method: Option<JsonValue>,
    #[serde(default)]
    params: Option<JsonValue>,
}

impl TryFrom<JsonValue> for Request {
    type Error = InvalidEnvelope;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(InvalidEnvelope {
                id: None,
                reason: "envelope is not an object",
            });
        }
        let raw: RawEnvelope = serde_json::from_value(value).map_err(|_| InvalidEnvelope {
            id: None,
            reason: "envelope is malformed",
        })?;

        // Null ids deserialize to None and mark a notification
        let id = match raw.id {
            None => None,
            Some(JsonValue::Number(n)) => Some(RequestId::Number(n)),
            Some(JsonValue::String(s)) => Some(RequestId::String(s)),
            Some(_) => {
                return Err(InvalidEnvelope {
                    id: None,
                    reason: "id must be a number or a string",
                });
            }
        };

        let version = raw.protocol_version.or(raw.jsonrpc);
        if version.as_ref().and_then(JsonValue::as_str) != Some(PROTOCOL_VERSION) {
            return Err(InvalidEnvelope {
                id,
                reason: "protocolVersion must be \"2.0\"",
            });
        }

        let method = match raw.method {
            Some(JsonValue::String(method)) => method,
            _ => {
                return Err(InvalidEnvelope {
                    id,
                    reason: "method must be a string",
                });
            }
        };

        Ok(Request {
            id,
            method,
            params: raw.params,
        })
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(JsonValue),
    Error(ErrorObject),
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    pub fn success(id: RequestId, result: JsonValue) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }
}

// =============================================================================
// Capability payloads
// =============================================================================

/// Name and version reported by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl ServerInfo {
    /// Taken from the crate metadata.
    pub fn from_build_env() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Presence of this object signals that the server hosts tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolsCapability {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
}

/// Schema of one tool argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: BTreeMap<&'static str, PropertySchema>,
    pub required: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: InputSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
}
