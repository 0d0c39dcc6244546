//! Error types for the SELECT MCP server.
//!
//! Handler failures are collected in [`GatewayError`]. The dispatcher turns
//! every variant into a JSON-RPC error object through [`GatewayError::rpc_code`],
//! which is the only place where error kinds are mapped to codes.

use crate::config::DEFAULT_ACQUIRE_TIMEOUT_SECS;
use thiserror::Error;

/// JSON-RPC error codes used by the server.
pub mod codes {
    /// The envelope is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Generic implementation-defined server error.
    pub const SERVER_ERROR: i32 = -32000;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing tool name, unknown tool, malformed or missing arguments.
    #[error("{message}")]
    InvalidArgument { message: String },

    /// The SQL text was refused by the read-only filter.
    #[error("{message}")]
    Security { message: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a security policy violation.
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Security { .. } => "security",
            Self::Database { .. } => "database",
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection",
            Self::Internal { .. } => "internal",
        }
    }

    /// JSON-RPC error code reported for this failure.
    ///
    /// Argument, policy and execution failures share the generic server error
    /// code; clients tell them apart by message.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. }
            | Self::Security { .. }
            | Self::Database { .. }
            | Self::Timeout { .. }
            | Self::Connection { .. }
            | Self::Internal { .. } => codes::SERVER_ERROR,
        }
    }

    /// Message placed in the JSON-RPC error object.
    pub fn rpc_message(&self) -> String {
        match self {
            Self::Database {
                message,
                sql_state: Some(code),
            } => format!("Server error: {} (SQLSTATE: {})", message, code),
            _ => format!("Server error: {}", self),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to GatewayError.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => {
                GatewayError::connection(format!("Invalid connection configuration: {}", msg))
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::database(db_err.message(), code)
            }
            sqlx::Error::PoolTimedOut => {
                GatewayError::timeout("connection pool acquire", DEFAULT_ACQUIRE_TIMEOUT_SECS)
            }
            sqlx::Error::PoolClosed => GatewayError::connection("Connection pool is closed"),
            sqlx::Error::Io(io_err) => GatewayError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => {
                GatewayError::connection(format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                GatewayError::connection(format!("Protocol error: {}", msg))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GatewayError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                GatewayError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => GatewayError::internal("Database worker crashed"),
            _ => GatewayError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for handler operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Fatal startup configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {name}")]
    Missing { name: &'static str },

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("{name} must be greater than 0")]
    Zero { name: &'static str },
}
