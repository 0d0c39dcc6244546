//! Configuration handling for the SELECT MCP server.
//!
//! Settings come from CLI arguments with environment variable fallbacks. The
//! connection URL, username and password are required; everything else has a
//! default matching the server's fixed execution limits.

use crate::error::ConfigError;
use crate::models::DatabaseType;
use clap::Parser;
use std::time::Duration;
use url::Url;

pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_ROWS: u32 = 200;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 3;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 300;

/// Connection pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
    /// How long a liveness check may take before the connection is discarded
    pub validation_timeout: Duration,
    /// Idle connections are closed after this long
    pub idle_timeout: Duration,
    /// Connections are recycled after this long regardless of use
    pub max_lifetime: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            validation_timeout: Duration::from_secs(DEFAULT_VALIDATION_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime: Duration::from_secs(DEFAULT_MAX_LIFETIME_SECS),
        }
    }
}

/// Validated database connection settings.
#[derive(Clone)]
pub struct DatabaseSettings {
    pub db_type: DatabaseType,
    /// Contains no credentials unless the operator put them in the URL - never log
    pub url: String,
    pub username: String,
    /// Sensitive - never log
    pub password: String,
    pub statement_timeout: Duration,
    pub default_max_rows: u32,
    pub pool: PoolLimits,
}

impl DatabaseSettings {
    /// Connection URL with any embedded password masked, safe for logs.
    pub fn masked_url(&self) -> String {
        mask_url(&self.url)
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("db_type", &self.db_type)
            .field("url", &self.masked_url())
            .field("username", &self.username)
            .field("password", &"****")
            .field("statement_timeout", &self.statement_timeout)
            .field("default_max_rows", &self.default_max_rows)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Replace the password component of a URL with `****`.
///
/// Strings that do not parse as URLs (for example `sqlite:data.db` variants
/// the parser rejects) are returned unchanged since they cannot carry one.
pub fn mask_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

/// Configuration for the SELECT MCP server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "select-mcp-server",
    about = "MCP server exposing a read-only SELECT tool over stdio",
    version,
    author
)]
pub struct Config {
    /// Database connection URL (postgres://, mysql://, mariadb:// or sqlite:)
    #[arg(long, value_name = "URL", env = "DB_URL", hide_env_values = true)]
    pub url: Option<String>,

    /// Database username
    #[arg(long, value_name = "USER", env = "DB_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(
        long,
        value_name = "PASSWORD",
        env = "DB_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Server-side statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS,
        env = "DB_STATEMENT_TIMEOUT"
    )]
    pub statement_timeout: u64,

    /// Rows returned when a call does not specify maxRows
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS, env = "DB_DEFAULT_MAX_ROWS")]
    pub default_max_rows: u32,

    /// Maximum connections in the pool
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        env = "DB_MAX_CONNECTIONS"
    )]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "DB_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout: u64,

    /// Seconds a connection liveness check may take
    #[arg(
        long,
        default_value_t = DEFAULT_VALIDATION_TIMEOUT_SECS,
        env = "DB_VALIDATION_TIMEOUT"
    )]
    pub validation_timeout: u64,

    /// Seconds before an idle connection is closed
    #[arg(
        long,
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        env = "DB_IDLE_TIMEOUT"
    )]
    pub idle_timeout: u64,

    /// Maximum lifetime of a connection in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_LIFETIME_SECS,
        env = "DB_MAX_LIFETIME"
    )]
    pub max_lifetime: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT_SECS,
            default_max_rows: DEFAULT_MAX_ROWS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT_SECS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            max_lifetime: DEFAULT_MAX_LIFETIME_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the configuration and build the database settings.
    ///
    /// Any missing or blank required setting is fatal.
    pub fn database_settings(&self) -> Result<DatabaseSettings, ConfigError> {
        let url = required(self.url.as_deref(), "DB_URL")?;
        let username = required(self.user.as_deref(), "DB_USER")?;
        let password = required(self.password.as_deref(), "DB_PASSWORD")?;

        let db_type = detect_database_type(url)?;

        Ok(DatabaseSettings {
            db_type,
            url: url.trim().to_string(),
            username: username.to_string(),
            password: password.to_string(),
            statement_timeout: non_zero_secs(self.statement_timeout, "statement_timeout")?,
            default_max_rows: self.default_max_rows,
            pool: self.pool_limits()?,
        })
    }

    /// Build the pool limits, rejecting zero values.
    pub fn pool_limits(&self) -> Result<PoolLimits, ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Zero {
                name: "max_connections",
            });
        }
        Ok(PoolLimits {
            max_connections: self.max_connections,
            acquire_timeout: non_zero_secs(self.acquire_timeout, "acquire_timeout")?,
            validation_timeout: non_zero_secs(self.validation_timeout, "validation_timeout")?,
            idle_timeout: non_zero_secs(self.idle_timeout, "idle_timeout")?,
            max_lifetime: non_zero_secs(self.max_lifetime, "max_lifetime")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { name }),
    }
}

fn non_zero_secs(secs: u64, name: &'static str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        Err(ConfigError::Zero { name })
    } else {
        Ok(Duration::from_secs(secs))
    }
}

/// Detect the engine from the URL scheme.
fn detect_database_type(url: &str) -> Result<DatabaseType, ConfigError> {
    let trimmed = url.trim();
    if let Some(db_type) = DatabaseType::from_connection_string(trimmed) {
        return Ok(db_type);
    }
    match Url::parse(trimmed) {
        Ok(parsed) => Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string())),
        Err(e) => Err(ConfigError::InvalidUrl(e.to_string())),
    }
}
