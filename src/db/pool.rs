//! Connection pool management.
//!
//! One pool is created at startup from [`DatabaseSettings`] and shared by every
//! request. Database-specific pools (MySqlPool, PgPool, SqlitePool) are used so
//! each engine keeps its full type support.

use crate::config::{DatabaseSettings, PoolLimits};
use crate::error::{GatewayError, GatewayResult};
use crate::models::DatabaseType;
use sqlx::pool::PoolOptions;
use sqlx::{
    Connection, Database, Executor, MySqlConnection, MySqlPool, PgPool, SqlitePool,
    mysql::MySqlConnectOptions, postgres::PgConnectOptions, sqlite::SqliteConnectOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Open the pool described by `settings`.
    ///
    /// One connection is established before returning, so unreachable servers
    /// and bad credentials surface at startup.
    pub async fn connect(settings: &DatabaseSettings) -> GatewayResult<Self> {
        info!(
            db_type = %settings.db_type,
            url = %settings.masked_url(),
            max_connections = settings.pool.max_connections,
            "Connecting to database"
        );

        let pool = match settings.db_type {
            DatabaseType::MySQL => {
                let options = MySqlConnectOptions::from_str(&mysql_url(&settings.url))
                    .map_err(|e| invalid_url(settings.db_type, e))?
                    .username(&settings.username)
                    .password(&settings.password)
                    .charset("utf8mb4");

                let statement_timeout = settings.statement_timeout;
                let pool = pool_options(&settings.pool)
                    .after_connect(move |conn, _meta| {
                        Box::pin(async move {
                            set_mysql_statement_timeout(conn, statement_timeout).await;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_failed(settings.db_type, e))?;
                DbPool::MySql(pool)
            }
            DatabaseType::PostgreSQL => {
                // Server-side guard matching the client-side query timeout
                let statement_timeout_ms = settings.statement_timeout.as_millis().to_string();
                let options = PgConnectOptions::from_str(&settings.url)
                    .map_err(|e| invalid_url(settings.db_type, e))?
                    .username(&settings.username)
                    .password(&settings.password)
                    .options([("statement_timeout", statement_timeout_ms)]);

                let pool = pool_options(&settings.pool)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_failed(settings.db_type, e))?;
                DbPool::Postgres(pool)
            }
            DatabaseType::SQLite => {
                if !settings.db_type.uses_credentials() {
                    debug!("Ignoring username and password for file database");
                }
                let options = SqliteConnectOptions::from_str(&settings.url)
                    .map_err(|e| invalid_url(settings.db_type, e))?;

                let pool = pool_options(&settings.pool)
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_failed(settings.db_type, e))?;
                DbPool::SQLite(pool)
            }
        };

        info!(db_type = %settings.db_type, "Connected successfully");
        Ok(pool)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the database type for this pool.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySQL,
            DbPool::Postgres(_) => DatabaseType::PostgreSQL,
            DbPool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Connections currently open (idle or in use).
    pub fn size(&self) -> u32 {
        match self {
            DbPool::MySql(pool) => pool.size(),
            DbPool::Postgres(pool) => pool.size(),
            DbPool::SQLite(pool) => pool.size(),
        }
    }
}

/// Pool options shared by every engine.
///
/// Idle connections are not kept warm. A connection is pinged before being
/// handed out and discarded if the ping fails or outlasts the validation
/// timeout.
fn pool_options<DB: Database>(limits: &PoolLimits) -> PoolOptions<DB> {
    let validation_timeout = limits.validation_timeout;

    PoolOptions::<DB>::new()
        .min_connections(0)
        .max_connections(limits.max_connections)
        .acquire_timeout(limits.acquire_timeout)
        .idle_timeout(limits.idle_timeout)
        .max_lifetime(limits.max_lifetime)
        .test_before_acquire(false)
        .before_acquire(move |conn, meta| {
            Box::pin(async move {
                match tokio::time::timeout(validation_timeout, conn.ping()).await {
                    Ok(Ok(())) => Ok(true),
                    Ok(Err(e)) => {
                        warn!(
                            error = %e,
                            age_secs = meta.age.as_secs(),
                            "Discarding connection that failed validation"
                        );
                        Ok(false)
                    }
                    Err(_) => {
                        warn!(
                            timeout_secs = validation_timeout.as_secs(),
                            age_secs = meta.age.as_secs(),
                            "Discarding connection whose validation timed out"
                        );
                        Ok(false)
                    }
                }
            })
        })
}

/// Session statements bounding SELECT execution on the server, in the order
/// they are tried: MySQL (`max_execution_time`, milliseconds), then MariaDB
/// (`max_statement_time`, seconds).
fn mysql_timeout_statements(timeout: Duration) -> [String; 2] {
    [
        format!("SET SESSION max_execution_time = {}", timeout.as_millis()),
        format!("SET SESSION max_statement_time = {}", timeout.as_secs_f64()),
    ]
}

/// Install the server-side statement timeout on a new MySQL/MariaDB session.
///
/// A server that accepts neither variable keeps only the client deadline.
async fn set_mysql_statement_timeout(conn: &mut MySqlConnection, timeout: Duration) {
    let mut last_error = None;
    for statement in mysql_timeout_statements(timeout) {
        match (&mut *conn).execute(statement.as_str()).await {
            Ok(_) => {
                debug!(statement = %statement, "Installed server statement timeout");
                return;
            }
            Err(e) => last_error = Some(e),
        }
    }
    if let Some(e) = last_error {
        warn!(error = %e, "Server rejected statement timeout, relying on client deadline");
    }
}

/// MariaDB URLs use the MySQL driver.
fn mysql_url(url: &str) -> String {
    match url.get(..10) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mariadb://") => {
            format!("mysql://{}", &url[10..])
        }
        _ => url.to_string(),
    }
}

fn invalid_url(db_type: DatabaseType, err: sqlx::Error) -> GatewayError {
    GatewayError::connection(format!(
        "Invalid {} connection URL: {}",
        db_type.display_name(),
        err
    ))
}

fn connect_failed(db_type: DatabaseType, err: sqlx::Error) -> GatewayError {
    GatewayError::connection(format!(
        "Failed to connect to {}: {}",
        db_type.display_name(),
        err
    ))
}
