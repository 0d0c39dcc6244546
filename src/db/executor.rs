//! Query execution engine.
//!
//! This module runs one validated SELECT with:
//! - Row caps (enforced via streaming, only the needed rows are fetched)
//! - Query timeouts
//! - Column labels even when the result set is empty
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch
//! - `postgres`: PostgreSQL-specific fetch
//! - `sqlite`: SQLite-specific fetch
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::config::{DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_STATEMENT_TIMEOUT_SECS};
use crate::db::pool::DbPool;
use crate::db::types::{RowToText, column_labels, row_to_text};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{QueryRequest, QueryResult};
use futures_util::{StreamExt, TryStreamExt};
use sqlx::{Column, ColumnIndex, Executor};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    statement_timeout: Duration,
    acquire_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            statement_timeout: Duration::from_secs(DEFAULT_STATEMENT_TIMEOUT_SECS),
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Create a new query executor with custom timeouts.
    ///
    /// `acquire_timeout` should match the pool's, it is only used to report
    /// pool exhaustion.
    pub fn with_timeouts(statement_timeout: Duration, acquire_timeout: Duration) -> Self {
        Self {
            statement_timeout,
            acquire_timeout,
        }
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Execute a SELECT and return at most `request.max_rows` rows.
    ///
    /// A connection is borrowed from the pool for the duration of the call and
    /// returned on every path, including errors and timeouts.
    pub async fn execute_query(
        &self,
        pool: &DbPool,
        request: &QueryRequest,
    ) -> GatewayResult<QueryResult> {
        let start = Instant::now();

        debug!(
            sql = %request.sql,
            max_rows = request.max_rows,
            timeout_secs = self.statement_timeout.as_secs(),
            "Executing query"
        );

        let fetched = match pool {
            DbPool::MySql(p) => {
                let mut conn = p.acquire().await.map_err(|e| self.acquire_error(e))?;
                let fetch = mysql::fetch_rows(&mut conn, &request.sql, request.max_rows);
                self.run(fetch).await?
            }
            DbPool::Postgres(p) => {
                let mut conn = p.acquire().await.map_err(|e| self.acquire_error(e))?;
                let fetch = postgres::fetch_rows(&mut conn, &request.sql, request.max_rows);
                self.run(fetch).await?
            }
            DbPool::SQLite(p) => {
                let mut conn = p.acquire().await.map_err(|e| self.acquire_error(e))?;
                let fetch = sqlite::fetch_rows(&mut conn, &request.sql, request.max_rows);
                self.run(fetch).await?
            }
        };

        let result = QueryResult::from_text_rows(fetched.columns, fetched.rows);
        debug!(
            row_count = result.row_count,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );
        Ok(result)
    }

    async fn run<F>(&self, fetch: F) -> GatewayResult<FetchedRows>
    where
        F: Future<Output = Result<FetchedRows, sqlx::Error>>,
    {
        match timeout(self.statement_timeout, fetch).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => Err(timeout_error("query execution", self.statement_timeout)),
        }
    }

    fn acquire_error(&self, err: sqlx::Error) -> GatewayError {
        match err {
            sqlx::Error::PoolTimedOut => {
                timeout_error("connection pool acquire", self.acquire_timeout)
            }
            other => GatewayError::from(other),
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Labels and rendered values of one capped result set.
#[derive(Debug)]
struct FetchedRows {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl FetchedRows {
    fn new<R>(columns: Vec<String>, rows: &[R]) -> Self
    where
        R: RowToText,
        usize: ColumnIndex<R>,
    {
        Self {
            columns,
            rows: rows.iter().map(row_to_text).collect(),
        }
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below streams at most `max_rows` rows from one connection. When
// no row comes back the statement is described instead, so the caller still
// receives the column labels.

mod mysql {
    use super::*;
    use sqlx::MySqlConnection;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        max_rows: u32,
    ) -> Result<FetchedRows, sqlx::Error> {
        let rows: Vec<MySqlRow> = (&mut *conn)
            .fetch(sql)
            .take(max_rows as usize)
            .try_collect()
            .await?;

        let columns = match rows.first() {
            Some(row) => column_labels(row),
            None => describe_columns((&mut *conn).describe(sql).await?.columns()),
        };
        Ok(FetchedRows::new(columns, &rows))
    }
}

mod postgres {
    use super::*;
    use sqlx::PgConnection;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        max_rows: u32,
    ) -> Result<FetchedRows, sqlx::Error> {
        let rows: Vec<PgRow> = (&mut *conn)
            .fetch(sql)
            .take(max_rows as usize)
            .try_collect()
            .await?;

        let columns = match rows.first() {
            Some(row) => column_labels(row),
            None => describe_columns((&mut *conn).describe(sql).await?.columns()),
        };
        Ok(FetchedRows::new(columns, &rows))
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        max_rows: u32,
    ) -> Result<FetchedRows, sqlx::Error> {
        let rows: Vec<SqliteRow> = (&mut *conn)
            .fetch(sql)
            .take(max_rows as usize)
            .try_collect()
            .await?;

        let columns = match rows.first() {
            Some(row) => column_labels(row),
            None => describe_columns((&mut *conn).describe(sql).await?.columns()),
        };
        Ok(FetchedRows::new(columns, &rows))
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn describe_columns<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn timeout_error(operation: &str, limit: Duration) -> GatewayError {
    GatewayError::timeout(operation, limit.as_secs())
}
