//! Tests against live PostgreSQL and MySQL servers.
//!
//! Set `TEST_POSTGRES_URL` or `TEST_MYSQL_URL` (credentials embedded in the URL)
//! to run them; each test returns early when its variable is unset.

use select_mcp_server::config::{DatabaseSettings, PoolLimits};
use select_mcp_server::db::{DbPool, QueryExecutor};
use select_mcp_server::error::GatewayError;
use select_mcp_server::models::{DatabaseType, QueryResult};
use select_mcp_server::tools::QueryToolHandler;
use serde_json::{Value as JsonValue, json};
use std::time::{Duration, Instant};
use url::Url;

/// Settings for the server named by `var`, or `None` when it is not configured.
fn settings_from_env(var: &str, statement_timeout: Duration) -> Option<DatabaseSettings> {
    let raw = std::env::var(var).ok()?;
    let parsed = Url::parse(&raw).unwrap();
    let db_type = DatabaseType::from_connection_string(&raw).unwrap();

    Some(DatabaseSettings {
        db_type,
        url: raw.clone(),
        username: parsed.username().to_string(),
        password: parsed.password().unwrap_or_default().to_string(),
        statement_timeout,
        default_max_rows: 200,
        pool: PoolLimits::default(),
    })
}

async fn handler_for(var: &str, statement_timeout: Duration) -> Option<QueryToolHandler> {
    let Some(settings) = settings_from_env(var, statement_timeout) else {
        eprintln!("{} not set, skipping", var);
        return None;
    };
    let pool = DbPool::connect(&settings).await.unwrap();
    let executor = QueryExecutor::with_timeouts(statement_timeout, settings.pool.acquire_timeout);
    Some(QueryToolHandler::new(pool, executor, settings.default_max_rows))
}

async fn query(handler: &QueryToolHandler, sql: &str) -> QueryResult {
    handler.query(Some(&json!({"sql": sql}))).await.unwrap()
}

// ==================== PostgreSQL ====================

#[tokio::test]
async fn test_postgres_values_as_text() {
    let Some(handler) = handler_for("TEST_POSTGRES_URL", Duration::from_secs(5)).await else {
        return;
    };

    let result = query(
        &handler,
        "select 1 as x, 12.50::numeric as n, (-0.001)::numeric as small, true as b, \
         '2024-01-02'::date as d, null::text as z, 'a'::bytea as bin, \
         '{\"k\":1}'::jsonb as j, 9007199254740993::int8 as big",
    )
    .await;
    let row = &result.rows[0];
    assert_eq!(row["x"], "1");
    assert_eq!(row["n"], "12.50");
    assert_eq!(row["small"], "-0.001");
    assert_eq!(row["b"], "true");
    assert_eq!(row["d"], "2024-01-02");
    assert_eq!(row["z"], JsonValue::Null);
    assert_eq!(row["bin"], "YQ==");
    assert_eq!(row["j"], r#"{"k":1}"#);
    assert_eq!(row["big"], "9007199254740993");
    handler.pool().close().await;
}

#[tokio::test]
async fn test_postgres_uncategorized_types_as_text() {
    let Some(handler) = handler_for("TEST_POSTGRES_URL", Duration::from_secs(5)).await else {
        return;
    };

    let result = query(
        &handler,
        "select interval '1 day' as i, array[1,2] as a, inet '10.0.0.1' as ip, \
         'x'::\"char\" as c, 42::oid as o, point(1,2) as p, '<a/>'::xml as x",
    )
    .await;
    let row = &result.rows[0];
    assert_eq!(row["i"], "1 day");
    assert_eq!(row["a"], "{1,2}");
    assert_eq!(row["ip"], "10.0.0.1");
    assert_eq!(row["c"], "x");
    assert_eq!(row["o"], "42");
    assert_eq!(row["p"], "(1,2)");
    assert_eq!(row["x"], "<a/>");
    handler.pool().close().await;
}

#[tokio::test]
async fn test_postgres_empty_result_and_cap() {
    let Some(handler) = handler_for("TEST_POSTGRES_URL", Duration::from_secs(5)).await else {
        return;
    };

    let result = query(&handler, "select 1 as x, 'y' as y where false").await;
    assert_eq!(result.columns, vec!["x", "y"]);
    assert_eq!(result.row_count, 0);

    let result = query(&handler, "select g from generate_series(1, 1000) as g").await;
    assert_eq!(result.row_count, 200);
    handler.pool().close().await;
}

#[tokio::test]
async fn test_postgres_statement_timeout() {
    let Some(handler) = handler_for("TEST_POSTGRES_URL", Duration::from_secs(1)).await else {
        return;
    };

    let err = handler
        .query(Some(&json!({"sql": "select pg_sleep(3)"})))
        .await
        .unwrap_err();
    // Either the client deadline or the server-side statement_timeout fires first
    assert!(
        matches!(
            err,
            GatewayError::Timeout { .. } | GatewayError::Database { .. }
        ),
        "{:?}",
        err
    );

    // The pool is still usable afterwards
    let result = query(&handler, "select 1 as x").await;
    assert_eq!(result.row_count, 1);
    handler.pool().close().await;
}

#[tokio::test]
async fn test_postgres_error_carries_sqlstate() {
    let Some(handler) = handler_for("TEST_POSTGRES_URL", Duration::from_secs(5)).await else {
        return;
    };

    let err = handler
        .query(Some(&json!({"sql": "select * from table_that_does_not_exist"})))
        .await
        .unwrap_err();
    match &err {
        GatewayError::Database { sql_state, .. } => {
            assert_eq!(sql_state.as_deref(), Some("42P01"))
        }
        other => panic!("expected database error, got {:?}", other),
    }
    assert!(err.rpc_message().contains("(SQLSTATE: 42P01)"));
    handler.pool().close().await;
}

// ==================== MySQL ====================

#[tokio::test]
async fn test_mysql_values_as_text() {
    let Some(handler) = handler_for("TEST_MYSQL_URL", Duration::from_secs(5)).await else {
        return;
    };

    let result = query(
        &handler,
        "select 1 as x, cast(12.50 as decimal(6,2)) as n, null as z, \
         cast('2024-01-02' as date) as d, 'héllo' as s",
    )
    .await;
    let row = &result.rows[0];
    assert_eq!(row["x"], "1");
    assert_eq!(row["n"], "12.50");
    assert_eq!(row["z"], JsonValue::Null);
    assert_eq!(row["d"], "2024-01-02");
    assert_eq!(row["s"], "héllo");
    handler.pool().close().await;
}

#[tokio::test]
async fn test_mysql_timeouts_do_not_exhaust_pool() {
    let Some(handler) = handler_for("TEST_MYSQL_URL", Duration::from_secs(1)).await else {
        return;
    };

    // More runaway statements than the pool has connections
    let start = Instant::now();
    for _ in 0..PoolLimits::default().max_connections + 1 {
        match handler
            .query(Some(&json!({"sql": "select sleep(30) as s"})))
            .await
        {
            // The server interrupts SLEEP and returns 1
            Ok(result) => assert_eq!(result.rows[0]["s"], "1"),
            Err(GatewayError::Timeout { operation, .. }) => {
                assert_eq!(operation, "query execution")
            }
            Err(GatewayError::Database { .. }) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    let result = query(&handler, "select 1 as x").await;
    assert_eq!(result.row_count, 1);
    assert!(start.elapsed() < Duration::from_secs(20));
    handler.pool().close().await;
}
