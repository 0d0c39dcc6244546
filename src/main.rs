//! SELECT MCP Server - Main entry point.
//!
//! This server exposes one read-only SQL tool to MCP clients over stdio.

use select_mcp_server::config::Config;
use select_mcp_server::db::{DbPool, QueryExecutor};
use select_mcp_server::mcp::GatewayService;
use select_mcp_server::tools::QueryToolHandler;
use select_mcp_server::transport::{StdioTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries protocol messages only.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    let settings = match config.database_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: select-mcp-server --url <URL> --user <USER> --password <PASSWORD>");
            eprintln!("       (or set DB_URL, DB_USER and DB_PASSWORD)");
            eprintln!();
            eprintln!("Examples:");
            eprintln!(
                "  select-mcp-server --url postgres://localhost:5432/sales --user ro --password pw"
            );
            eprintln!(
                "  DB_URL=mysql://localhost:3306/shop DB_USER=ro DB_PASSWORD=pw select-mcp-server"
            );
            std::process::exit(1);
        }
    };

    info!(
        "booted {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!(
        db_type = %settings.db_type,
        url = %settings.masked_url(),
        statement_timeout_secs = settings.statement_timeout.as_secs(),
        default_max_rows = settings.default_max_rows,
        "Loaded configuration"
    );

    // One pool for the whole process, handed to the query tool
    let pool = match DbPool::connect(&settings).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to open connection pool");
            return Err(e.into());
        }
    };
    let executor =
        QueryExecutor::with_timeouts(settings.statement_timeout, settings.pool.acquire_timeout);
    let query_tool = QueryToolHandler::new(pool, executor, settings.default_max_rows);
    let service = GatewayService::new(query_tool);

    let transport = StdioTransport::new(service);
    info!(transport = transport.name(), "Using stdio transport");

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
