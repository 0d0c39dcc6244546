//! Stdio transport for the MCP server.
//!
//! Reads newline-delimited JSON-RPC messages from stdin and writes one response
//! line per answered request to stdout. Diagnostics go to stderr through
//! `tracing`, never to stdout.

use crate::error::{GatewayError, GatewayResult};
use crate::mcp::GatewayService;
use crate::transport::Transport;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};

/// Serve requests from `reader` until end of input.
///
/// Each line is handled to completion before the next one is read. Blank lines
/// are skipped; lines that are not UTF-8 JSON are logged and dropped without a
/// response.
pub async fn serve<R, W>(
    service: &GatewayService,
    mut reader: R,
    mut writer: W,
) -> GatewayResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).await.map_err(io_error)?;
        if read == 0 {
            break;
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(bytes = read, "Dropping line that is not valid UTF-8");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        debug!(line = %line, "recv");

        let message: JsonValue = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping line that is not valid JSON");
                continue;
            }
        };

        if let Some(response) = service.handle_message(message).await {
            let text = serde_json::to_string(&response).map_err(|e| {
                GatewayError::internal(format!("Failed to serialize response: {}", e))
            })?;
            debug!(line = %text, "send");
            writer.write_all(text.as_bytes()).await.map_err(io_error)?;
            writer.write_all(b"\n").await.map_err(io_error)?;
            writer.flush().await.map_err(io_error)?;
        }
    }

    info!("Input closed");
    Ok(())
}

fn io_error(err: std::io::Error) -> GatewayError {
    GatewayError::internal(format!("Stdio transport error: {}", err))
}

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout.
pub struct StdioTransport {
    service: GatewayService,
}

impl StdioTransport {
    /// Create a new stdio transport around the dispatcher.
    pub fn new(service: GatewayService) -> Self {
        Self { service }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> GatewayResult<()> {
        info!("Starting MCP server with stdio transport");

        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();

        let (result, shutdown_requested) = tokio::select! {
            result = serve(&self.service, reader, writer) => {
                if let Err(e) = &result {
                    warn!(error = %e, "Stdio transport error");
                }
                (result, false)
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                (Ok(()), true)
            }
        };

        if shutdown_requested {
            // Spawn a task to listen for second signal and force exit
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing database connections");
        self.service.query_tool().pool().close().await;

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted
            info!("Exiting process");
            std::process::exit(0);
        }

        result
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
///
/// If a handler cannot be installed that signal is never reported.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
