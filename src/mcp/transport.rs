//! MCP Transport Layer (stdio)
//!
//! Newline-delimited JSON-RPC: one message per line in each direction.
//! Every request runs on its own task, and responses funnel through a single
//! writer task so lines never interleave. Responses may therefore arrive out
//! of request order; clients match them by id.
//!
//! Nothing but protocol messages is ever written to the output stream.
//!
//! Shutdown stops reading but still answers every call already received.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::protocol::{McpError, McpRequest, McpResponse, RequestId};
use super::server::McpServer;

/// Serve requests from `reader` until EOF or `shutdown`, writing responses to `writer`
///
/// Either way, in-flight calls are awaited and their responses flushed
/// before this returns.
pub async fn serve<R, W>(
    server: McpServer,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<McpResponse>();
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let mut in_flight = JoinSet::new();

    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer reading requests");
                break;
            }
        };
        let Some(line) = line else {
            info!("Input closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("Received: {}", line);

        let request = match parse_request(line) {
            Ok(request) => request,
            Err(response) => {
                let _ = tx.send(*response);
                continue;
            }
        };

        let server = server.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = server.handle(request).await {
                // The writer only stops once every sender is gone
                let _ = tx.send(response);
            }
        });

        // Reap finished tasks so the set does not grow without bound
        while in_flight.try_join_next().is_some() {}
    }

    info!(pending = in_flight.len(), "Draining in-flight requests");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            warn!("Request task failed: {}", e);
        }
    }
    drop(tx);

    writer_task.await.context("Response writer panicked")?
}

/// Parse one line, or produce the error response for it
fn parse_request(line: &str) -> Result<McpRequest, Box<McpResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!("Unparsable message: {}", e);
        Box::new(McpResponse::err(None, McpError::parse_error(format!("Parse error: {}", e))))
    })?;

    serde_json::from_value::<McpRequest>(value.clone()).map_err(|e| {
        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
        Box::new(McpResponse::err(
            id,
            McpError::invalid_request(format!("Invalid request: {}", e)),
        ))
    })
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<McpResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let json = serde_json::to_string(&response).context("Failed to serialize MCP response")?;
        debug!("Sending: {}", json);

        writer
            .write_all(json.as_bytes())
            .await
            .context("Failed to write to stdout")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline to stdout")?;
        writer.flush().await.context("Failed to flush stdout")?;
    }
    Ok(())
}
