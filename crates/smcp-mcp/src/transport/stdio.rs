//! Stdio Transport for MCP
//!
//! Serves a single client over the process's own stdin/stdout using
//! newline-delimited JSON. Nothing but protocol messages may be written to
//! stdout; logs go to stderr.

use crate::protocol::McpResult;
use crate::server::McpServer;
use crate::transport::{route_message, InFlight};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Stdio Transport
pub struct StdioTransport {
    server: Arc<McpServer>,
}

impl StdioTransport {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn run(self) -> McpResult<()> {
        info!("Serving MCP over stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve on arbitrary streams until `reader` reaches end of input.
    ///
    /// Requests still running at that point are allowed to finish and their
    /// responses are written before this returns.
    pub async fn serve<R, W>(self, mut reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(write_lines(rx, writer));
        let in_flight = InFlight::new();

        let mut line = String::new();
        let read_result = loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    let message = line.trim();
                    if message.is_empty() {
                        continue;
                    }
                    trace!(message = %message, "Received message");
                    route_message(&self.server, &in_flight, message, &tx).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from stdin");
                    break Err(e.into());
                }
            }
        };

        // Each request task holds a sender clone, so the writer drains
        // until the last one finishes.
        let pending = in_flight.len().await;
        if pending > 0 {
            debug!(pending, "Input closed, waiting for in-flight requests");
        }
        drop(tx);
        if let Err(e) = writer_task.await {
            error!(error = %e, "Writer task failed");
        }
        info!("Stdio transport closed");
        read_result
    }
}

async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<String>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        trace!(message = %message, "Sending message");
        let written = async {
            writer.write_all(message.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            error!(error = %e, "Failed to write to stdout");
            break;
        }
    }
}
