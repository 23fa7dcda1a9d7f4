//! MCP transports
//!
//! Both transports read JSON-RPC messages, run every request in its own
//! task and hand serialized responses to an outbound channel. Requests can
//! be cancelled with `notifications/cancelled`; aborting the task drops the
//! plugin process with it.

#[cfg(feature = "sse")]
pub mod sse;
#[cfg(feature = "stdio")]
pub mod stdio;

use crate::protocol::{IncomingMessage, RequestId};
use crate::server::{cancelled_request, McpServer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[cfg(feature = "sse")]
pub use sse::{SseConfig, SseTransport};
#[cfg(feature = "stdio")]
pub use stdio::StdioTransport;

/// Outbound channel of serialized messages
pub type Outbound = mpsc::UnboundedSender<String>;

/// A running request task; `generation` tells apart tasks that reused an id.
#[derive(Debug)]
struct Running {
    generation: u64,
    handle: AbortHandle,
}

/// Request tasks that are still running, by request id
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    tasks: Arc<Mutex<HashMap<RequestId, Running>>>,
    generations: Arc<AtomicU64>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the handler for `request_id`, tracked until it finishes.
    async fn spawn<F>(&self, request_id: RequestId, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        // The lock is held across spawn so the task can't finish (and
        // deregister) before it is registered.
        let mut tasks = self.tasks.lock().await;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let registry = self.clone();
        let id = request_id.clone();
        let handle = tokio::spawn(async move {
            task.await;
            // A reused id may have replaced this entry; leave that one alone.
            let mut tasks = registry.tasks.lock().await;
            if tasks.get(&id).is_some_and(|running| running.generation == generation) {
                tasks.remove(&id);
            }
        });
        let running = Running {
            generation,
            handle: handle.abort_handle(),
        };
        if tasks.insert(request_id, running).is_some() {
            warn!("Duplicate request id while a request with the same id is in flight");
        }
    }

    /// Abort the task handling `request_id`. Returns false if it already finished.
    pub async fn cancel(&self, request_id: &RequestId) -> bool {
        match self.tasks.lock().await.remove(request_id) {
            Some(running) => {
                running.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort everything still running.
    pub async fn cancel_all(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let count = tasks.len();
        for (_, running) in tasks.drain() {
            running.handle.abort();
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }
}

/// Route one raw message: answer it, spawn it, or act on it.
pub async fn route_message(
    server: &Arc<McpServer>,
    in_flight: &InFlight,
    raw: &str,
    outbound: &Outbound,
) {
    match IncomingMessage::parse(raw) {
        IncomingMessage::Request(request) => {
            let Some(request_id) = request.id.clone() else {
                return;
            };
            let server = Arc::clone(server);
            let outbound = outbound.clone();
            in_flight
                .spawn(request_id, async move {
                    let response = server.handle_request(request).await;
                    if outbound.send(response.to_line()).is_err() {
                        debug!("Client went away before the response was sent");
                    }
                })
                .await;
        }
        IncomingMessage::Notification(notification) => {
            if let Some(cancelled) = cancelled_request(&notification) {
                let aborted = in_flight.cancel(&cancelled.request_id).await;
                debug!(
                    request_id = %cancelled.request_id,
                    reason = ?cancelled.reason,
                    aborted,
                    "Request cancelled by client"
                );
            } else {
                server.handle_notification(&notification);
            }
        }
        IncomingMessage::Response => debug!("Ignoring response message from client"),
        IncomingMessage::Invalid(response) => {
            warn!(error = ?response.error, "Rejected malformed message");
            let _ = outbound.send(response.to_line());
        }
    }
}
