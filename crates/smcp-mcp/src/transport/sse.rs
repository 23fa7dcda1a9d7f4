//! SSE Transport for MCP
//!
//! The HTTP+SSE flavor of MCP:
//!
//! - `GET /sse` opens a session. The first event (`endpoint`) tells the
//!   client where to POST its messages.
//! - `POST /messages/?session_id=<id>` accepts one JSON-RPC message and
//!   answers `202 Accepted`; the JSON-RPC response arrives later as a
//!   `message` event on the session's stream.
//! - `POST /sse` is rejected with a hint, since some clients try it first.
//! - `GET /health` returns the health document.
//!
//! Closing the event stream ends the session and aborts its running requests.

use crate::protocol::{McpError, McpResult};
use crate::server::McpServer;
use crate::transport::{route_message, InFlight, Outbound};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Path clients POST messages to
pub const MESSAGES_PATH: &str = "/messages/";

/// SSE Transport Configuration
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Address to listen on
    pub bind: SocketAddr,

    /// Interval between keep-alive comments on idle streams
    pub keep_alive: Duration,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl SseConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            ..Default::default()
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }
}

struct Session {
    outbound: Outbound,
    in_flight: InFlight,
}

type Sessions = Arc<RwLock<HashMap<String, Session>>>;

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    sessions: Sessions,
    keep_alive: Duration,
}

/// Removes the session and aborts its requests when the event stream is dropped.
struct SessionGuard {
    session_id: String,
    sessions: Sessions,
    in_flight: InFlight,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session_id = std::mem::take(&mut self.session_id);
        let sessions = Arc::clone(&self.sessions);
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            sessions.write().await.remove(&session_id);
            let aborted = in_flight.cancel_all().await;
            info!(session_id = %session_id, aborted, "SSE session closed");
        });
    }
}

/// SSE Transport
pub struct SseTransport {
    server: Arc<McpServer>,
    config: SseConfig,
}

impl SseTransport {
    pub fn new(server: Arc<McpServer>, config: SseConfig) -> Self {
        Self { server, config }
    }

    /// Build the HTTP routes without binding a socket.
    pub fn router(&self) -> Router {
        let state = AppState {
            server: Arc::clone(&self.server),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            keep_alive: self.config.keep_alive,
        };

        Router::new()
            .route("/sse", get(open_session).post(misdirected_post))
            .route("/messages", post(post_message))
            .route(MESSAGES_PATH, post(post_message))
            .route("/health", get(health))
            .with_state(state)
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> McpResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind)
            .await
            .map_err(|e| McpError::transport(format!("cannot bind {}: {}", self.config.bind, e)))?;
        info!(address = %self.config.bind, "Serving MCP over SSE at /sse");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("SSE transport stopped");
        Ok(())
    }
}

async fn open_session(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let in_flight = InFlight::new();

    state.sessions.write().await.insert(
        session_id.clone(),
        Session {
            outbound: tx,
            in_flight: in_flight.clone(),
        },
    );
    info!(session_id = %session_id, "SSE session opened");

    let endpoint = format!("{}?session_id={}", MESSAGES_PATH, session_id);
    let guard = SessionGuard {
        session_id,
        sessions: Arc::clone(&state.sessions),
        in_flight,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));

        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "session_id is required").into_response();
    };

    let (outbound, in_flight) = {
        let sessions = state.sessions.read().await;
        match sessions.get(&session_id) {
            Some(session) => (session.outbound.clone(), session.in_flight.clone()),
            None => {
                debug!(session_id = %session_id, "Message for unknown session");
                return (StatusCode::NOT_FOUND, "Could not find session").into_response();
            }
        }
    };

    route_message(&state.server, &in_flight, body.trim(), &outbound).await;
    (StatusCode::ACCEPTED, "Accepted").into_response()
}

async fn misdirected_post(body: String) -> Response {
    if body.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Empty POST request").into_response();
    }
    warn!("Client POSTed to /sse instead of the message endpoint");
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": format!(
                "POST requests to /sse should be sent to {} instead. \
                 Use GET /sse to establish the SSE connection, then POST to the endpoint it announces.",
                MESSAGES_PATH
            )
        })),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.server.host().health().await)
}
