//! HTTP transport: JSON-RPC endpoint plus an SSE event stream
//!
//! `POST /mcp/v1/rpc` carries JSON-RPC 2.0 tool calls, `GET /mcp/v1`
//! serves the SSE channel with a heartbeat, `GET /health` is a liveness
//! probe.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Sse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::{
    error::McpError,
    handler::{McpItemHandler, TOOL_NAMES},
    serialization::create_success_response,
};
use item_core::{repository::OrchestratorStore, ProtocolHandler};

/// MCP server over HTTP.
pub struct McpServer<S> {
    handler: Arc<McpItemHandler<S>>,
}

impl<S: OrchestratorStore + 'static> McpServer<S> {
    pub fn new(handler: McpItemHandler<S>) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Bind and serve until the listener fails.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let app = self.into_router();
        info!("starting MCP HTTP server on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Build the router; exposed separately for tests.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/mcp/v1", get(sse_handler::<S>))
            .route("/mcp/v1/rpc", post(rpc_handler::<S>))
            .route("/health", get(health_handler::<S>))
            .with_state(self.handler)
    }
}

/// SSE endpoint: connection-established event, then heartbeats.
async fn sse_handler<S: OrchestratorStore + 'static>(
    State(_handler): State<Arc<McpItemHandler<S>>>,
) -> Result<Sse<UnboundedReceiverStream<Result<axum::response::sse::Event, axum::Error>>>, StatusCode>
{
    let (tx, rx) = mpsc::unbounded_channel();

    let welcome = axum::response::sse::Event::default().data(
        json!({
            "jsonrpc": "2.0",
            "method": "connection_established",
            "params": {
                "server": "loom-mcp",
                "version": item_core::VERSION,
                "capabilities": TOOL_NAMES,
            }
        })
        .to_string(),
    );
    if tx.send(Ok(welcome)).is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let heartbeat_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let heartbeat = axum::response::sse::Event::default()
                .event("heartbeat")
                .data("ping");
            if heartbeat_tx.send(Ok(heartbeat)).is_err() {
                break;
            }
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)))
}

/// JSON-RPC endpoint: tool name as method, tool parameters as params.
async fn rpc_handler<S: OrchestratorStore + 'static>(
    State(handler): State<Arc<McpItemHandler<S>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    debug!("received RPC request: {request}");
    let id = request.get("id").cloned();

    if request.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Json(
            McpError::Protocol("invalid JSON-RPC version".to_string()).to_json_rpc_error(id),
        );
    }
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return Json(
            McpError::Protocol("missing 'method' field".to_string()).to_json_rpc_error(id),
        );
    };
    let params = request
        .get("params")
        .cloned()
        .unwrap_or_else(|| json!({}));

    match handler.dispatch_tool(method, params).await {
        Ok(envelope) => Json(create_success_response(id, envelope)),
        Err(error) => Json(error.to_json_rpc_error(id)),
    }
}

/// Liveness probe backed by the store health check.
async fn health_handler<S: OrchestratorStore + 'static>(
    State(handler): State<Arc<McpItemHandler<S>>>,
) -> (StatusCode, Json<Value>) {
    match handler.health_check().await {
        Ok(health) => (
            StatusCode::OK,
            Json(serde_json::to_value(health).unwrap_or_else(|_| json!({"status": "healthy"}))),
        ),
        Err(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "error": error.to_string()})),
        ),
    }
}
