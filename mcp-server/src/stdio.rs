//! STDIO transport for the MCP server
//!
//! Line-based JSON-RPC 2.0 over stdin/stdout with the MCP
//! initialize/initialized handshake, then `tools/list` and `tools/call`
//! dispatch. Tool results are wrapped as MCP text content carrying the
//! `{success, data?, error?}` envelope.

use anyhow::{Context, Result};
use mcp_protocol::{McpError, McpItemHandler};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use item_core::repository::OrchestratorStore;

/// MCP protocol state tracking
#[derive(Debug, PartialEq)]
enum McpState {
    /// Waiting for the initialize request from the client
    WaitingForInitialize,
    /// Initialize answered, waiting for the initialized notification
    WaitingForInitialized,
    /// Ready to process requests
    Ready,
}

/// STDIO MCP server with protocol state management.
pub struct StdioMcpServer<S> {
    handler: McpItemHandler<S>,
    state: McpState,
}

impl<S: OrchestratorStore + 'static> StdioMcpServer<S> {
    pub fn new(handler: McpItemHandler<S>) -> Self {
        Self {
            handler,
            state: McpState::WaitingForInitialize,
        }
    }

    /// Serve until stdin closes.
    pub async fn serve(mut self) -> Result<()> {
        info!("starting MCP server in STDIO mode, waiting for initialize");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("stdin closed, shutting down");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!("received line: {trimmed}");

                    match self.process_message(trimmed).await {
                        Ok(Some(response)) => {
                            let payload = serde_json::to_string(&response)
                                .context("failed to serialize JSON-RPC response")?;
                            stdout.write_all(payload.as_bytes()).await?;
                            stdout.write_all(b"\n").await?;
                            stdout.flush().await?;
                        }
                        Ok(None) => {
                            debug!("processed notification");
                        }
                        Err(e) => {
                            error!("error processing message: {e}");
                            let id = serde_json::from_str::<Value>(trimmed)
                                .ok()
                                .and_then(|v| v.get("id").cloned());
                            let response =
                                McpError::Protocol(e.to_string()).to_json_rpc_error(id);
                            let payload = serde_json::to_string(&response).unwrap_or_else(|_| {
                                r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"internal error"},"id":null}"#.to_string()
                            });
                            let _ = stdout.write_all(payload.as_bytes()).await;
                            let _ = stdout.write_all(b"\n").await;
                            let _ = stdout.flush().await;
                        }
                    }
                }
                Err(e) => {
                    error!("error reading from stdin: {e}");
                    break;
                }
            }
        }

        info!("STDIO MCP server shutdown complete");
        Ok(())
    }

    /// Process one request or notification.
    async fn process_message(&mut self, line: &str) -> Result<Option<Value>> {
        let message: Value =
            serde_json::from_str(line).context("failed to parse JSON-RPC message")?;

        if message.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            anyhow::bail!("invalid JSON-RPC version");
        }
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .context("missing or invalid 'method' field")?;
        let id = message.get("id").cloned();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let is_notification = id.is_none();

        match (&self.state, method) {
            (McpState::WaitingForInitialize, "initialize") => {
                if is_notification {
                    anyhow::bail!("initialize must be a request, not a notification");
                }
                info!("received initialize request");
                self.state = McpState::WaitingForInitialized;

                Ok(Some(json!({
                    "jsonrpc": "2.0",
                    "result": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": {
                            "tools": { "listChanged": false }
                        },
                        "serverInfo": {
                            "name": "loom-mcp",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    },
                    "id": id
                })))
            }

            (McpState::WaitingForInitialized, "notifications/initialized") => {
                if !is_notification {
                    anyhow::bail!("initialized must be a notification, not a request");
                }
                info!("received initialized notification, server is ready");
                self.state = McpState::Ready;
                Ok(None)
            }

            (McpState::Ready, _) if is_notification => {
                match method {
                    "notifications/cancelled" => debug!("received cancelled notification"),
                    other => warn!("unknown notification method: {other}"),
                }
                Ok(None)
            }

            (McpState::Ready, "ping") => Ok(Some(json!({
                "jsonrpc": "2.0",
                "result": {},
                "id": id
            }))),

            (McpState::Ready, "tools/list") => Ok(Some(json!({
                "jsonrpc": "2.0",
                "result": { "tools": tool_descriptors() },
                "id": id
            }))),

            (McpState::Ready, "tools/call") => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .context("tools/call requires a tool name")?;
                let arguments = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| json!({}));

                match self.handler.dispatch_tool(name, arguments).await {
                    Ok(envelope) => {
                        let is_error = envelope
                            .get("success")
                            .and_then(Value::as_bool)
                            .map(|success| !success)
                            .unwrap_or(false);
                        Ok(Some(json!({
                            "jsonrpc": "2.0",
                            "result": {
                                "content": [{
                                    "type": "text",
                                    "text": envelope.to_string()
                                }],
                                "isError": is_error
                            },
                            "id": id
                        })))
                    }
                    Err(e) => Ok(Some(e.to_json_rpc_error(id))),
                }
            }

            (McpState::Ready, other) => Ok(Some(
                McpError::Protocol(format!("unknown method: {other}")).to_json_rpc_error(id),
            )),

            _ => anyhow::bail!(
                "invalid method '{}' for current state {:?}",
                method,
                self.state
            ),
        }
    }
}

/// Tool descriptors for `tools/list`, with JSON input schemas.
fn tool_descriptors() -> Value {
    json!([
        {
            "name": "advance_item",
            "description": "Apply lifecycle triggers to work items, with dependency gating, gate checks, parent cascades and unblock reporting",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "transitions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "itemId": {"type": "string"},
                                "trigger": {"type": "string", "enum": ["start", "complete", "cancel", "block", "hold", "resume"]},
                                "summary": {"type": "string"},
                                "statusLabel": {"type": "string"},
                                "applyCascade": {"type": "boolean"}
                            },
                            "required": ["itemId", "trigger"]
                        }
                    }
                },
                "required": ["transitions"]
            }
        },
        {
            "name": "complete_tree",
            "description": "Bulk-complete or bulk-cancel a subtree or item set in dependency order, skipping the downstream cone of failures",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "rootId": {"type": "string"},
                    "itemIds": {"type": "array", "items": {"type": "string"}},
                    "trigger": {"type": "string", "enum": ["complete", "cancel"]}
                },
                "required": ["trigger"]
            }
        },
        {
            "name": "get_blocked_items",
            "description": "List items that are parked or held back by unsatisfied dependencies, with their blocker chains",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parentId": {"type": "string"},
                    "includeItemDetails": {"type": "boolean"},
                    "includeAncestors": {"type": "boolean"}
                }
            }
        },
        {
            "name": "get_next_item",
            "description": "Recommend unblocked, non-terminal items to pick up next",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "parentId": {"type": "string"},
                    "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                    "limit": {"type": "integer"}
                }
            }
        },
        {
            "name": "get_next_status",
            "description": "Compute readiness, the next role and the trigger to use for one item",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "itemId": {"type": "string"}
                },
                "required": ["itemId"]
            }
        },
        {
            "name": "get_context",
            "description": "Item context (itemId), session-resume context (since), or a health check (neither)",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "itemId": {"type": "string"},
                    "since": {"type": "string", "format": "date-time"}
                }
            }
        },
        {
            "name": "manage_items",
            "description": "Create, update or delete work items",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["create", "update", "delete"]},
                    "items": {"type": "array", "items": {"type": "object"}},
                    "updates": {"type": "array", "items": {"type": "object"}},
                    "ids": {"type": "array", "items": {"type": "string"}},
                    "cascade": {"type": "boolean"}
                },
                "required": ["operation"]
            }
        },
        {
            "name": "manage_dependencies",
            "description": "Create or delete dependency edges between work items",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["create", "createBatch", "delete"]},
                    "dependency": {"type": "object"},
                    "dependencies": {"type": "array", "items": {"type": "object"}},
                    "id": {"type": "string"}
                },
                "required": ["operation"]
            }
        },
        {
            "name": "manage_notes",
            "description": "Upsert or delete notes keyed per item",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["upsert", "delete"]},
                    "note": {"type": "object"},
                    "itemId": {"type": "string"},
                    "key": {"type": "string"}
                },
                "required": ["operation"]
            }
        },
        {
            "name": "query_items",
            "description": "Fetch one work item by id or list items by filter",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "parentId": {"type": "string"},
                    "role": {"type": "string", "enum": ["queue", "work", "review", "terminal", "blocked"]},
                    "priority": {"type": "string", "enum": ["high", "medium", "low"]},
                    "tag": {"type": "string"},
                    "limit": {"type": "integer"},
                    "offset": {"type": "integer"}
                }
            }
        },
        {
            "name": "query_notes",
            "description": "List the notes of a work item",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "itemId": {"type": "string"},
                    "key": {"type": "string"}
                },
                "required": ["itemId"]
            }
        },
        {
            "name": "health_check",
            "description": "Check server and database health",
            "inputSchema": {
                "type": "object"
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use item_core::schema::NoOpNoteSchemaService;
    use mocks::MemoryStore;
    use std::sync::Arc;

    fn server() -> StdioMcpServer<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        StdioMcpServer::new(McpItemHandler::new(store, Arc::new(NoOpNoteSchemaService)))
    }

    #[tokio::test]
    async fn handshake_then_tools_list() {
        let mut server = server();

        let response = server
            .process_message(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response["result"]["serverInfo"]["name"], "loom-mcp");

        let none = server
            .process_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .unwrap();
        assert!(none.is_none());

        let response = server
            .process_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap()
            .unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 12);
        assert_eq!(tools[0]["name"], "advance_item");
    }

    #[tokio::test]
    async fn tools_call_wraps_the_envelope() {
        let mut server = server();
        server.state = McpState::Ready;

        let response = server
            .process_message(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"health_check","arguments":{}}}"#,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response["result"]["isError"], false);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["success"], true);
    }

    #[tokio::test]
    async fn requests_before_initialize_are_rejected() {
        let mut server = server();
        let result = server
            .process_message(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .await;
        assert!(result.is_err());
    }
}
