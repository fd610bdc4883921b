//! MCP shell for the work-item orchestration engine
//!
//! The JSON-RPC/tool surface: error mapping to JSON-RPC codes, the
//! `{success, data?, error?}` result envelopes, the handler wiring the
//! engine behind named tools, and the HTTP transport. The STDIO transport
//! lives in the server binary.

pub mod error;
pub mod handler;
pub mod serialization;
pub mod server;

pub use error::McpError;
pub use handler::{McpItemHandler, TOOL_NAMES};
pub use server::McpServer;
