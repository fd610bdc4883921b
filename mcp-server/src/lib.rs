//! Server assembly for the work-item orchestration MCP server
//!
//! Configuration, telemetry, store setup and the STDIO transport; the
//! binary in `main.rs` wires these together.

pub mod config;
pub mod setup;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use stdio::StdioMcpServer;
