//! Error handling for the MCP shell
//!
//! Maps the domain taxonomy to MCP-compliant JSON-RPC error codes.

use item_core::WorkItemError;
use serde_json::{json, Value};
use thiserror::Error;

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("state machine rejected the transition: {0}")]
    Transition(String),

    #[error("graph integrity violation: {0}")]
    Graph(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl McpError {
    /// Convert to a JSON-RPC error code
    pub fn to_error_code(&self) -> i32 {
        match self {
            McpError::NotFound(_) => -32001,
            McpError::Validation(_) => -32002,
            McpError::Transition(_) => -32003,
            McpError::Graph(_) => -32004,
            McpError::Database(_) => -32005,
            McpError::Protocol(_) => -32006,
            McpError::Serialization(_) => -32007,
        }
    }

    /// Convert to a JSON-RPC error response
    pub fn to_json_rpc_error(&self, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.to_error_code(),
                "message": self.to_string()
            },
            "id": id
        })
    }
}

impl From<WorkItemError> for McpError {
    fn from(err: WorkItemError) -> Self {
        match &err {
            WorkItemError::NotFound(_) => McpError::NotFound(err.to_string()),
            WorkItemError::Validation(_)
            | WorkItemError::InvalidRole(_)
            | WorkItemError::InvalidTrigger(_) => McpError::Validation(err.to_string()),
            WorkItemError::InvalidRoleForTrigger { .. }
            | WorkItemError::AlreadyTerminal(_)
            | WorkItemError::AlreadyBlocked(_)
            | WorkItemError::NotBlocked(_)
            | WorkItemError::ItemBlocked(_)
            | WorkItemError::CannotBlockTerminal(_)
            | WorkItemError::MissingPreviousRole(_)
            | WorkItemError::BlockedByDependency(_)
            | WorkItemError::GateCheckFailed(_) => McpError::Transition(err.to_string()),
            WorkItemError::CyclicDependency(_)
            | WorkItemError::DuplicateDependency(_)
            | WorkItemError::SelfDependency(_)
            | WorkItemError::MaxDepthExceeded => McpError::Graph(err.to_string()),
            WorkItemError::Conflict(_) | WorkItemError::Database(_) => {
                McpError::Database(err.to_string())
            }
            WorkItemError::Serialization(_) => McpError::Serialization(err.to_string()),
            WorkItemError::Protocol(_)
            | WorkItemError::Configuration(_)
            | WorkItemError::Internal(_) => McpError::Protocol(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for McpError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(domain) = err.downcast_ref::<WorkItemError>() {
            return Self::from(domain.clone());
        }
        McpError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::NotFound("x".into()).to_error_code(), -32001);
        assert_eq!(McpError::Validation("x".into()).to_error_code(), -32002);
        assert_eq!(McpError::Transition("x".into()).to_error_code(), -32003);
        assert_eq!(McpError::Database("x".into()).to_error_code(), -32005);
    }

    #[test]
    fn test_json_rpc_error_shape() {
        let error = McpError::NotFound("item".into());
        let payload = error.to_json_rpc_error(Some(json!(1)));
        assert_eq!(payload["jsonrpc"], "2.0");
        assert_eq!(payload["error"]["code"], -32001);
        assert_eq!(payload["id"], 1);
    }

    #[test]
    fn test_domain_error_mapping() {
        let err = McpError::from(WorkItemError::AlreadyTerminal(Uuid::nil()));
        assert!(matches!(err, McpError::Transition(_)));

        let err = McpError::from(WorkItemError::SelfDependency(Uuid::nil()));
        assert!(matches!(err, McpError::Graph(_)));
    }
}
