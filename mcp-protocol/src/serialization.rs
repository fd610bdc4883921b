//! Envelope and parameter plumbing for the tool surface
//!
//! Every tool result is a `{success, data?, error?}` envelope. Parameter
//! validation failures produce a `success: false` envelope rather than a
//! JSON-RPC error: the call itself succeeded, the tool reports failure.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::McpError;
use item_core::WorkItemError;

/// Deserialize tool parameters, reporting a field-precise message.
pub fn deserialize_params<T>(params: Value) -> Result<T, WorkItemError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(params)
        .map_err(|e| WorkItemError::Validation(format!("invalid parameters: {e}")))
}

/// Build the success envelope around a tool payload.
pub fn success_envelope<T: Serialize>(data: &T) -> Result<Value, McpError> {
    let data = serde_json::to_value(data).map_err(|e| McpError::Serialization(e.to_string()))?;
    Ok(json!({ "success": true, "data": data }))
}

/// Build the failure envelope from a domain error.
pub fn error_envelope(error: &WorkItemError) -> Value {
    json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "code": error.code(),
        }
    })
}

/// Fold a handler result into the envelope.
pub fn result_envelope<T: Serialize>(result: item_core::Result<T>) -> Result<Value, McpError> {
    match result {
        Ok(data) => success_envelope(&data),
        Err(error) => Ok(error_envelope(&error)),
    }
}

/// Create a JSON-RPC success response.
pub fn create_success_response(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use item_core::protocol::GetNextStatusParams;

    #[test]
    fn test_deserialize_reports_field_errors() {
        let result: Result<GetNextStatusParams, _> =
            deserialize_params(json!({"itemId": "not-a-uuid"}));
        let err = result.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(err.to_string().contains("invalid parameters"));
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = success_envelope(&json!({"total": 3})).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"]["total"], 3);

        let err = error_envelope(&WorkItemError::Validation("bad".into()));
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["code"], "VALIDATION");
    }

    #[test]
    fn test_result_envelope_folds_both_arms() {
        let ok: item_core::Result<Value> = Ok(json!([1, 2]));
        assert_eq!(result_envelope(ok).unwrap()["success"], true);

        let failed: item_core::Result<Value> = Err(WorkItemError::NotFound("x".into()));
        assert_eq!(result_envelope(failed).unwrap()["success"], false);
    }
}
