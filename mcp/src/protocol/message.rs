//! The three JSON-RPC 2.0 message shapes, as one line of input decodes to them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JsonRpcError;

const VERSION: &str = "2.0";

/// Correlates a response with its request.
///
/// [`RequestId::Null`] only appears on error responses to input whose id could not be
/// read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// `"id": "abc"`
    String(String),
    /// `"id": 7`
    Number(i64),
    /// `"id": null`
    Null,
}

/// A call the client expects an answer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`; not checked on input.
    pub jsonrpc: String,
    /// Echoed back on the response.
    pub id: RequestId,
    /// For example `tools/call`.
    pub method: String,
    /// Method-specific; decoded by the handler for `method`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// The answer to one [`JsonRpcRequest`]. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// The id of the request being answered.
    pub id: RequestId,
    /// Set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Answers `id` with `result`.
    ///
    /// If `result` cannot be serialized, an internal error response is returned instead.
    #[must_use]
    pub fn success(id: RequestId, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(result) => Self {
                jsonrpc: VERSION.to_string(),
                id,
                result: Some(result),
                error: None,
            },
            Err(e) => Self::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    /// Answers `id` with `error`.
    #[must_use]
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Whether this answers with an error object.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A message without an id. Nothing is sent back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`; not checked on input.
    pub jsonrpc: String,
    /// For example `notifications/initialized`.
    pub method: String,
    /// Ignored by this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Whatever one input line decoded to.
///
/// Variants are tried in order, so a line with both `id` and `method` is a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Has `id` and `method`.
    Request(JsonRpcRequest),
    /// Has `id` and `result` or `error`. A server does not expect these.
    Response(JsonRpcResponse),
    /// Has `method` only.
    Notification(JsonRpcNotification),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> JsonRpcMessage {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn distinguishes_message_kinds() {
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#),
            JsonRpcMessage::Request(JsonRpcRequest { id: RequestId::Number(1), .. })
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":"a","method":"ping","params":{}}"#),
            JsonRpcMessage::Request(JsonRpcRequest { id: RequestId::String(_), .. })
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
            JsonRpcMessage::Notification(_)
        ));
        assert!(matches!(
            decode(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#),
            JsonRpcMessage::Response(_)
        ));
    }

    #[test]
    fn null_id_serializes_as_null() {
        let response = JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error("bad"));
        assert!(response.is_error());
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["id"].is_null());
        assert_eq!(value["error"]["code"], -32700);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn success_omits_error() {
        let response = JsonRpcResponse::success(
            RequestId::String("list".into()),
            serde_json::json!({"tools": []}),
        );
        assert!(!response.is_error());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({"jsonrpc": "2.0", "id": "list", "result": {"tools": []}})
        );
    }
}
