//! Params and results of the MCP methods this server answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP revision spoken here.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// `initialize` params.
///
/// Every field is optional on input; the server only logs them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InitializeParams {
    /// Revision the client asked for. The server answers with its own regardless.
    pub protocol_version: String,
    /// Not inspected.
    pub capabilities: Value,
    /// Who is connecting.
    pub client_info: ClientInfo,
}

/// `clientInfo` inside [`InitializeParams`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    /// For example `claude-desktop`.
    pub name: String,
    /// Free-form.
    pub version: String,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Always [`PROTOCOL_VERSION`].
    pub protocol_version: String,
    /// Only tools are offered.
    pub capabilities: ServerCapabilities,
    /// Name and version given to the server at construction.
    pub server_info: ServerInfo,
}

/// How the server names itself in `initialize`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    /// `file-server` for the binary.
    pub name: String,
    /// Left out of the JSON when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `capabilities` in [`InitializeResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Present when `tools/list` and `tools/call` are served.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

/// Serializes as `{}`: the tool set never changes while serving.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {}

/// One entry of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDefinition {
    /// Name used in `tools/call`.
    pub name: String,
    /// Shown to the model choosing a tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the `arguments` object.
    pub input_schema: Value,
}

/// `tools/list` result. Everything fits on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Every registered tool, sorted by name.
    pub tools: Vec<McpToolDefinition>,
}

/// `tools/call` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Registered tool to run.
    pub name: String,
    /// Tool arguments. Absent arguments are treated as an empty object.
    #[serde(default)]
    pub arguments: Value,
}

impl CallToolParams {
    /// The arguments as a JSON string, with `null` replaced by `{}`.
    #[must_use]
    pub fn arguments_json(&self) -> String {
        if self.arguments.is_null() {
            "{}".to_string()
        } else {
            self.arguments.to_string()
        }
    }
}

/// `tools/call` result: the tool's output, or its error message with `isError` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// A single text block.
    pub content: Vec<Content>,
    /// Omitted from the JSON when false.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Wraps tool output.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::single(text.into(), false)
    }

    /// Wraps a tool failure.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::single(message.into(), true)
    }

    fn single(text: String, is_error: bool) -> Self {
        Self {
            content: vec![Content::Text(TextContent { text })],
            is_error,
        }
    }
}

/// A block of `content`, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// `{"type": "text", "text": ...}`
    Text(TextContent),
}

/// Body of [`Content::Text`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// Tool output or error message.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_tool_result_wire_format() {
        let ok = serde_json::to_value(CallToolResult::text("done")).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"content": [{"type": "text", "text": "done"}]})
        );

        let err = serde_json::to_value(CallToolResult::error("nope")).unwrap();
        assert_eq!(err["isError"], true);
    }

    #[test]
    fn missing_arguments_become_empty_object() {
        let params: CallToolParams =
            serde_json::from_value(serde_json::json!({"name": "list_files"})).unwrap();
        assert_eq!(params.arguments_json(), "{}");

        let params: CallToolParams = serde_json::from_value(
            serde_json::json!({"name": "read_file", "arguments": {"file_path": "a"}}),
        )
        .unwrap();
        assert_eq!(params.arguments_json(), r#"{"file_path":"a"}"#);
    }

    #[test]
    fn lenient_initialize_params() {
        let params: InitializeParams = serde_json::from_value(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "inspector"},
        }))
        .unwrap();
        assert_eq!(params.client_info.name, "inspector");
        assert!(params.capabilities.is_null());
    }

    #[test]
    fn capabilities_advertise_tools_only() {
        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability::default()),
        };
        assert_eq!(
            serde_json::to_value(capabilities).unwrap(),
            serde_json::json!({"tools": {}})
        );
    }
}
