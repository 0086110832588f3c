//! MCP server that exposes a [`Tools`] registry.

use confine_core::Tools;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures_lite::{StreamExt, future};
use tracing::{debug, info, warn};

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpError, McpToolDefinition,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::transport::{StdioTransport, Transport};

/// MCP server answering `initialize`, `ping`, `tools/list`, and `tools/call`.
///
/// Tool calls run concurrently and are answered as they finish, so a slow command does
/// not hold up other requests. Everything else is answered in arrival order.
///
/// # Example
///
/// ```no_run
/// use confine_core::Tools;
/// use confine_mcp::McpServer;
///
/// # async fn serve() -> Result<(), confine_mcp::McpError> {
/// let tools = Tools::new();
/// let mut server = McpServer::stdio(tools, "file-server", env!("CARGO_PKG_VERSION"))?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct McpServer<T: Transport> {
    transport: T,
    handler: Handler,
}

impl<T: Transport> std::fmt::Debug for McpServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("info", &self.handler.info)
            .field("tools", &self.handler.tools)
            .finish_non_exhaustive()
    }
}

impl McpServer<StdioTransport> {
    /// Create an MCP server speaking over stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if stdio cannot be initialized.
    pub fn stdio(
        tools: Tools,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, McpError> {
        Ok(Self::new(StdioTransport::stdio()?, tools, name, version))
    }
}

impl<T: Transport> McpServer<T> {
    /// Create a new MCP server with a custom transport.
    #[must_use]
    pub fn new(
        transport: T,
        tools: Tools,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            handler: Handler {
                tools,
                info: ServerInfo {
                    name: name.into(),
                    version: Some(version.into()),
                },
            },
        }
    }

    /// Run the server main loop.
    ///
    /// Serves until the client closes the connection, then answers the tool calls still
    /// running. Undecodable input lines are answered with an error carrying a `null` id
    /// and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from or writing to the transport fails.
    pub async fn run(&mut self) -> Result<(), McpError> {
        let transport = &mut self.transport;
        let handler = &self.handler;
        info!(name = %handler.info.name, tools = ?handler.tools, "MCP server started");

        let mut in_flight: FuturesUnordered<BoxFuture<'_, JsonRpcResponse>> =
            FuturesUnordered::new();
        loop {
            let event = if in_flight.is_empty() {
                Event::Received(transport.recv().await)
            } else {
                future::or(
                    async {
                        match in_flight.next().await {
                            Some(response) => Event::Finished(response),
                            None => future::pending().await,
                        }
                    },
                    async { Event::Received(transport.recv().await) },
                )
                .await
            };

            match event {
                Event::Finished(response) => transport.respond(response).await?,
                Event::Received(Ok(Some(msg))) => match handler.handle_message(msg) {
                    Reply::Now(response) => transport.respond(response).await?,
                    Reply::Later(call) => in_flight.push(call),
                    Reply::Nothing => {}
                },
                Event::Received(Ok(None)) => {
                    debug!(pending = in_flight.len(), "Connection closed");
                    break;
                }
                Event::Received(Err(McpError::Serialization(e))) => {
                    warn!(error = %e, "Undecodable message");
                    let response =
                        JsonRpcResponse::error(RequestId::Null, JsonRpcError::undecodable(&e));
                    transport.respond(response).await?;
                }
                Event::Received(Err(e)) => return Err(e),
            }
        }

        while let Some(response) = in_flight.next().await {
            transport.respond(response).await?;
        }
        transport.close().await
    }
}

/// What woke the main loop.
enum Event {
    Received(Result<Option<JsonRpcMessage>, McpError>),
    Finished(JsonRpcResponse),
}

/// How a message is answered.
enum Reply<'a> {
    Now(JsonRpcResponse),
    /// A tool call whose response is ready when the future is.
    Later(BoxFuture<'a, JsonRpcResponse>),
    Nothing,
}

/// Request handling, shared by the main loop and running tool calls.
struct Handler {
    tools: Tools,
    info: ServerInfo,
}

impl Handler {
    /// Handle an incoming JSON-RPC message.
    fn handle_message(
        &self,
        msg: JsonRpcMessage,
    ) -> Reply<'_> {
        match msg {
            JsonRpcMessage::Request(req) => self.handle_request(req),
            JsonRpcMessage::Notification(notif) => {
                if notif.method == "notifications/initialized" {
                    debug!("Client initialized");
                } else {
                    debug!("Ignoring notification: {}", notif.method);
                }
                Reply::Nothing
            }
            JsonRpcMessage::Response(_) => {
                debug!("Unexpected response message");
                Reply::Nothing
            }
        }
    }

    /// Handle an incoming request.
    fn handle_request(
        &self,
        req: JsonRpcRequest,
    ) -> Reply<'_> {
        debug!("Handling request: {}", req.method);

        match req.method.as_str() {
            "initialize" => Reply::Now(self.handle_initialize(req)),
            "ping" => Reply::Now(JsonRpcResponse::success(req.id, serde_json::json!({}))),
            "tools/list" => Reply::Now(self.handle_list_tools(req)),
            "tools/call" => self.handle_call_tool(req),
            method => Reply::Now(JsonRpcResponse::error(
                req.id,
                JsonRpcError::method_not_found(method),
            )),
        }
    }

    /// Handle initialize request.
    fn handle_initialize(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: InitializeParams = match req.params.map(serde_json::from_value).transpose() {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                return JsonRpcResponse::error(
                    req.id,
                    JsonRpcError::invalid_params(e.to_string()),
                );
            }
        };

        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            protocol = %params.protocol_version,
            "Client connected"
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.info.clone(),
        };

        JsonRpcResponse::success(req.id, result)
    }

    /// Handle tools/list request.
    fn handle_list_tools(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let tools = self
            .tools
            .definitions()
            .iter()
            .map(|def| McpToolDefinition {
                name: def.name().to_string(),
                description: Some(def.description().to_string()),
                input_schema: def.input_schema(),
            })
            .collect();

        JsonRpcResponse::success(req.id, ListToolsResult { tools })
    }

    /// Handle tools/call request.
    ///
    /// Bad params are answered at once. The call itself becomes a future whose response
    /// is a success whose result is flagged `isError` if the tool fails.
    fn handle_call_tool(
        &self,
        req: JsonRpcRequest,
    ) -> Reply<'_> {
        let params: CallToolParams = match req.params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return Reply::Now(JsonRpcResponse::error(
                    req.id,
                    JsonRpcError::invalid_params("Missing params"),
                ));
            }
            Err(e) => {
                return Reply::Now(JsonRpcResponse::error(
                    req.id,
                    JsonRpcError::invalid_params(e.to_string()),
                ));
            }
        };

        let id = req.id;
        Reply::Later(Box::pin(async move {
            let result = match self.tools.call(&params.name, params.arguments_json()).await {
                Ok(output) => CallToolResult::text(output),
                Err(e) => {
                    debug!(tool = %params.name, error = %e, "Tool call failed");
                    CallToolResult::error(e.to_string())
                }
            };
            JsonRpcResponse::success(id, result)
        }))
    }
}
