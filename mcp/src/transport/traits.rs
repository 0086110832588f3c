//! Transport trait definitions.

use std::future::Future;

use crate::protocol::{JsonRpcMessage, JsonRpcResponse, McpError};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Server-side message channel.
///
/// Note: Uses `&mut self` to avoid locks - transports should be owned
/// by a single task/context.
pub trait Transport: Send {
    /// Receive the next incoming message.
    ///
    /// Returns `None` once the peer has closed the connection. A message that cannot be
    /// decoded is reported as [`McpError::Serialization`]; the transport stays usable
    /// and the next call reads the following message.
    ///
    /// The server races this against running tool calls, so dropping the returned future
    /// before it completes must not lose input.
    fn recv(&mut self) -> impl Future<Output = Result<Option<JsonRpcMessage>>> + Send;

    /// Send a response to a request.
    fn respond(&mut self, response: JsonRpcResponse) -> impl Future<Output = Result<()>> + Send;

    /// Close the transport connection.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
