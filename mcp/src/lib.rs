//! # MCP server for confine tools
//!
//! Serves a [`confine_core::Tools`] registry over the Model Context Protocol: newline
//! delimited JSON-RPC 2.0, normally on stdin/stdout of a process spawned by the client.
//!
//! ```no_run
//! use confine_core::Tools;
//! use confine_mcp::McpServer;
//!
//! # async fn serve(tools: Tools) -> Result<(), confine_mcp::McpError> {
//! let mut server = McpServer::stdio(tools, "file-server", "0.1.0")?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Stdout carries the protocol. Anything else a host process prints must go to stderr.
//!
//! ## Client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "file-server": {
//!       "command": "/path/to/confine-server",
//!       "args": ["--base-dir", "/data"]
//!     }
//!   }
//! }
//! ```
//!
//! ## Error Handling
//!
//! Transport and protocol failures are reported as [`McpError`]. Tool failures are not
//! errors at this level: they reach the client as a [`CallToolResult`] with `isError`
//! set.

pub mod protocol;
mod server;
pub mod transport;

pub use protocol::{CallToolResult, Content, McpError};
pub use server::McpServer;
pub use transport::{LineTransport, StdioTransport, Transport};
