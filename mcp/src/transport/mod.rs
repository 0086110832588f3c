//! Transport layer for MCP communication.
//!
//! Transports carry newline-delimited JSON-RPC messages between the server and its
//! client.

mod stdio;
mod traits;

pub use stdio::{LineTransport, StdioTransport};
pub use traits::{Result, Transport};
