//! Standard I/O transport for MCP.
//!
//! This transport uses stdin/stdout for communication, which is the standard
//! method for MCP servers that run as subprocesses of their client.

use async_io::Async;
use futures_lite::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use super::traits::{Result, Transport};
use crate::protocol::{JsonRpcMessage, JsonRpcResponse, McpError};

/// Newline-delimited JSON over a reader and a writer.
///
/// Blank lines are skipped. Nothing but protocol messages is ever written.
///
/// [`recv`](Transport::recv) is cancel-safe: a partly read line is kept until the
/// next call.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: Vec<u8>,
    closed: bool,
}

/// Transport over the process's own stdin and stdout.
pub type StdioTransport = LineTransport<BufReader<Async<std::io::Stdin>>, Async<std::io::Stdout>>;

impl<R, W> std::fmt::Debug for LineTransport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Create a transport over stdin/stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin/stdout cannot be made async.
    pub fn stdio() -> std::io::Result<Self> {
        let stdin = Async::new(std::io::stdin())?;
        let stdout = Async::new(std::io::stdout())?;
        Ok(Self::new(BufReader::new(stdin), stdout))
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a transport over an arbitrary reader and writer.
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: Vec::new(),
            closed: false,
        }
    }

    /// Write a message followed by a newline.
    async fn write_message(&mut self, msg: &impl serde::Serialize) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        debug!("MCP TX: {}", json);

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Read the next non-blank line as a message.
    async fn read_message(&mut self) -> Result<Option<JsonRpcMessage>> {
        loop {
            // `read_until` appends as it reads, so nothing is lost if this future is dropped.
            let read = self.reader.read_until(b'\n', &mut self.line).await?;
            let line = std::mem::take(&mut self.line);
            if read == 0 && line.is_empty() {
                return Ok(None);
            }
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            debug!("MCP RX: {}", String::from_utf8_lossy(trimmed));
            return Ok(Some(serde_json::from_slice(trimmed)?));
        }
    }
}

impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<JsonRpcMessage>> {
        if self.closed {
            return Ok(None);
        }
        self.read_message().await
    }

    async fn respond(&mut self, response: JsonRpcResponse) -> Result<()> {
        if self.closed {
            return Err(McpError::ConnectionClosed);
        }
        self.write_message(&response).await
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use futures_lite::future;
    use futures_lite::io::Cursor;

    use super::*;
    use crate::protocol::{JsonRpcError, RequestId};

    fn transport(input: &str) -> LineTransport<Cursor<Vec<u8>>, Vec<u8>> {
        LineTransport::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[tokio::test]
    async fn reads_messages_and_skips_blank_lines() {
        let mut transport = transport(
            "\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n  \n\
             {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}",
        );
        assert!(matches!(
            transport.recv().await.unwrap(),
            Some(JsonRpcMessage::Request(_))
        ));
        assert!(matches!(
            transport.recv().await.unwrap(),
            Some(JsonRpcMessage::Notification(_))
        ));
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_line_does_not_end_the_stream() {
        let mut transport = transport("garbage\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        assert!(matches!(
            transport.recv().await,
            Err(McpError::Serialization(_))
        ));
        assert!(matches!(
            transport.recv().await.unwrap(),
            Some(JsonRpcMessage::Request(_))
        ));
    }

    #[tokio::test]
    async fn dropped_recv_keeps_the_partial_line() {
        let (tx, rx) = async_channel::unbounded::<std::io::Result<Vec<u8>>>();
        let mut transport = LineTransport::new(Box::pin(rx).into_async_read(), Vec::new());

        tx.send(Ok(br#"{"jsonrpc":"2.0","id":7,"#.to_vec())).await.unwrap();
        assert!(future::poll_once(transport.recv()).await.is_none());

        tx.send(Ok(b"\"method\":\"ping\"}\n".to_vec())).await.unwrap();
        let Some(JsonRpcMessage::Request(request)) = transport.recv().await.unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(request.method, "ping");
        assert!(matches!(request.id, RequestId::Number(7)));
    }

    #[tokio::test]
    async fn writes_one_line_per_response() {
        let mut transport = transport("");
        transport
            .respond(JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({})))
            .await
            .unwrap();
        transport
            .respond(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::parse_error("bad"),
            ))
            .await
            .unwrap();

        let written = String::from_utf8(transport.writer.clone()).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"jsonrpc":"2.0","id":1,"result":{}}"#);
        assert!(lines[1].contains(r#""id":null"#));

        transport.close().await.unwrap();
        assert!(transport.recv().await.unwrap().is_none());
        assert!(matches!(
            transport
                .respond(JsonRpcResponse::success(RequestId::Number(2), ()))
                .await,
            Err(McpError::ConnectionClosed)
        ));
    }
}
