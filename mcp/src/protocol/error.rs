//! Error objects sent to clients and errors raised while serving.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric `code` of a JSON-RPC error object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// A line that is not JSON at all.
    pub const PARSE_ERROR: Self = Self(-32700);
    /// JSON that is not a request, response or notification.
    pub const INVALID_REQUEST: Self = Self(-32600);
    /// A method this server does not answer, such as `resources/list`.
    pub const METHOD_NOT_FOUND: Self = Self(-32601);
    /// `initialize` or `tools/call` params of the wrong shape.
    pub const INVALID_PARAMS: Self = Self(-32602);
    /// A result that could not be turned into JSON.
    pub const INTERNAL_ERROR: Self = Self(-32603);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::PARSE_ERROR => "parse error",
            Self::INVALID_REQUEST => "invalid request",
            Self::METHOD_NOT_FOUND => "method not found",
            Self::INVALID_PARAMS => "invalid params",
            Self::INTERNAL_ERROR => "internal error",
            Self(code) => return write!(f, "error {code}"),
        };
        f.write_str(name)
    }
}

/// The `error` member of a failed response.
///
/// Tool failures never use this; they are successful responses flagged `isError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// What kind of failure this is.
    pub code: ErrorCode,
    /// Detail for whoever reads the client's logs.
    pub message: String,
}

impl JsonRpcError {
    /// Pairs a code with a message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// See [`ErrorCode::PARSE_ERROR`].
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PARSE_ERROR, message)
    }

    /// See [`ErrorCode::INVALID_REQUEST`].
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_REQUEST, message)
    }

    /// Names the unanswered method in the message.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::METHOD_NOT_FOUND, format!("unknown method `{method}`"))
    }

    /// See [`ErrorCode::INVALID_PARAMS`].
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INVALID_PARAMS, message)
    }

    /// See [`ErrorCode::INTERNAL_ERROR`].
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::INTERNAL_ERROR, message)
    }

    /// Classifies an input line that could not be decoded.
    ///
    /// Malformed JSON is a parse error; well-formed JSON that is not a JSON-RPC message
    /// is an invalid request.
    #[must_use]
    pub fn undecodable(error: &serde_json::Error) -> Self {
        if error.is_data() {
            Self::invalid_request(error.to_string())
        } else {
            Self::parse_error(error.to_string())
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.code.0, self.message)
    }
}

/// Why serving stopped, or why one message was skipped.
#[derive(Debug, Error)]
pub enum McpError {
    /// An incoming line could not be decoded. The connection is still usable.
    #[error("undecodable message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading from or writing to the client failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A response was sent after the transport was closed.
    #[error("connection closed")]
    ConnectionClosed,
}
