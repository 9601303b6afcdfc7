//! MCP error model.
//!
//! Errors carry the JSON-RPC `{code, message, data}` triple. A handler that
//! returns an [`McpError`] has its fields sent to the peer verbatim; any
//! other failure is reported as [`McpErrorCode::InternalError`].

use serde_json::Value;

/// Result alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

/// Error codes used in MCP JSON-RPC responses.
///
/// The first five are the standard JSON-RPC 2.0 codes. MCP-specific codes
/// live in the reserved `-32000..=-32099` range and are mirrored as a
/// camelCase string in `error.data.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpErrorCode {
    /// Invalid JSON was received (-32700).
    ParseError,
    /// The JSON is not a valid request object (-32600).
    InvalidRequest,
    /// The method does not exist or is not available (-32601).
    MethodNotFound,
    /// Invalid method parameters (-32602).
    InvalidParams,
    /// Internal JSON-RPC error (-32603).
    InternalError,
    /// The request was cancelled before completing (-32000).
    RequestCancelled,
    /// The session's transport closed with the request in flight (-32001).
    ConnectionClosed,
    /// The requested resource does not exist (-32002).
    ResourceNotFound,
    /// A code outside the table above, preserved from the wire.
    Other(i32),
}

impl McpErrorCode {
    /// Returns the `error.data.kind` string for reserved-range codes.
    #[must_use]
    pub fn kind(self) -> Option<&'static str> {
        match self {
            McpErrorCode::RequestCancelled => Some("requestCancelled"),
            McpErrorCode::ConnectionClosed => Some("connectionClosed"),
            McpErrorCode::ResourceNotFound => Some("resourceNotFound"),
            _ => None,
        }
    }

    /// Maps a wire code back to the typed variant.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => McpErrorCode::ParseError,
            -32600 => McpErrorCode::InvalidRequest,
            -32601 => McpErrorCode::MethodNotFound,
            -32602 => McpErrorCode::InvalidParams,
            -32603 => McpErrorCode::InternalError,
            -32000 => McpErrorCode::RequestCancelled,
            -32001 => McpErrorCode::ConnectionClosed,
            -32002 => McpErrorCode::ResourceNotFound,
            other => McpErrorCode::Other(other),
        }
    }
}

impl From<McpErrorCode> for i32 {
    fn from(code: McpErrorCode) -> Self {
        match code {
            McpErrorCode::ParseError => -32700,
            McpErrorCode::InvalidRequest => -32600,
            McpErrorCode::MethodNotFound => -32601,
            McpErrorCode::InvalidParams => -32602,
            McpErrorCode::InternalError => -32603,
            McpErrorCode::RequestCancelled => -32000,
            McpErrorCode::ConnectionClosed => -32001,
            McpErrorCode::ResourceNotFound => -32002,
            McpErrorCode::Other(code) => code,
        }
    }
}

/// A structured MCP error.
///
/// Mirrors the JSON-RPC error object. Handlers return this to control the
/// exact error response sent to the peer.
#[derive(Debug, Clone)]
pub struct McpError {
    /// Error code.
    pub code: McpErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Additional error data.
    pub data: Option<Value>,
}

impl McpError {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: McpErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Creates an invalid-request error (-32600).
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidRequest, message)
    }

    /// Creates a method-not-found error (-32601).
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            McpErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Creates an invalid-params error (-32602).
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidParams, message)
    }

    /// Creates an internal error (-32603).
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InternalError, message)
    }

    /// Creates a request-cancelled error.
    #[must_use]
    pub fn request_cancelled() -> Self {
        Self::new(McpErrorCode::RequestCancelled, "Request cancelled")
    }

    /// Creates a connection-closed error.
    #[must_use]
    pub fn connection_closed() -> Self {
        Self::new(
            McpErrorCode::ConnectionClosed,
            "Connection closed with the request in flight",
        )
    }

    /// Creates a resource-not-found error.
    #[must_use]
    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            McpErrorCode::ResourceNotFound,
            format!("Resource not found: {uri}"),
        )
    }

    /// Returns the data to serialize on the wire.
    ///
    /// Reserved-range codes mirror their kind string into `data.kind`,
    /// merging with any data already attached.
    #[must_use]
    pub fn wire_data(&self) -> Option<Value> {
        let kind = self.code.kind();
        match (kind, &self.data) {
            (None, data) => data.clone(),
            (Some(kind), None) => Some(serde_json::json!({ "kind": kind })),
            (Some(kind), Some(Value::Object(map))) => {
                let mut map = map.clone();
                map.entry("kind")
                    .or_insert_with(|| Value::String(kind.to_string()));
                Some(Value::Object(map))
            }
            (Some(_), Some(other)) => Some(other.clone()),
        }
    }

    /// Reconstructs an error from wire fields.
    #[must_use]
    pub fn from_wire(code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            code: McpErrorCode::from_code(code),
            message,
            data,
        }
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, i32::from(self.code))
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            McpErrorCode::ParseError,
            McpErrorCode::InvalidRequest,
            McpErrorCode::MethodNotFound,
            McpErrorCode::InvalidParams,
            McpErrorCode::InternalError,
            McpErrorCode::RequestCancelled,
            McpErrorCode::ConnectionClosed,
            McpErrorCode::ResourceNotFound,
        ] {
            assert_eq!(McpErrorCode::from_code(i32::from(code)), code);
        }
        assert_eq!(
            McpErrorCode::from_code(-32050),
            McpErrorCode::Other(-32050)
        );
    }

    #[test]
    fn test_method_not_found_message() {
        let err = McpError::method_not_found("foo/bar");
        assert_eq!(i32::from(err.code), -32601);
        assert!(err.message.contains("foo/bar"));
    }

    #[test]
    fn test_wire_data_mirrors_kind() {
        let err = McpError::request_cancelled();
        let data = err.wire_data().unwrap();
        assert_eq!(data["kind"], "requestCancelled");
    }

    #[test]
    fn test_wire_data_merges_existing_object() {
        let err = McpError::resource_not_found("file:///x")
            .with_data(serde_json::json!({"uri": "file:///x"}));
        let data = err.wire_data().unwrap();
        assert_eq!(data["kind"], "resourceNotFound");
        assert_eq!(data["uri"], "file:///x");
    }

    #[test]
    fn test_wire_data_absent_for_standard_codes() {
        let err = McpError::method_not_found("x");
        assert!(err.wire_data().is_none());
    }

    #[test]
    fn test_display_includes_code() {
        let err = McpError::invalid_params("bad argument");
        let text = err.to_string();
        assert!(text.contains("bad argument"));
        assert!(text.contains("-32602"));
    }
}
