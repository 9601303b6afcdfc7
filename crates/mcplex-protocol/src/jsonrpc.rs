//! JSON-RPC 2.0 envelopes.
//!
//! A session exchanges exactly four shapes of message: a request (carries
//! an id, expects exactly one response), a success response, an error
//! response, and a notification (no id, no response). The types here make
//! those shapes structural: [`JsonRpcNotification`] has no id field to
//! misuse, and [`JsonRpcResponse`] holds a [`ResponseOutcome`] so a
//! response cannot carry both a result and an error, or neither.
//!
//! Decoding classifies an inbound object by which fields it carries; an
//! object that fits none of the four shapes is a malformed message and
//! fails to parse, which the read loop treats as a dropped line.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// The only protocol version this engine speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// Zero-sized stand-in for the `"jsonrpc": "2.0"` field.
///
/// Serializes as the literal `"2.0"`; refuses anything else on decode, so
/// a message from a peer speaking some other dialect never reaches
/// dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct V2;

impl Serialize for V2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for V2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(V2)
        } else {
            Err(de::Error::custom(format!(
                "unsupported jsonrpc version {version:?}"
            )))
        }
    }
}

/// Wire id of a request.
///
/// Ids are an integer or a string, unique per direction per session, and
/// never reused. Equality is variant-aware: `Num(1)` and `Str("1")` name
/// different requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id. All locally issued ids take this form.
    Num(i64),
    /// String id, accepted from peers and echoed back verbatim.
    Str(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Num(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::Str(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::Str(s)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Num(n) => n.fmt(f),
            RequestId::Str(s) => s.fmt(f),
        }
    }
}

/// Allocator for locally issued request ids.
///
/// Ids are positive integers, strictly increasing from 1, and a consumed
/// id is never handed out again for the lifetime of the sequence.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicI64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl IdSequence {
    /// Starts a sequence at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
        }
    }

    /// Issues the next id.
    pub fn next(&self) -> RequestId {
        RequestId::Num(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the id the next call to [`next`](Self::next) would issue.
    #[must_use]
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// A call that expects exactly one response carrying the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: V2,
    /// Correlation id; the response echoes it in variant and value.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method params; omitted from the wire when absent, never `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Builds a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: V2,
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A fire-and-forget message. Carries no id and gets no response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: V2,
    /// Method name.
    pub method: String,
    /// Method params; omitted from the wire when absent, never `null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Builds a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: V2,
            method: method.into(),
            params,
        }
    }
}

/// The error object of an error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Additional error data; MCP-specific codes mirror their kind here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<mcplex_core::McpError> for JsonRpcError {
    fn from(err: mcplex_core::McpError) -> Self {
        Self {
            code: err.code.into(),
            data: err.wire_data(),
            message: err.message,
        }
    }
}

impl From<JsonRpcError> for mcplex_core::McpError {
    fn from(err: JsonRpcError) -> Self {
        mcplex_core::McpError::from_wire(err.code, err.message, err.data)
    }
}

/// How a request ended: with a result or with an error, never both.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    /// The handler produced a result.
    Success(Value),
    /// The handler, or the dispatch layer, produced an error.
    Failure(JsonRpcError),
}

/// The single response written for a request id.
#[derive(Debug, Clone)]
pub struct JsonRpcResponse {
    /// Id of the request this answers, echoed in variant and value.
    pub id: RequestId,
    /// Exactly one of `result` or `error` on the wire.
    pub outcome: ResponseOutcome,
}

impl JsonRpcResponse {
    /// Builds a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Success(result),
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn failure(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            id,
            outcome: ResponseOutcome::Failure(error),
        }
    }

    /// Returns the result on success.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            ResponseOutcome::Success(result) => Some(result),
            ResponseOutcome::Failure(_) => None,
        }
    }

    /// Returns the error object on failure.
    #[must_use]
    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.outcome {
            ResponseOutcome::Success(_) => None,
            ResponseOutcome::Failure(error) => Some(error),
        }
    }

    /// Returns true for an error response.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Failure(_))
    }
}

impl Serialize for JsonRpcResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
        match &self.outcome {
            ResponseOutcome::Success(result) => map.serialize_entry("result", result)?,
            ResponseOutcome::Failure(error) => map.serialize_entry("error", error)?,
        }
        map.serialize_entry("id", &self.id)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for JsonRpcResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match JsonRpcMessage::deserialize(deserializer)? {
            JsonRpcMessage::Response(response) => Ok(response),
            _ => Err(de::Error::custom("expected a response")),
        }
    }
}

/// Any message a transport can carry.
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification.
    Notification(JsonRpcNotification),
    /// A response to an earlier request.
    Response(JsonRpcResponse),
}

impl Serialize for JsonRpcMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonRpcMessage::Request(request) => request.serialize(serializer),
            JsonRpcMessage::Notification(notification) => notification.serialize(serializer),
            JsonRpcMessage::Response(response) => response.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawEnvelope::deserialize(deserializer)?
            .classify()
            .map_err(de::Error::custom)
    }
}

/// Field-level view of an inbound object, before classification.
///
/// Unknown fields are ignored here, which is what makes the engine
/// tolerant of additions to the wire protocol.
#[derive(Deserialize)]
struct RawEnvelope {
    jsonrpc: String,
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

impl RawEnvelope {
    fn classify(self) -> Result<JsonRpcMessage, String> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(format!("unsupported jsonrpc version {:?}", self.jsonrpc));
        }
        match (self.method, self.id) {
            (Some(method), Some(id)) => Ok(JsonRpcMessage::Request(JsonRpcRequest {
                jsonrpc: V2,
                id,
                method,
                params: self.params,
            })),
            (Some(method), None) => Ok(JsonRpcMessage::Notification(JsonRpcNotification {
                jsonrpc: V2,
                method,
                params: self.params,
            })),
            (None, Some(id)) => match (self.result, self.error) {
                (Some(result), None) => Ok(JsonRpcMessage::Response(JsonRpcResponse::success(
                    id, result,
                ))),
                (None, Some(error)) => Ok(JsonRpcMessage::Response(JsonRpcResponse::failure(
                    id, error,
                ))),
                (Some(_), Some(_)) => {
                    Err("response carries both result and error".to_string())
                }
                (None, None) => Err("response carries neither result nor error".to_string()),
            },
            (None, None) => Err("message has neither method nor id".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_core::McpError;

    fn decode(line: &str) -> JsonRpcMessage {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_classification_of_the_four_shapes() {
        let message = decode("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}");
        assert!(matches!(message, JsonRpcMessage::Request(_)));

        let message = decode("{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}");
        assert!(matches!(message, JsonRpcMessage::Notification(_)));

        let message = decode("{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}");
        match message {
            JsonRpcMessage::Response(response) => assert!(!response.is_failure()),
            _ => panic!("expected response"),
        }

        let message =
            decode("{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"nope\"}}");
        match message {
            JsonRpcMessage::Response(response) => {
                assert_eq!(response.error().unwrap().code, -32601);
            }
            _ => panic!("expected response"),
        }
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        // Both result and error
        assert!(serde_json::from_str::<JsonRpcMessage>(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{},\"error\":{\"code\":1,\"message\":\"x\"}}"
        )
        .is_err());
        // Neither result nor error, no method
        assert!(serde_json::from_str::<JsonRpcMessage>("{\"jsonrpc\":\"2.0\",\"id\":1}").is_err());
        // Wrong protocol version
        assert!(
            serde_json::from_str::<JsonRpcMessage>("{\"jsonrpc\":\"1.0\",\"id\":1,\"method\":\"m\"}")
                .is_err()
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let request = JsonRpcRequest::new(7i64, "tools/list", None);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":7"));
        assert!(!json.contains("params"));

        let roundtrip = decode(&json);
        match roundtrip {
            JsonRpcMessage::Request(r) => {
                assert_eq!(r.id, RequestId::Num(7));
                assert_eq!(r.method, "tools/list");
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_notification_has_no_id_on_the_wire() {
        let notification = JsonRpcNotification::new("notifications/progress", None);
        let json = serde_json::to_string(&notification).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_response_emits_exactly_one_of_result_or_error() {
        let success = JsonRpcResponse::success(RequestId::Num(3), serde_json::json!({"ok": true}));
        let json = serde_json::to_string(&success).unwrap();
        assert!(json.contains("\"result\""));
        assert!(!json.contains("\"error\""));

        let failure = JsonRpcResponse::failure(
            RequestId::Str("a-1".to_string()),
            JsonRpcError::from(McpError::method_not_found("foo/bar")),
        );
        let json = serde_json::to_string(&failure).unwrap();
        assert!(json.contains("\"error\""));
        assert!(!json.contains("\"result\""));
        assert!(json.contains("\"id\":\"a-1\""));
    }

    #[test]
    fn test_ids_are_variant_aware() {
        assert_ne!(RequestId::Num(1), RequestId::Str("1".to_string()));
        assert_eq!(RequestId::from(1i64), RequestId::Num(1));
        assert_eq!(RequestId::from("x"), RequestId::Str("x".to_string()));
    }

    #[test]
    fn test_id_sequence_is_strictly_increasing_from_one() {
        let ids = IdSequence::new();
        assert_eq!(ids.next(), RequestId::Num(1));
        assert_eq!(ids.next(), RequestId::Num(2));
        assert_eq!(ids.next(), RequestId::Num(3));
        assert_eq!(ids.peek(), 4);
    }

    #[test]
    fn test_mcp_error_kind_crosses_the_wire() {
        let wire: JsonRpcError = McpError::request_cancelled().into();
        assert_eq!(wire.code, -32000);
        assert_eq!(wire.data.as_ref().unwrap()["kind"], "requestCancelled");

        let back: McpError = wire.into();
        assert_eq!(back.code, mcplex_core::McpErrorCode::RequestCancelled);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let message =
            decode("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"_meta\":{},\"extra\":3}");
        assert!(matches!(message, JsonRpcMessage::Request(_)));
    }
}
