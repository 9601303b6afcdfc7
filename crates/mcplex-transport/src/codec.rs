//! NDJSON framing for JSON-RPC messages.
//!
//! One message per line, LF-terminated, UTF-8, no newlines inside a
//! message. The codec is incremental: feed it byte chunks as they arrive
//! and pull complete messages out.

use mcplex_protocol::JsonRpcMessage;

/// Default maximum frame size: 10 MB.
const DEFAULT_MAX_FRAME: usize = 10 * 1024 * 1024;

/// Codec error types.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON parsing error. The offending line has been consumed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A frame exceeded the configured size limit.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),
}

/// Incremental codec for NDJSON-framed JSON-RPC messages.
#[derive(Debug)]
pub struct Codec {
    buf: Vec<u8>,
    max_frame: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// Creates a codec with the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    /// Creates a codec with a custom maximum frame size in bytes.
    #[must_use]
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Returns the maximum allowed frame size in bytes.
    #[must_use]
    pub fn max_frame(&self) -> usize {
        self.max_frame
    }

    /// Encodes a message as one compact, LF-terminated line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, message: &JsonRpcMessage) -> Result<Vec<u8>, CodecError> {
        let mut bytes = serde_json::to_vec(message)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Appends inbound bytes to the frame buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] and clears the buffer if the
    /// unterminated data exceeds the frame limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), CodecError> {
        if self.buf.len().saturating_add(chunk.len()) > self.max_frame {
            let size = self.buf.len() + chunk.len();
            self.buf.clear();
            return Err(CodecError::FrameTooLarge(size));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Pops the next complete message from the buffer.
    ///
    /// Returns `Ok(None)` when no complete line is buffered. Blank lines are
    /// skipped. A line that fails to parse has already been consumed when
    /// the error is returned, so decoding can continue with the next call.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] for an unparseable line.
    pub fn next_message(&mut self) -> Result<Option<JsonRpcMessage>, CodecError> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }

            let message: JsonRpcMessage = serde_json::from_slice(&line)?;
            return Ok(Some(message));
        }
    }

    /// Clears any buffered partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::{JsonRpcRequest, JsonRpcResponse, RequestId};

    fn request(method: &str, id: i64) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(id, method, None))
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = Codec::new();
        let encoded = codec.encode(&request("test/method", 1)).unwrap();
        assert!(encoded.ends_with(b"\n"));
        assert!(!encoded[..encoded.len() - 1].contains(&b'\n'));

        let mut codec = Codec::new();
        codec.push(&encoded).unwrap();
        let message = codec.next_message().unwrap().unwrap();
        assert!(matches!(message, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn test_decode_multiple_messages() {
        let mut codec = Codec::new();
        codec
            .push(b"{\"jsonrpc\":\"2.0\",\"method\":\"test1\",\"id\":1}\n{\"jsonrpc\":\"2.0\",\"method\":\"test2\",\"id\":2}\n")
            .unwrap();

        for expected in ["test1", "test2"] {
            match codec.next_message().unwrap().unwrap() {
                JsonRpcMessage::Request(req) => assert_eq!(req.method, expected),
                other => panic!("expected request, got {other:?}"),
            }
        }
        assert!(codec.next_message().unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_message() {
        let mut codec = Codec::new();
        codec
            .push(b"{\"jsonrpc\":\"2.0\",\"method\":\"test\"")
            .unwrap();
        assert!(codec.next_message().unwrap().is_none());

        codec.push(b",\"id\":1}\n").unwrap();
        let message = codec.next_message().unwrap().unwrap();
        match message {
            JsonRpcMessage::Request(req) => assert_eq!(req.method, "test"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut codec = Codec::new();
        codec
            .push(b"\n\r\n{\"jsonrpc\":\"2.0\",\"method\":\"test\",\"id\":1}\n\n")
            .unwrap();
        assert!(codec.next_message().unwrap().is_some());
        assert!(codec.next_message().unwrap().is_none());
    }

    #[test]
    fn test_invalid_line_is_consumed() {
        let mut codec = Codec::new();
        codec
            .push(b"not json\n{\"jsonrpc\":\"2.0\",\"method\":\"after\",\"id\":1}\n")
            .unwrap();

        assert!(matches!(codec.next_message(), Err(CodecError::Json(_))));
        // The stream continues past the bad line
        let message = codec.next_message().unwrap().unwrap();
        match message {
            JsonRpcMessage::Request(req) => assert_eq!(req.method, "after"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = Codec::with_max_frame(16);
        let result = codec.push(b"{\"jsonrpc\":\"2.0\",\"method\":\"much-too-long\"}");
        assert!(matches!(result, Err(CodecError::FrameTooLarge(_))));
        // Buffer was cleared; a small frame still decodes
        codec.push(b"{\"id\":1}\n").unwrap();
    }

    #[test]
    fn test_encode_response() {
        let codec = Codec::new();
        let response = JsonRpcMessage::Response(JsonRpcResponse::success(
            RequestId::Num(1),
            serde_json::json!({"ok": true}),
        ));
        let encoded = codec.encode(&response).unwrap();

        let mut codec = Codec::new();
        codec.push(&encoded).unwrap();
        match codec.next_message().unwrap().unwrap() {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.id, RequestId::Num(1));
                assert!(!resp.is_failure());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }
}
