//! Standard I/O transport for MCP.
//!
//! This is the primary transport for MCP servers running as a subprocess.
//! Uses newline-delimited JSON (NDJSON) framing: one message per
//! LF-terminated line, UTF-8 without BOM, blank lines ignored on read,
//! writer flushed after each line.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mcplex_core::logging::{targets, trace};
use mcplex_protocol::JsonRpcMessage;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::{Codec, CodecError, ServerTransport, Transport, TransportError};

/// Stdio transport implementation.
///
/// Generic over reader/writer so tests can run against in-memory pipes;
/// [`StdioTransport::stdio`] wires up the process's stdin/stdout.
pub struct StdioTransport<R = Stdin, W = Stdout> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<W>,
    codec: Codec,
    closed: AtomicBool,
}

impl StdioTransport<Stdin, Stdout> {
    /// Creates a transport over the process's stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    /// Creates a new stdio transport with custom reader/writer.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            codec: Codec::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a transport with a custom maximum frame size.
    #[must_use]
    pub fn with_max_frame(reader: R, writer: W, max_frame: usize) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            codec: Codec::with_max_frame(max_frame),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync,
    W: AsyncWrite + Unpin + Send + Sync,
{
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let bytes = self.codec.encode(message)?;

        // The writer lock serializes frames so concurrent sends never
        // interleave bytes on the wire.
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<JsonRpcMessage>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Ok(None);
            }

            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.len() > self.codec.max_frame() {
                return Err(TransportError::Codec(CodecError::FrameTooLarge(
                    trimmed.len(),
                )));
            }

            trace!(target: targets::TRANSPORT, len = trimmed.len(), "received line");
            let message: JsonRpcMessage = serde_json::from_str(trimmed)
                .map_err(|e| TransportError::Codec(CodecError::Json(e)))?;
            return Ok(Some(message));
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        Ok(())
    }
}

/// Listener that hands out the process's stdio session.
///
/// Stdio carries a single session, so `accept` succeeds exactly once and
/// yields end-of-listener afterwards.
#[derive(Debug, Default)]
pub struct StdioListener {
    accepted: AtomicBool,
}

impl StdioListener {
    /// Creates a new stdio listener.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServerTransport for StdioListener {
    type Session = StdioTransport;

    async fn accept(&self) -> Result<Option<Self::Session>, TransportError> {
        if self.accepted.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }
        Ok(Some(StdioTransport::stdio()))
    }
}
