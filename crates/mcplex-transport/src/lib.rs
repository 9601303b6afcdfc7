//! Transport abstraction for mcplex.
//!
//! A [`Transport`] is an established duplex session carrying framed JSON-RPC
//! messages; a [`ServerTransport`] is a listener producing one `Transport`
//! per accepted session.
//!
//! # Contracts
//!
//! - Messages are delivered in the order the peer wrote them
//! - The transport does not interpret message content
//! - UTF-8 is the canonical text encoding for textual framing
//! - `send` after close fails with [`TransportError::Closed`]
//! - `recv` after close yields `Ok(None)` (end of stream)

#![forbid(unsafe_code)]

mod codec;
pub mod memory;
mod stdio;

pub use codec::{Codec, CodecError};
pub use stdio::{StdioListener, StdioTransport};

use async_trait::async_trait;
use mcplex_protocol::JsonRpcMessage;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport connect failed.
    #[error("transport connect failed: {0}")]
    ConnectFailed(String),
    /// The transport is closed.
    #[error("transport closed")]
    Closed,
    /// An I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A framing or parse error occurred on one message.
    ///
    /// Recoverable: the offending line is discarded and the stream continues.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// Returns true if the transport is unusable after this error.
    ///
    /// Codec errors affect a single message only; everything else tears the
    /// session down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Codec(_))
    }
}

/// A duplex message carrier for one established session.
///
/// Implementations serialize concurrent `send` calls internally so each
/// frame is written atomically.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a message, awaiting write completion.
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Receives the next inbound message.
    ///
    /// Returns `Ok(None)` when the peer closed the stream. A
    /// [`TransportError::Codec`] error discards one message; callers should
    /// log it and keep receiving.
    async fn recv(&self) -> Result<Option<JsonRpcMessage>, TransportError>;

    /// Closes the transport, flushing pending writes.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A listener that accepts transport sessions.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// The session transport this listener produces.
    type Session: Transport + 'static;

    /// Accepts the next session.
    ///
    /// Returns `Ok(None)` when the listener is exhausted (stdio allows a
    /// single session; stream listeners are unbounded).
    async fn accept(&self) -> Result<Option<Self::Session>, TransportError>;
}
