//! In-memory transport over channels.
//!
//! [`pair`] yields two connected [`Transport`] halves; [`listener`] yields a
//! listener/connector pair for multi-session tests and embedding. This is
//! the canonical harness for exercising an endpoint without real I/O.

use async_trait::async_trait;
use mcplex_protocol::JsonRpcMessage;
use tokio::sync::{mpsc, Mutex};

use crate::{ServerTransport, Transport, TransportError};

/// Channel capacity for each direction of a memory pair.
const CHANNEL_CAPACITY: usize = 64;

/// One half of an in-memory duplex transport.
pub struct MemoryTransport {
    tx: Mutex<Option<mpsc::Sender<JsonRpcMessage>>>,
    rx: Mutex<mpsc::Receiver<JsonRpcMessage>>,
}

/// Creates a connected pair of in-memory transports.
///
/// Messages sent on one half arrive on the other, in order.
#[must_use]
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (b_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        MemoryTransport {
            tx: Mutex::new(Some(a_tx)),
            rx: Mutex::new(a_rx),
        },
        MemoryTransport {
            tx: Mutex::new(Some(b_tx)),
            rx: Mutex::new(b_rx),
        },
    )
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        let guard = self.tx.lock().await;
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Option<JsonRpcMessage>, TransportError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender signals end-of-stream to the peer
        self.tx.lock().await.take();
        Ok(())
    }
}

/// Listener half of an in-memory accept loop.
pub struct MemoryListener {
    rx: Mutex<mpsc::Receiver<MemoryTransport>>,
}

/// Connector half: each `connect` yields a client transport whose peer
/// session appears at the listener.
#[derive(Clone)]
pub struct MemoryConnector {
    tx: mpsc::Sender<MemoryTransport>,
}

/// Creates an in-memory listener and its connector.
#[must_use]
pub fn listener() -> (MemoryListener, MemoryConnector) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        MemoryListener { rx: Mutex::new(rx) },
        MemoryConnector { tx },
    )
}

impl MemoryConnector {
    /// Opens a new session, returning the client half.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] if the listener is gone.
    pub async fn connect(&self) -> Result<MemoryTransport, TransportError> {
        let (client, server) = pair();
        self.tx
            .send(server)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(client)
    }
}

#[async_trait]
impl ServerTransport for MemoryListener {
    type Session = MemoryTransport;

    async fn accept(&self) -> Result<Option<Self::Session>, TransportError> {
        Ok(self.rx.lock().await.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::{JsonRpcRequest, RequestId};

    fn ping(id: i64) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(id, "ping", None))
    }

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (a, b) = pair();
        a.send(&ping(1)).await.unwrap();
        a.send(&ping(2)).await.unwrap();

        for expected in [1i64, 2] {
            match b.recv().await.unwrap().unwrap() {
                JsonRpcMessage::Request(req) => {
                    assert_eq!(req.id, RequestId::Num(expected));
                }
                other => panic!("expected request, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_close_signals_eof_to_peer() {
        let (a, b) = pair();
        a.close().await.unwrap();
        assert!(b.recv().await.unwrap().is_none());
        assert!(matches!(a.send(&ping(1)).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_listener_accepts_sessions() {
        let (listener, connector) = listener();

        let client = connector.connect().await.unwrap();
        let session = listener.accept().await.unwrap().unwrap();

        client.send(&ping(1)).await.unwrap();
        assert!(session.recv().await.unwrap().is_some());

        // A second session works too
        let _client2 = connector.connect().await.unwrap();
        assert!(listener.accept().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_listener_ends_when_connector_dropped() {
        let (listener, connector) = listener();
        drop(connector);
        assert!(listener.accept().await.unwrap().is_none());
    }
}
