//! The shared endpoint: request correlation, dispatch, and teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcplex_core::logging::{debug, error, info, targets, warn};
use mcplex_core::{McpError, McpResult};
use mcplex_protocol::{
    methods, CancelledParams, IdSequence, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, ResponseOutcome,
};
use mcplex_transport::{Transport, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::handler::{extract_progress_token, NotificationHandler, RequestContext, RequestHandler};

/// How long `close` waits for the read loop to drain before detaching.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One-shot completion slot for an in-flight outbound request.
type PendingSlot = oneshot::Sender<Result<Value, McpError>>;

/// Pending-request table: locally issued ids awaiting a response.
///
/// Entries are inserted before the request is written and removed on the
/// first of response arrival, cancellation, or transport loss. Once closed,
/// inserts are refused so no request can leak past teardown.
struct PendingTable {
    closed: bool,
    slots: HashMap<RequestId, PendingSlot>,
}

impl PendingTable {
    fn new() -> Self {
        Self {
            closed: false,
            slots: HashMap::new(),
        }
    }

    fn insert(&mut self, id: RequestId, slot: PendingSlot) -> McpResult<()> {
        if self.closed {
            return Err(McpError::connection_closed());
        }
        self.slots.insert(id, slot);
        Ok(())
    }

    fn remove(&mut self, id: &RequestId) -> Option<PendingSlot> {
        self.slots.remove(id)
    }

    fn close_and_take(&mut self) -> Vec<PendingSlot> {
        self.closed = true;
        self.slots.drain().map(|(_, slot)| slot).collect()
    }
}

struct EndpointInner {
    transport: Arc<dyn Transport>,
    /// Locally issued requests awaiting responses.
    pending: Mutex<PendingTable>,
    /// Cancellation tokens for in-flight inbound requests, keyed by wire id.
    inbound: Mutex<HashMap<RequestId, CancellationToken>>,
    /// Read-only after connect.
    request_handlers: HashMap<String, RequestHandler>,
    /// Read-only after connect.
    notification_handlers: HashMap<String, Vec<NotificationHandler>>,
    /// Allocator for outbound request ids.
    ids: IdSequence,
    /// Cancelled to stop the read loop and all inbound handler tokens.
    shutdown: CancellationToken,
    /// Cancelled once the read loop has exited and pending work is drained.
    done: CancellationToken,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

/// A connected JSON-RPC endpoint.
///
/// Cheap to clone; all clones share the session. The endpoint owns its
/// transport for the session lifetime and tears it down on [`close`].
///
/// [`close`]: Endpoint::close
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

/// Builds an endpoint by registering handlers, then connecting a transport.
///
/// Handler registries are frozen at [`connect`](EndpointBuilder::connect);
/// afterwards they are read-only and safe for concurrent dispatch.
#[derive(Default)]
pub struct EndpointBuilder {
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, Vec<NotificationHandler>>,
}

impl EndpointBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request handler for a method. Last registration wins.
    pub fn request_handler(&mut self, method: impl Into<String>, handler: RequestHandler) {
        self.request_handlers.insert(method.into(), handler);
    }

    /// Appends a notification handler for a method.
    ///
    /// Handlers for one method run sequentially per notification; an error
    /// in one does not suppress the others.
    pub fn notification_handler(&mut self, method: impl Into<String>, handler: NotificationHandler) {
        self.notification_handlers
            .entry(method.into())
            .or_default()
            .push(handler);
    }

    /// Returns true if a request handler is registered for `method`.
    #[must_use]
    pub fn has_request_handler(&self, method: &str) -> bool {
        self.request_handlers.contains_key(method)
    }

    /// Connects a transport and starts the read loop.
    pub fn connect(self, transport: impl Transport + 'static) -> Endpoint {
        self.connect_arc(Arc::new(transport))
    }

    /// Connects an already-shared transport and starts the read loop.
    pub fn connect_arc(self, transport: Arc<dyn Transport>) -> Endpoint {
        let endpoint = Endpoint {
            inner: Arc::new(EndpointInner {
                transport,
                pending: Mutex::new(PendingTable::new()),
                inbound: Mutex::new(HashMap::new()),
                request_handlers: self.request_handlers,
                notification_handlers: self.notification_handlers,
                ids: IdSequence::new(),
                shutdown: CancellationToken::new(),
                done: CancellationToken::new(),
                read_task: Mutex::new(None),
            }),
        };

        let reader = endpoint.clone();
        let handle = tokio::spawn(async move { reader.read_loop().await });
        *endpoint
            .inner
            .read_task
            .lock()
            .expect("read_task lock poisoned") = Some(handle);
        endpoint
    }
}

impl Endpoint {
    // ========================================================================
    // Outbound
    // ========================================================================

    /// Sends a request and awaits its typed result.
    ///
    /// Allocates a fresh id, registers a completion slot, writes the
    /// request, then awaits the response or `token` cancellation. On
    /// cancellation the pending entry is removed, `notifications/cancelled`
    /// is emitted for the id, and the caller gets a request-cancelled error.
    ///
    /// # Errors
    ///
    /// An error response from the peer is surfaced with its wire fields;
    /// transport loss yields a connection-closed error.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        token: &CancellationToken,
    ) -> McpResult<R> {
        let id = self.inner.ids.next();
        let (slot, completion) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .expect("pending lock poisoned")
            .insert(id.clone(), slot)?;

        let request = JsonRpcRequest::new(id.clone(), method, params);
        debug!(target: targets::ENDPOINT, method, id = %id, "sending request");
        if let Err(e) = self
            .inner
            .transport
            .send(&JsonRpcMessage::Request(request))
            .await
        {
            self.inner
                .pending
                .lock()
                .expect("pending lock poisoned")
                .remove(&id);
            return Err(transport_error(e));
        }

        tokio::select! {
            () = token.cancelled() => {
                self.inner
                    .pending
                    .lock()
                    .expect("pending lock poisoned")
                    .remove(&id);
                self.send_cancelled(id, "request cancelled by caller").await;
                Err(McpError::request_cancelled())
            }
            outcome = completion => match outcome {
                Ok(Ok(value)) => serde_json::from_value(value)
                    .map_err(|e| McpError::internal_error(format!("invalid result payload: {e}"))),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(McpError::connection_closed()),
            }
        }
    }

    /// Sends a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport write fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.send_message(JsonRpcMessage::Notification(notification))
            .await
    }

    /// Sends a pre-built message.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport write fails.
    pub async fn send_message(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.inner
            .transport
            .send(&message)
            .await
            .map_err(transport_error)
    }

    /// Emits `notifications/cancelled` for an id, logging on failure.
    async fn send_cancelled(&self, id: RequestId, reason: &str) {
        let params = CancelledParams {
            request_id: id,
            reason: Some(reason.to_string()),
        };
        let params = match serde_json::to_value(&params) {
            Ok(value) => value,
            Err(e) => {
                warn!(target: targets::ENDPOINT, error = %e, "failed to encode cancellation");
                return;
            }
        };
        if let Err(e) = self.notify(methods::CANCELLED, Some(params)).await {
            warn!(target: targets::ENDPOINT, error = %e, "failed to send cancellation");
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Closes the endpoint: stops the read loop, closes the transport,
    /// fails pending requests, and cancels in-flight inbound handlers.
    ///
    /// Waits up to five seconds for the read loop to drain before
    /// detaching from it. Idempotent.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        if let Err(e) = self.inner.transport.close().await {
            debug!(target: targets::ENDPOINT, error = %e, "transport close failed");
        }

        let handle = self
            .inner
            .read_task
            .lock()
            .expect("read_task lock poisoned")
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                warn!(target: targets::ENDPOINT, "read loop did not drain in time");
            }
        }
        self.drain();
    }

    /// Waits until the session has ended (peer closed, error, or [`close`]).
    ///
    /// [`close`]: Endpoint::close
    pub async fn closed(&self) {
        self.inner.done.cancelled().await;
    }

    /// Returns true once the session has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    // ========================================================================
    // Read loop
    // ========================================================================

    async fn read_loop(&self) {
        loop {
            let message = tokio::select! {
                () = self.inner.shutdown.cancelled() => break,
                received = self.inner.transport.recv() => match received {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        info!(target: targets::ENDPOINT, "peer closed the stream");
                        break;
                    }
                    Err(e) if !e.is_fatal() => {
                        warn!(target: targets::ENDPOINT, error = %e, "discarding malformed message");
                        continue;
                    }
                    Err(e) => {
                        error!(target: targets::ENDPOINT, error = %e, "transport read failed");
                        break;
                    }
                }
            };

            match message {
                JsonRpcMessage::Response(response) => self.complete_pending(response),
                JsonRpcMessage::Notification(notification) => {
                    self.dispatch_notification(notification);
                }
                JsonRpcMessage::Request(request) => self.dispatch_request(request),
            }
        }
        self.drain();
    }

    /// Resolves the pending slot matching a response id.
    fn complete_pending(&self, response: JsonRpcResponse) {
        let slot = self
            .inner
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&response.id);
        let Some(slot) = slot else {
            warn!(
                target: targets::ENDPOINT,
                id = %response.id,
                "dropping response with unknown id"
            );
            return;
        };

        let outcome = match response.outcome {
            ResponseOutcome::Success(result) => Ok(result),
            ResponseOutcome::Failure(error) => Err(McpError::from(error)),
        };
        // The caller may have given up (cancelled); that's fine.
        let _ = slot.send(outcome);
    }

    /// Runs an inbound request handler on its own task.
    fn dispatch_request(&self, request: JsonRpcRequest) {
        let id = request.id.clone();
        let token = self.inner.shutdown.child_token();
        {
            let mut inbound = self.inner.inbound.lock().expect("inbound lock poisoned");
            if inbound.insert(id.clone(), token.clone()).is_some() {
                warn!(target: targets::ENDPOINT, id = %id, "inbound request id reused");
            }
        }

        let handler = self.inner.request_handlers.get(&request.method).cloned();
        let endpoint = self.clone();
        tokio::spawn(async move {
            let outcome = match handler {
                Some(handler) => {
                    let progress_token = extract_progress_token(request.params.as_ref());
                    let ctx = RequestContext::new(
                        id.clone(),
                        token,
                        progress_token,
                        endpoint.clone(),
                    );
                    handler(ctx, request.params).await
                }
                None => {
                    debug!(
                        target: targets::ENDPOINT,
                        method = %request.method,
                        "no handler for method"
                    );
                    Err(McpError::method_not_found(&request.method))
                }
            };

            endpoint
                .inner
                .inbound
                .lock()
                .expect("inbound lock poisoned")
                .remove(&id);

            let response = match outcome {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::failure(id, e.into()),
            };
            if let Err(e) = endpoint
                .inner
                .transport
                .send(&JsonRpcMessage::Response(response))
                .await
            {
                warn!(target: targets::ENDPOINT, error = %e, "failed to send response");
            }
        });
    }

    /// Fans a notification out to its handlers on one task, in order.
    fn dispatch_notification(&self, notification: JsonRpcNotification) {
        if notification.method == methods::CANCELLED {
            self.cancel_inbound(notification.params.as_ref());
        }

        let handlers = self
            .inner
            .notification_handlers
            .get(&notification.method)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!(
                target: targets::ENDPOINT,
                method = %notification.method,
                "unhandled notification"
            );
            return;
        }

        let endpoint = self.clone();
        tokio::spawn(async move {
            for handler in handlers {
                if let Err(e) = handler(endpoint.clone(), notification.params.clone()).await {
                    warn!(
                        target: targets::ENDPOINT,
                        method = %notification.method,
                        error = %e,
                        "notification handler failed"
                    );
                }
            }
        });
    }

    /// Cancels the inbound request named by a `notifications/cancelled`.
    fn cancel_inbound(&self, params: Option<&Value>) {
        let Some(params) = params else {
            warn!(target: targets::ENDPOINT, "cancellation without params");
            return;
        };
        let params: CancelledParams = match serde_json::from_value(params.clone()) {
            Ok(params) => params,
            Err(e) => {
                warn!(target: targets::ENDPOINT, error = %e, "malformed cancellation");
                return;
            }
        };

        let token = self
            .inner
            .inbound
            .lock()
            .expect("inbound lock poisoned")
            .get(&params.request_id)
            .cloned();
        match token {
            Some(token) => {
                info!(
                    target: targets::ENDPOINT,
                    id = %params.request_id,
                    reason = params.reason.as_deref().unwrap_or("unspecified"),
                    "cancelling inbound request"
                );
                token.cancel();
            }
            // Late or duplicate cancellation: the request already finished.
            None => debug!(
                target: targets::ENDPOINT,
                id = %params.request_id,
                "cancellation for unknown request"
            ),
        }
    }

    /// Fails pending requests and cancels inbound handler tokens.
    fn drain(&self) {
        let slots = self
            .inner
            .pending
            .lock()
            .expect("pending lock poisoned")
            .close_and_take();
        for slot in slots {
            let _ = slot.send(Err(McpError::connection_closed()));
        }

        let tokens: Vec<CancellationToken> = {
            let mut inbound = self.inner.inbound.lock().expect("inbound lock poisoned");
            inbound.drain().map(|(_, token)| token).collect()
        };
        for token in tokens {
            token.cancel();
        }

        self.inner.done.cancel();
    }
}

impl Endpoint {
    /// Downgrades to a weak handle that does not keep the session alive.
    ///
    /// Long-lived callbacks (collection subscribers, caches) should hold a
    /// [`WeakEndpoint`] so the session's strong references stay with the
    /// endpoint itself and drop at shutdown.
    #[must_use]
    pub fn downgrade(&self) -> WeakEndpoint {
        WeakEndpoint {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A weak handle to an [`Endpoint`].
#[derive(Clone)]
pub struct WeakEndpoint {
    inner: std::sync::Weak<EndpointInner>,
}

impl WeakEndpoint {
    /// Upgrades to a full handle if the session is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Endpoint> {
        self.inner.upgrade().map(|inner| Endpoint { inner })
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Maps a transport failure to the caller-facing error.
fn transport_error(e: TransportError) -> McpError {
    match e {
        TransportError::Closed => McpError::connection_closed(),
        other => McpError::internal_error(format!("transport error: {other}")),
    }
}
