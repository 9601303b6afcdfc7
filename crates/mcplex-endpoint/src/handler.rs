//! Handler types for inbound requests and notifications.
//!
//! Handlers are registered on an [`EndpointBuilder`](crate::EndpointBuilder)
//! before connecting; after connect the registries are read-only and safe to
//! invoke concurrently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mcplex_core::logging::{targets, warn};
use mcplex_core::{McpError, McpResult};
use mcplex_protocol::{methods, ProgressParams, ProgressToken, RequestId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::Endpoint;

/// A boxed future for async handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request handler: deserializes params, runs, serializes the result.
pub type RequestHandler =
    Arc<dyn Fn(RequestContext, Option<Value>) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// A notification handler.
pub type NotificationHandler =
    Arc<dyn Fn(Endpoint, Option<Value>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Per-request context handed to request handlers.
///
/// Carries the wire request id, the request's cancellation token, the
/// progress token (if the caller attached one), and a handle back to the
/// endpoint for sending notifications or nested requests.
#[derive(Clone)]
pub struct RequestContext {
    request_id: RequestId,
    token: CancellationToken,
    progress_token: Option<ProgressToken>,
    endpoint: Endpoint,
}

impl RequestContext {
    pub(crate) fn new(
        request_id: RequestId,
        token: CancellationToken,
        progress_token: Option<ProgressToken>,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            request_id,
            token,
            progress_token,
            endpoint,
        }
    }

    /// Returns the wire id of the request being handled.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Returns the request's cancellation token.
    ///
    /// Cancelled when the peer sends `notifications/cancelled` for this
    /// request or the session shuts down. Long-running handlers should
    /// observe it and exit promptly.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cooperative cancellation checkpoint.
    ///
    /// # Errors
    ///
    /// Returns a request-cancelled error if cancellation is pending.
    pub fn checkpoint(&self) -> McpResult<()> {
        if self.token.is_cancelled() {
            return Err(McpError::request_cancelled());
        }
        Ok(())
    }

    /// Returns the endpoint handle for sending messages to the peer.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns whether the caller attached a progress token.
    #[must_use]
    pub fn has_progress_token(&self) -> bool {
        self.progress_token.is_some()
    }

    /// Reports progress on the current operation.
    ///
    /// No-op when the caller did not attach a progress token. Send failures
    /// are logged and swallowed: progress is advisory.
    pub async fn report_progress(&self, progress: f64, total: Option<f64>, message: Option<&str>) {
        let Some(token) = self.progress_token.clone() else {
            return;
        };

        let mut params = match total {
            Some(total) => ProgressParams::with_total(token, progress, total),
            None => ProgressParams::new(token, progress),
        };
        if let Some(message) = message {
            params = params.with_message(message);
        }

        let params = match serde_json::to_value(&params) {
            Ok(value) => value,
            Err(e) => {
                warn!(target: targets::ENDPOINT, error = %e, "failed to encode progress");
                return;
            }
        };
        if let Err(e) = self.endpoint.notify(methods::PROGRESS, Some(params)).await {
            warn!(target: targets::ENDPOINT, error = %e, "failed to send progress");
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Decodes handler params, treating absent params as an empty object.
fn decode_params<P: DeserializeOwned>(params: Option<Value>) -> McpResult<P> {
    let value = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}

/// Wraps a typed async function as a [`RequestHandler`].
///
/// Malformed params become an invalid-params error before the function
/// runs; the return value is serialized as the JSON-RPC result.
pub fn request_handler<P, R, F, Fut>(f: F) -> RequestHandler
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize,
    F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<R>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |ctx, params| {
        let f = Arc::clone(&f);
        Box::pin(async move {
            let params: P = decode_params(params)?;
            let result = f(ctx, params).await?;
            serde_json::to_value(result).map_err(McpError::from)
        })
    })
}

/// Wraps a typed async function as a [`NotificationHandler`].
pub fn notification_handler<P, F, Fut>(f: F) -> NotificationHandler
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(Endpoint, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<()>> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |endpoint, params| {
        let f = Arc::clone(&f);
        Box::pin(async move {
            let params: P = decode_params(params)?;
            f(endpoint, params).await
        })
    })
}

/// Pulls the progress token out of raw request params, if present.
#[must_use]
pub(crate) fn extract_progress_token(params: Option<&Value>) -> Option<ProgressToken> {
    let token = params?.get("_meta")?.get("progressToken")?;
    serde_json::from_value(token.clone()).ok()
}
