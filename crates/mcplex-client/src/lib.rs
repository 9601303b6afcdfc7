//! MCP client role.
//!
//! The client initiates the handshake: it connects a transport, sends
//! `initialize`, verifies the protocol version, records the server's
//! capabilities, and confirms with `notifications/initialized`. After that
//! it exposes the typed MCP method surface and hosts the server-initiated
//! `sampling/createMessage` and `roots/list` requests.
//!
//! # Example
//!
//! ```ignore
//! let client = Client::builder("inspector", "1.0").build()?;
//! client.connect(StdioTransport::stdio()).await?;
//!
//! let token = CancellationToken::new();
//! let tools = client.list_tools(None, &token).await?;
//! ```

#![forbid(unsafe_code)]

mod builder;
mod roots;
mod sampling;
mod session;

pub use builder::ClientBuilder;
pub use roots::{RootsHandler, StaticRoots};
pub use sampling::{
    ChatBackend, ChatMessage, ChatRequest, ChatResponse, ChatSamplingHandler, SamplingHandler,
};
pub use session::ClientSession;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcplex_core::logging::{debug, info, targets};
use mcplex_core::McpError;
use mcplex_endpoint::{request_handler, Endpoint, EndpointBuilder, NotificationHandler};
use mcplex_protocol::{
    methods, CallToolParams, CallToolResult, ClientCapabilities, CompleteParams, CompleteResult,
    EmptyResult, GetPromptParams, GetPromptResult, Implementation, InitializeParams,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListRootsResult, ListToolsResult, LogLevel, PageParams, ReadResourceParams,
    ReadResourceResult, ServerCapabilities, SetLogLevelParams, SubscribeResourceParams,
    UnsubscribeResourceParams,
};
use mcplex_transport::Transport;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Client lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client was already connected; a client connects exactly once.
    #[error("client already in use")]
    AlreadyConnected,
    /// An operation requires a connected client.
    #[error("client is not connected")]
    NotConnected,
    /// The server did not answer `initialize` within the timeout.
    #[error("initialization timed out after {0:?}")]
    InitializeTimeout(Duration),
    /// The server offered a different protocol version.
    #[error("protocol version mismatch: requested {requested}, server offered {offered}")]
    VersionMismatch {
        /// Version the client requested.
        requested: String,
        /// Version the server offered.
        offered: String,
    },
    /// A capability was declared without its required handler.
    #[error("capability '{capability}' declared without a handler for '{method}'")]
    MissingCapabilityHandler {
        /// The declared capability.
        capability: &'static str,
        /// The method whose handler is missing.
        method: &'static str,
    },
    /// An RPC-level failure.
    #[error(transparent)]
    Rpc(#[from] McpError),
}

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, not yet connected.
    Idle,
    /// Transport connecting, read loop starting.
    Connecting,
    /// `initialize` in flight.
    Initializing,
    /// Handshake complete; the typed surface is usable.
    Ready,
    /// The session has ended.
    Closed,
}

/// An MCP client.
///
/// Built via [`Client::builder`]; connected at most once.
pub struct Client {
    info: Implementation,
    capabilities: ClientCapabilities,
    protocol_version: String,
    initialize_timeout: Duration,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    roots_handler: Option<Arc<dyn RootsHandler>>,
    /// Taken at connect time.
    notification_handlers: Mutex<Vec<(String, NotificationHandler)>>,
    /// Connect-once flag; losers of the race get `AlreadyConnected`.
    connected: AtomicBool,
    state: Mutex<ConnectionState>,
    endpoint: Mutex<Option<Endpoint>>,
    session: Mutex<Option<ClientSession>>,
}

impl Client {
    /// Creates a client builder.
    #[must_use]
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name, version)
    }

    pub(crate) fn from_builder(builder: ClientBuilder) -> Self {
        Self {
            info: builder.info,
            capabilities: builder.capabilities,
            protocol_version: builder.protocol_version,
            initialize_timeout: builder.initialize_timeout,
            sampling_handler: builder.sampling_handler,
            roots_handler: builder.roots_handler,
            notification_handlers: Mutex::new(builder.notification_handlers),
            connected: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Idle),
            endpoint: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Connects a transport and performs the initialization handshake.
    ///
    /// 1. Starts the endpoint read loop
    /// 2. Sends `initialize` and awaits it under the configured timeout
    /// 3. Verifies the protocol version matches exactly
    /// 4. Records server capabilities, info, and instructions
    /// 5. Sends `notifications/initialized`
    ///
    /// On any failure the endpoint is torn down before the error surfaces.
    ///
    /// # Errors
    ///
    /// [`ClientError::AlreadyConnected`] on re-entry, timeout and version
    /// errors per the steps above.
    pub async fn connect(&self, transport: impl Transport + 'static) -> Result<(), ClientError> {
        if self.connected.swap(true, Ordering::AcqRel) {
            return Err(ClientError::AlreadyConnected);
        }
        self.set_state(ConnectionState::Connecting);

        let mut builder = EndpointBuilder::new();
        builder.request_handler(
            methods::PING,
            request_handler(|_ctx, _params: Value| async move { Ok(EmptyResult {}) }),
        );

        if let Some(handler) = &self.sampling_handler {
            let handler = Arc::clone(handler);
            builder.request_handler(
                methods::SAMPLING_CREATE_MESSAGE,
                request_handler(move |ctx, params| {
                    let handler = Arc::clone(&handler);
                    let token = ctx.token().clone();
                    async move { handler.create_message(params, token).await }
                }),
            );
        }
        if let Some(handler) = &self.roots_handler {
            let handler = Arc::clone(handler);
            builder.request_handler(
                methods::ROOTS_LIST,
                request_handler(move |_ctx, _params: Value| {
                    let handler = Arc::clone(&handler);
                    async move {
                        Ok(ListRootsResult {
                            roots: handler.list_roots().await?,
                        })
                    }
                }),
            );
        }
        for (method, handler) in self
            .notification_handlers
            .lock()
            .expect("handlers lock poisoned")
            .drain(..)
        {
            builder.notification_handler(method, handler);
        }

        let endpoint = builder.connect(transport);
        *self.endpoint.lock().expect("endpoint lock poisoned") = Some(endpoint.clone());
        self.set_state(ConnectionState::Initializing);

        let params = InitializeParams {
            protocol_version: self.protocol_version.clone(),
            capabilities: self.capabilities.clone(),
            client_info: self.info.clone(),
        };
        let params = serde_json::to_value(&params).map_err(McpError::from)?;

        debug!(target: targets::CLIENT, "sending initialize");
        let token = CancellationToken::new();
        let result = tokio::time::timeout(
            self.initialize_timeout,
            endpoint.request::<InitializeResult>(methods::INITIALIZE, Some(params), &token),
        )
        .await;

        let result = match result {
            Err(_) => {
                token.cancel();
                self.teardown(&endpoint).await;
                return Err(ClientError::InitializeTimeout(self.initialize_timeout));
            }
            Ok(Err(e)) => {
                self.teardown(&endpoint).await;
                return Err(ClientError::Rpc(e));
            }
            Ok(Ok(result)) => result,
        };

        if result.protocol_version != self.protocol_version {
            self.teardown(&endpoint).await;
            return Err(ClientError::VersionMismatch {
                requested: self.protocol_version.clone(),
                offered: result.protocol_version,
            });
        }

        *self.session.lock().expect("session lock poisoned") = Some(ClientSession::new(
            self.info.clone(),
            self.capabilities.clone(),
            result.server_info,
            result.capabilities,
            result.protocol_version,
            result.instructions,
        ));

        if let Err(e) = endpoint.notify(methods::INITIALIZED, None).await {
            self.teardown(&endpoint).await;
            return Err(ClientError::Rpc(e));
        }

        self.set_state(ConnectionState::Ready);
        info!(
            target: targets::CLIENT,
            server = %self
                .server_info()
                .map(|i| i.name)
                .unwrap_or_default(),
            "session ready"
        );
        Ok(())
    }

    async fn teardown(&self, endpoint: &Endpoint) {
        endpoint.close().await;
        self.set_state(ConnectionState::Closed);
    }

    /// Closes the session.
    pub async fn close(&self) {
        let endpoint = self
            .endpoint
            .lock()
            .expect("endpoint lock poisoned")
            .clone();
        if let Some(endpoint) = endpoint {
            endpoint.close().await;
        }
        self.set_state(ConnectionState::Closed);
    }

    fn endpoint(&self) -> Result<Endpoint, ClientError> {
        self.endpoint
            .lock()
            .expect("endpoint lock poisoned")
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    // ========================================================================
    // Session accessors
    // ========================================================================

    /// Returns the server's implementation info after the handshake.
    #[must_use]
    pub fn server_info(&self) -> Option<Implementation> {
        self.session
            .lock()
            .expect("session lock poisoned")
            .as_ref()
            .map(|s| s.server_info().clone())
    }

    /// Returns the server's capabilities after the handshake.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.session
            .lock()
            .expect("session lock poisoned")
            .as_ref()
            .map(|s| s.server_capabilities().clone())
    }

    /// Returns the server's instructions after the handshake, if provided.
    #[must_use]
    pub fn instructions(&self) -> Option<String> {
        self.session
            .lock()
            .expect("session lock poisoned")
            .as_ref()
            .and_then(|s| s.instructions().map(str::to_owned))
    }

    // ========================================================================
    // Typed method surface
    // ========================================================================

    /// Pings the server.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn ping(&self, token: &CancellationToken) -> Result<(), ClientError> {
        let _: EmptyResult = self.endpoint()?.request(methods::PING, None, token).await?;
        Ok(())
    }

    /// Lists tools, one page at a time.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn list_tools(
        &self,
        cursor: Option<String>,
        token: &CancellationToken,
    ) -> Result<ListToolsResult, ClientError> {
        let params = serde_json::to_value(PageParams::at(cursor)).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::TOOLS_LIST, Some(params), token)
            .await?)
    }

    /// Calls a tool.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn call_tool(
        &self,
        params: CallToolParams,
        token: &CancellationToken,
    ) -> Result<CallToolResult, ClientError> {
        let params = serde_json::to_value(&params).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::TOOLS_CALL, Some(params), token)
            .await?)
    }

    /// Lists prompts, one page at a time.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn list_prompts(
        &self,
        cursor: Option<String>,
        token: &CancellationToken,
    ) -> Result<ListPromptsResult, ClientError> {
        let params = serde_json::to_value(PageParams::at(cursor)).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::PROMPTS_LIST, Some(params), token)
            .await?)
    }

    /// Gets a prompt by name.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn get_prompt(
        &self,
        params: GetPromptParams,
        token: &CancellationToken,
    ) -> Result<GetPromptResult, ClientError> {
        let params = serde_json::to_value(&params).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::PROMPTS_GET, Some(params), token)
            .await?)
    }

    /// Lists resources, one page at a time.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn list_resources(
        &self,
        cursor: Option<String>,
        token: &CancellationToken,
    ) -> Result<ListResourcesResult, ClientError> {
        let params = serde_json::to_value(PageParams::at(cursor)).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::RESOURCES_LIST, Some(params), token)
            .await?)
    }

    /// Lists resource templates.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn list_resource_templates(
        &self,
        token: &CancellationToken,
    ) -> Result<ListResourceTemplatesResult, ClientError> {
        let params = serde_json::to_value(PageParams::default()).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::RESOURCES_TEMPLATES_LIST, Some(params), token)
            .await?)
    }

    /// Reads a resource by URI.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn read_resource(
        &self,
        uri: impl Into<String>,
        token: &CancellationToken,
    ) -> Result<ReadResourceResult, ClientError> {
        let params = serde_json::to_value(ReadResourceParams {
            uri: uri.into(),
            meta: None,
        })
        .map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::RESOURCES_READ, Some(params), token)
            .await?)
    }

    /// Subscribes to change notifications for a resource.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn subscribe_resource(
        &self,
        uri: impl Into<String>,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        let params =
            serde_json::to_value(SubscribeResourceParams { uri: uri.into() })
                .map_err(McpError::from)?;
        let _: EmptyResult = self
            .endpoint()?
            .request(methods::RESOURCES_SUBSCRIBE, Some(params), token)
            .await?;
        Ok(())
    }

    /// Removes a resource subscription.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn unsubscribe_resource(
        &self,
        uri: impl Into<String>,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        let params = serde_json::to_value(UnsubscribeResourceParams { uri: uri.into() })
            .map_err(McpError::from)?;
        let _: EmptyResult = self
            .endpoint()?
            .request(methods::RESOURCES_UNSUBSCRIBE, Some(params), token)
            .await?;
        Ok(())
    }

    /// Requests completion candidates for a prompt or resource argument.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn complete(
        &self,
        params: CompleteParams,
        token: &CancellationToken,
    ) -> Result<CompleteResult, ClientError> {
        let params = serde_json::to_value(&params).map_err(McpError::from)?;
        Ok(self
            .endpoint()?
            .request(methods::COMPLETION_COMPLETE, Some(params), token)
            .await?)
    }

    /// Sets the server's minimum log level for `notifications/message`.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the peer reports an error.
    pub async fn set_log_level(
        &self,
        level: LogLevel,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        let params = serde_json::to_value(SetLogLevelParams { level }).map_err(McpError::from)?;
        let _: EmptyResult = self
            .endpoint()?
            .request(methods::LOGGING_SET_LEVEL, Some(params), token)
            .await?;
        Ok(())
    }

    /// Announces that the client's root set changed.
    ///
    /// # Errors
    ///
    /// Fails if not connected or the write fails.
    pub async fn notify_roots_list_changed(&self) -> Result<(), ClientError> {
        self.endpoint()?
            .notify(methods::ROOTS_LIST_CHANGED, None)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("info", &self.info)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
