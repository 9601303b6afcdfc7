//! MCP server role.
//!
//! The server answers the handshake: it records the client's identity from
//! `initialize`, installs its method routes conditioned on the declared
//! capabilities, and serves until the session ends. Tools and prompts live
//! in observable collections whose mutations become
//! `notifications/*/list_changed` once the client has confirmed
//! initialization.
//!
//! # Example
//!
//! ```ignore
//! let server = Server::builder("calc", "1.0")
//!     .tool(add_tool())
//!     .enable_logging()
//!     .build()?;
//!
//! let connection = server.serve(StdioTransport::stdio());
//! connection.closed().await;
//! ```

#![forbid(unsafe_code)]

mod builder;
mod collection;
mod session;

pub use builder::{
    CallToolHandler, CompleteHandler, GetPromptHandler, ListPromptsHandler,
    ListResourceTemplatesHandler, ListResourcesHandler, ListToolsHandler, ReadResourceHandler,
    ServerBuilder, SubscribeResourceHandler, UnsubscribeResourceHandler,
};
pub use collection::{Primitive, PrimitiveCollection, ServerPrompt, ServerTool, Subscription};
pub use session::SessionState;

use std::any::Any;
use std::sync::{Arc, Mutex};

use mcplex_core::logging::{debug, info, targets};
use mcplex_core::{McpError, McpResult};
use mcplex_endpoint::{
    notification_handler, request_handler, Endpoint, EndpointBuilder, RequestContext,
    RequestHandler,
};
use mcplex_protocol::{
    methods, CallToolParams, CallToolResult, CompleteParams, CompleteResult, CreateMessageParams,
    CreateMessageResult, EmptyResult, GetPromptParams, GetPromptResult, Implementation,
    InitializeParams, InitializeResult, ListPromptsResult, ListResourceTemplatesResult,
    ListRootsResult, ListToolsResult, LogLevel, LogMessageParams, PageParams, Prompt,
    ReadResourceParams, ResourceUpdatedParams, ServerCapabilities, SetLogLevelParams,
    SubscribeResourceParams, Tool, UnsubscribeResourceParams,
};
use mcplex_transport::Transport;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Server configuration and lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// One side of a paired handler set is missing.
    #[error("handler pair '{pair}' must both be specified or both omitted")]
    HandlerPairAsymmetry {
        /// The pair in question.
        pair: &'static str,
    },
    /// A declared capability lacks its required handlers.
    #[error("capability '{capability}' declared without handlers for '{methods}'")]
    MissingCapabilityHandler {
        /// The declared capability.
        capability: &'static str,
        /// The required methods.
        methods: &'static str,
    },
    /// An RPC-level failure.
    #[error(transparent)]
    Rpc(#[from] McpError),
}

struct ServerInner {
    info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    protocol_version: String,
    tools: PrimitiveCollection<ServerTool>,
    prompts: PrimitiveCollection<ServerPrompt>,
    list_tools_handler: Option<ListToolsHandler>,
    call_tool_handler: Option<CallToolHandler>,
    list_prompts_handler: Option<ListPromptsHandler>,
    get_prompt_handler: Option<GetPromptHandler>,
    list_resources_handler: Option<ListResourcesHandler>,
    read_resource_handler: Option<ReadResourceHandler>,
    list_resource_templates_handler: Option<ListResourceTemplatesHandler>,
    subscribe_resource_handler: Option<SubscribeResourceHandler>,
    unsubscribe_resource_handler: Option<UnsubscribeResourceHandler>,
    complete_handler: Option<CompleteHandler>,
    notification_handlers: Vec<(String, mcplex_endpoint::NotificationHandler)>,
}

/// An MCP server: a session factory over a validated configuration.
///
/// Cheap to clone. Each [`serve`](Server::serve) call produces an
/// independent session over its own transport.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Creates a server builder.
    #[must_use]
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name, version)
    }

    pub(crate) fn from_builder(builder: ServerBuilder, capabilities: ServerCapabilities) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                info: builder.info,
                capabilities,
                instructions: builder.instructions,
                protocol_version: builder.protocol_version,
                tools: builder.tools,
                prompts: builder.prompts,
                list_tools_handler: builder.list_tools_handler,
                call_tool_handler: builder.call_tool_handler,
                list_prompts_handler: builder.list_prompts_handler,
                get_prompt_handler: builder.get_prompt_handler,
                list_resources_handler: builder.list_resources_handler,
                read_resource_handler: builder.read_resource_handler,
                list_resource_templates_handler: builder.list_resource_templates_handler,
                subscribe_resource_handler: builder.subscribe_resource_handler,
                unsubscribe_resource_handler: builder.unsubscribe_resource_handler,
                complete_handler: builder.complete_handler,
                notification_handlers: builder.notification_handlers,
            }),
        }
    }

    /// Returns the server info.
    #[must_use]
    pub fn info(&self) -> &Implementation {
        &self.inner.info
    }

    /// Returns the advertised capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.inner.capabilities
    }

    /// The tool collection. Mutations after initialization notify the
    /// client via `notifications/tools/list_changed`.
    #[must_use]
    pub fn tools(&self) -> &PrimitiveCollection<ServerTool> {
        &self.inner.tools
    }

    /// The prompt collection. Mutations after initialization notify the
    /// client via `notifications/prompts/list_changed`.
    #[must_use]
    pub fn prompts(&self) -> &PrimitiveCollection<ServerPrompt> {
        &self.inner.prompts
    }

    /// Serves one session over a transport.
    ///
    /// Installs the capability-conditional routes, starts the endpoint
    /// read loop, and returns a handle to the running session.
    pub fn serve(&self, transport: impl Transport + 'static) -> ServerConnection {
        let session = Arc::new(SessionState::new());
        let subscriptions: Arc<Mutex<Vec<Box<dyn Any + Send>>>> = Arc::new(Mutex::new(Vec::new()));

        let mut builder = EndpointBuilder::new();
        self.install_lifecycle_routes(&mut builder, &session, &subscriptions);
        self.install_capability_routes(&mut builder, &session);
        for (method, handler) in &self.inner.notification_handlers {
            builder.notification_handler(method.clone(), Arc::clone(handler));
        }

        let endpoint = builder.connect(transport);
        info!(target: targets::SERVER, server = %self.inner.info.name, "session started");

        ServerConnection {
            endpoint,
            session,
            server: self.clone(),
            _subscriptions: subscriptions,
        }
    }

    // ========================================================================
    // Route installation
    // ========================================================================

    fn install_lifecycle_routes(
        &self,
        builder: &mut EndpointBuilder,
        session: &Arc<SessionState>,
        subscriptions: &Arc<Mutex<Vec<Box<dyn Any + Send>>>>,
    ) {
        let server = self.clone();
        let init_session = Arc::clone(session);
        builder.request_handler(
            methods::INITIALIZE,
            request_handler(move |_ctx, params: InitializeParams| {
                let server = server.clone();
                let session = Arc::clone(&init_session);
                async move {
                    if !session.initialize(params.client_info, params.capabilities) {
                        return Err(McpError::invalid_request("initialize already received"));
                    }
                    debug!(
                        target: targets::SESSION,
                        client = %session
                            .client_info()
                            .map(|i| i.name)
                            .unwrap_or_default(),
                        "session initialized"
                    );
                    Ok(InitializeResult {
                        protocol_version: server.inner.protocol_version.clone(),
                        capabilities: server.inner.capabilities.clone(),
                        server_info: server.inner.info.clone(),
                        instructions: server.inner.instructions.clone(),
                    })
                }
            }),
        );

        builder.request_handler(
            methods::PING,
            request_handler(|_ctx, _params: Value| async move { Ok(EmptyResult {}) }),
        );

        // notifications/initialized arms the list-changed notifier; arming
        // is idempotent so duplicate notifications do not double-subscribe.
        let server = self.clone();
        let notifier_session = Arc::clone(session);
        let subscriptions = Arc::clone(subscriptions);
        builder.notification_handler(
            methods::INITIALIZED,
            notification_handler(move |endpoint: Endpoint, _params: Value| {
                let server = server.clone();
                let session = Arc::clone(&notifier_session);
                let subscriptions = Arc::clone(&subscriptions);
                async move {
                    if !session.arm_change_notifier() {
                        return Ok(());
                    }
                    let mut guards = subscriptions
                        .lock()
                        .expect("subscriptions lock poisoned");

                    if server
                        .inner
                        .capabilities
                        .tools
                        .as_ref()
                        .is_some_and(|c| c.list_changed)
                    {
                        let weak = endpoint.downgrade();
                        let sub = server.inner.tools.subscribe(move || {
                            notify_list_changed(&weak, methods::TOOLS_LIST_CHANGED);
                        });
                        guards.push(Box::new(sub));
                    }
                    if server
                        .inner
                        .capabilities
                        .prompts
                        .as_ref()
                        .is_some_and(|c| c.list_changed)
                    {
                        let weak = endpoint.downgrade();
                        let sub = server.inner.prompts.subscribe(move || {
                            notify_list_changed(&weak, methods::PROMPTS_LIST_CHANGED);
                        });
                        guards.push(Box::new(sub));
                    }
                    Ok(())
                }
            }),
        );
    }

    #[allow(clippy::too_many_lines)]
    fn install_capability_routes(&self, builder: &mut EndpointBuilder, session: &Arc<SessionState>) {
        if self.inner.capabilities.tools.is_some() {
            let server = self.clone();
            builder.request_handler(
                methods::TOOLS_LIST,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: PageParams| {
                        let server = server.clone();
                        async move { server.handle_list_tools(ctx, params).await }
                    }),
                ),
            );
            let server = self.clone();
            builder.request_handler(
                methods::TOOLS_CALL,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: CallToolParams| {
                        let server = server.clone();
                        async move { server.handle_call_tool(ctx, params).await }
                    }),
                ),
            );
        }

        if self.inner.capabilities.prompts.is_some() {
            let server = self.clone();
            builder.request_handler(
                methods::PROMPTS_LIST,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: PageParams| {
                        let server = server.clone();
                        async move { server.handle_list_prompts(ctx, params).await }
                    }),
                ),
            );
            let server = self.clone();
            builder.request_handler(
                methods::PROMPTS_GET,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: GetPromptParams| {
                        let server = server.clone();
                        async move { server.handle_get_prompt(ctx, params).await }
                    }),
                ),
            );
        }

        if let Some(resources) = self.inner.capabilities.resources.clone() {
            let handler = self
                .inner
                .list_resources_handler
                .clone()
                .expect("validated at build");
            builder.request_handler(
                methods::RESOURCES_LIST,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: PageParams| handler(ctx, params)),
                ),
            );

            let handler = self
                .inner
                .read_resource_handler
                .clone()
                .expect("validated at build");
            builder.request_handler(
                methods::RESOURCES_READ,
                require_initialized(
                    session,
                    request_handler(move |ctx, params: ReadResourceParams| handler(ctx, params)),
                ),
            );

            let handler = self.inner.list_resource_templates_handler.clone();
            builder.request_handler(
                methods::RESOURCES_TEMPLATES_LIST,
                require_initialized(
                    session,
                    request_handler(move |ctx, _params: Value| {
                        let handler = handler.clone();
                        async move {
                            match handler {
                                Some(handler) => handler(ctx).await,
                                None => Ok(ListResourceTemplatesResult {
                                    resource_templates: vec![],
                                }),
                            }
                        }
                    }),
                ),
            );

            if resources.subscribe {
                let hook = self.inner.subscribe_resource_handler.clone();
                let subscribe_session = Arc::clone(session);
                builder.request_handler(
                    methods::RESOURCES_SUBSCRIBE,
                    require_initialized(
                        session,
                        request_handler(move |ctx, params: SubscribeResourceParams| {
                            let hook = hook.clone();
                            let session = Arc::clone(&subscribe_session);
                            async move {
                                session.subscribe_resource(params.uri.clone());
                                if let Some(hook) = hook {
                                    hook(ctx, params).await?;
                                }
                                Ok(EmptyResult {})
                            }
                        }),
                    ),
                );

                let hook = self.inner.unsubscribe_resource_handler.clone();
                let unsubscribe_session = Arc::clone(session);
                builder.request_handler(
                    methods::RESOURCES_UNSUBSCRIBE,
                    require_initialized(
                        session,
                        request_handler(move |ctx, params: UnsubscribeResourceParams| {
                            let hook = hook.clone();
                            let session = Arc::clone(&unsubscribe_session);
                            async move {
                                session.unsubscribe_resource(&params.uri);
                                if let Some(hook) = hook {
                                    hook(ctx, params).await?;
                                }
                                Ok(EmptyResult {})
                            }
                        }),
                    ),
                );
            }
        }

        // completion/complete is always routable; without a handler it
        // answers with the empty completion.
        let handler = self.inner.complete_handler.clone();
        builder.request_handler(
            methods::COMPLETION_COMPLETE,
            require_initialized(
                session,
                request_handler(move |ctx, params: CompleteParams| {
                    let handler = handler.clone();
                    async move {
                        match handler {
                            Some(handler) => handler(ctx, params).await,
                            None => Ok(CompleteResult::empty()),
                        }
                    }
                }),
            ),
        );

        if self.inner.capabilities.logging.is_some() {
            let level_session = Arc::clone(session);
            builder.request_handler(
                methods::LOGGING_SET_LEVEL,
                require_initialized(
                    session,
                    request_handler(move |_ctx, params: SetLogLevelParams| {
                        let session = Arc::clone(&level_session);
                        async move {
                            session.set_log_level(params.level);
                            Ok(EmptyResult {})
                        }
                    }),
                ),
            );
        }
    }

    // ========================================================================
    // Composed tool/prompt dispatch
    // ========================================================================

    /// The effective tool list: collection items first, then the user
    /// handler drained across its pagination cursors.
    async fn handle_list_tools(
        &self,
        ctx: RequestContext,
        params: PageParams,
    ) -> McpResult<ListToolsResult> {
        let mut tools: Vec<Tool> = self
            .inner
            .tools
            .items()
            .iter()
            .map(|t| t.descriptor().clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(handler) = &self.inner.list_tools_handler {
            let mut cursor = params.cursor;
            loop {
                let page = handler(ctx.clone(), PageParams::at(cursor)).await?;
                tools.extend(page.tools);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    /// Collection tools take precedence; the user handler is the fallback.
    async fn handle_call_tool(
        &self,
        ctx: RequestContext,
        params: CallToolParams,
    ) -> McpResult<CallToolResult> {
        debug!(target: targets::SERVER, tool = %params.name, "calling tool");
        if let Some(tool) = self.inner.tools.get(&params.name) {
            return tool.invoke(ctx, params).await;
        }
        if let Some(handler) = &self.inner.call_tool_handler {
            return handler(ctx, params).await;
        }
        Err(McpError::invalid_params(format!(
            "Unknown tool '{}'",
            params.name
        )))
    }

    async fn handle_list_prompts(
        &self,
        ctx: RequestContext,
        params: PageParams,
    ) -> McpResult<ListPromptsResult> {
        let mut prompts: Vec<Prompt> = self
            .inner
            .prompts
            .items()
            .iter()
            .map(|p| p.descriptor().clone())
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(handler) = &self.inner.list_prompts_handler {
            let mut cursor = params.cursor;
            loop {
                let page = handler(ctx.clone(), PageParams::at(cursor)).await?;
                prompts.extend(page.prompts);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        Ok(ListPromptsResult {
            prompts,
            next_cursor: None,
        })
    }

    async fn handle_get_prompt(
        &self,
        ctx: RequestContext,
        params: GetPromptParams,
    ) -> McpResult<GetPromptResult> {
        debug!(target: targets::SERVER, prompt = %params.name, "getting prompt");
        if let Some(prompt) = self.inner.prompts.get(&params.name) {
            return prompt.get(ctx, params).await;
        }
        if let Some(handler) = &self.inner.get_prompt_handler {
            return handler(ctx, params).await;
        }
        Err(McpError::invalid_params(format!(
            "Unknown prompt '{}'",
            params.name
        )))
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("info", &self.inner.info)
            .field("tools", &self.inner.tools.len())
            .field("prompts", &self.inner.prompts.len())
            .finish_non_exhaustive()
    }
}

/// Emits a list-changed notification through a weak endpoint handle.
///
/// Runs inside the collection's mutation lock, so the actual send is
/// spawned; a dead endpoint means the session is gone and nothing happens.
fn notify_list_changed(weak: &mcplex_endpoint::WeakEndpoint, method: &'static str) {
    let Some(endpoint) = weak.upgrade() else {
        return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(target: targets::SERVER, method, "list_changed outside runtime, dropped");
        return;
    };
    handle.spawn(async move {
        if let Err(e) = endpoint.notify(method, None).await {
            debug!(target: targets::SERVER, error = %e, "failed to send list_changed");
        }
    });
}

/// Rejects requests that arrive before `initialize` was accepted.
fn require_initialized(session: &Arc<SessionState>, handler: RequestHandler) -> RequestHandler {
    let session = Arc::clone(session);
    Arc::new(move |ctx, params| {
        if !session.is_initialized() {
            return Box::pin(async {
                Err(McpError::invalid_request(
                    "server not initialized: send 'initialize' first",
                ))
            });
        }
        handler(ctx, params)
    })
}

/// A running server session.
///
/// Holds the endpoint, the per-session state, and the change-notifier
/// subscriptions. Dropping the connection does not close the session;
/// call [`close`](ServerConnection::close) for an orderly shutdown.
pub struct ServerConnection {
    endpoint: Endpoint,
    session: Arc<SessionState>,
    server: Server,
    _subscriptions: Arc<Mutex<Vec<Box<dyn Any + Send>>>>,
}

impl ServerConnection {
    /// Returns the underlying endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the server this session belongs to.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Returns the client info once the client has initialized.
    #[must_use]
    pub fn client_info(&self) -> Option<Implementation> {
        self.session.client_info()
    }

    /// Returns whether the client has initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_initialized()
    }

    /// Waits until the session ends.
    pub async fn closed(&self) {
        self.endpoint.closed().await;
    }

    /// Closes the session.
    pub async fn close(&self) {
        self.endpoint.close().await;
    }

    /// Pings the client.
    ///
    /// # Errors
    ///
    /// Fails if the peer reports an error or the session is closed.
    pub async fn ping(&self, token: &CancellationToken) -> McpResult<()> {
        let _: EmptyResult = self.endpoint.request(methods::PING, None, token).await?;
        Ok(())
    }

    /// Requests an LLM completion from the client (sampling).
    ///
    /// # Errors
    ///
    /// Fails if the client declined or the session is closed.
    pub async fn create_message(
        &self,
        params: CreateMessageParams,
        token: &CancellationToken,
    ) -> McpResult<CreateMessageResult> {
        let params = serde_json::to_value(&params)?;
        self.endpoint
            .request(methods::SAMPLING_CREATE_MESSAGE, Some(params), token)
            .await
    }

    /// Asks the client for its roots.
    ///
    /// # Errors
    ///
    /// Fails if the peer reports an error or the session is closed.
    pub async fn list_roots(&self, token: &CancellationToken) -> McpResult<ListRootsResult> {
        self.endpoint
            .request(methods::ROOTS_LIST, None, token)
            .await
    }

    /// Sends `notifications/message` to the client, honoring the level the
    /// client chose via `logging/setLevel`.
    ///
    /// # Errors
    ///
    /// Fails if the write fails.
    pub async fn log_message(
        &self,
        level: LogLevel,
        logger: Option<String>,
        data: Value,
    ) -> McpResult<()> {
        if !self.session.level_enabled(level) {
            return Ok(());
        }
        let params = serde_json::to_value(&LogMessageParams {
            level,
            logger,
            data,
        })?;
        self.endpoint
            .notify(methods::LOGGING_MESSAGE, Some(params))
            .await
    }

    /// Announces that the server's resource list changed.
    ///
    /// # Errors
    ///
    /// Fails if the write fails.
    pub async fn notify_resources_list_changed(&self) -> McpResult<()> {
        self.endpoint
            .notify(methods::RESOURCES_LIST_CHANGED, None)
            .await
    }

    /// Sends `notifications/resources/updated` for a URI the client
    /// subscribed to; a no-op otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the write fails.
    pub async fn notify_resource_updated(&self, uri: &str) -> McpResult<()> {
        if !self.session.is_subscribed(uri) {
            return Ok(());
        }
        let params = serde_json::to_value(&ResourceUpdatedParams {
            uri: uri.to_string(),
        })?;
        self.endpoint
            .notify(methods::RESOURCES_UPDATED, Some(params))
            .await
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("initialized", &self.is_initialized())
            .field("closed", &self.endpoint.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::{ClientCapabilities, Content, PROTOCOL_VERSION};
    use mcplex_transport::memory;
    use tokio_util::sync::CancellationToken;

    fn echo_tool(name: &str) -> ServerTool {
        let tag = name.to_string();
        ServerTool::new(
            Tool::new(
                name,
                serde_json::json!({
                    "type": "object",
                    "properties": {"i": {"type": "integer"}}
                }),
            )
            .with_description(format!("{name} echoes its argument")),
            move |_ctx, args| {
                let tag = tag.clone();
                async move {
                    let i = args
                        .as_ref()
                        .and_then(|a| a.get("i"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    Ok(CallToolResult::text(format!("{tag} Result {i}")))
                }
            },
        )
    }

    /// Connects a raw endpoint to a served session and runs the handshake.
    async fn handshaken(server: &Server) -> (Endpoint, ServerConnection) {
        let (client_half, server_half) = memory::pair();
        let connection = server.serve(server_half);
        let endpoint = EndpointBuilder::new().connect(client_half);

        let token = CancellationToken::new();
        let params = serde_json::to_value(InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("c", "1"),
        })
        .unwrap();
        let _: InitializeResult = endpoint
            .request(methods::INITIALIZE, Some(params), &token)
            .await
            .unwrap();
        endpoint
            .notify(methods::INITIALIZED, None)
            .await
            .unwrap();
        (endpoint, connection)
    }

    #[tokio::test]
    async fn test_requests_rejected_before_initialize() {
        let server = Server::builder("s", "1")
            .tool(echo_tool("echo"))
            .build()
            .unwrap();
        let (client_half, server_half) = memory::pair();
        let _connection = server.serve(server_half);
        let endpoint = EndpointBuilder::new().connect(client_half);

        let token = CancellationToken::new();
        let err = endpoint
            .request::<ListToolsResult>(methods::TOOLS_LIST, None, &token)
            .await
            .unwrap_err();
        assert_eq!(i32::from(err.code), -32600);

        // ping is exempt from the gate
        let _: EmptyResult = endpoint.request(methods::PING, None, &token).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_initialize_rejected() {
        let server = Server::builder("s", "1").build().unwrap();
        let (endpoint, _connection) = handshaken(&server).await;

        let token = CancellationToken::new();
        let params = serde_json::to_value(InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("again", "1"),
        })
        .unwrap();
        let err = endpoint
            .request::<InitializeResult>(methods::INITIALIZE, Some(params), &token)
            .await
            .unwrap_err();
        assert_eq!(i32::from(err.code), -32600);
    }

    #[tokio::test]
    async fn test_capability_matrix_undeclared_is_method_not_found() {
        // No prompts capability declared
        let server = Server::builder("s", "1")
            .tool(echo_tool("echo"))
            .build()
            .unwrap();
        let (endpoint, _connection) = handshaken(&server).await;

        let token = CancellationToken::new();
        let err = endpoint
            .request::<ListPromptsResult>(methods::PROMPTS_LIST, None, &token)
            .await
            .unwrap_err();
        assert_eq!(i32::from(err.code), -32601);
    }

    #[tokio::test]
    async fn test_composed_tool_list_and_dispatch() {
        let server = Server::builder("s", "1")
            .tool(echo_tool("alpha"))
            .tool(echo_tool("beta"))
            .list_tools_handler(|_ctx, params| async move {
                // Two pages of one extra tool each
                match params.cursor.as_deref() {
                    None => Ok(ListToolsResult {
                        tools: vec![Tool::new("extra1", serde_json::json!({"type": "object"}))],
                        next_cursor: Some("page2".to_string()),
                    }),
                    Some("page2") => Ok(ListToolsResult {
                        tools: vec![Tool::new("extra2", serde_json::json!({"type": "object"}))],
                        next_cursor: None,
                    }),
                    Some(other) => Err(McpError::invalid_params(format!("bad cursor {other}"))),
                }
            })
            .call_tool_handler(|_ctx, params| async move {
                if params.name.starts_with("extra") {
                    Ok(CallToolResult {
                        content: vec![Content::text("extra result")],
                        is_error: false,
                    })
                } else {
                    Err(McpError::invalid_params(format!(
                        "Unknown tool '{}'",
                        params.name
                    )))
                }
            })
            .build()
            .unwrap();
        let (endpoint, _connection) = handshaken(&server).await;
        let token = CancellationToken::new();

        // Union: collection items first, then both user pages
        let list: ListToolsResult = endpoint
            .request(methods::TOOLS_LIST, None, &token)
            .await
            .unwrap();
        let names: Vec<&str> = list.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta", "extra1", "extra2"]);
        assert!(list.next_cursor.is_none());

        // Collection dispatch
        let result: CallToolResult = endpoint
            .request(
                methods::TOOLS_CALL,
                Some(serde_json::json!({"name": "alpha", "arguments": {"i": 42}})),
                &token,
            )
            .await
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("alpha Result 42"));

        // Fallback dispatch
        let result: CallToolResult = endpoint
            .request(
                methods::TOOLS_CALL,
                Some(serde_json::json!({"name": "extra1"})),
                &token,
            )
            .await
            .unwrap();
        assert_eq!(result.content[0].as_text(), Some("extra result"));

        // Neither collection nor handler knows it
        let err = endpoint
            .request::<CallToolResult>(
                methods::TOOLS_CALL,
                Some(serde_json::json!({"name": "nope"})),
                &token,
            )
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown tool 'nope'"));
    }

    #[tokio::test]
    async fn test_completion_defaults_to_empty() {
        let server = Server::builder("s", "1").build().unwrap();
        let (endpoint, _connection) = handshaken(&server).await;
        let token = CancellationToken::new();

        let result: CompleteResult = endpoint
            .request(
                methods::COMPLETION_COMPLETE,
                Some(serde_json::json!({
                    "ref": {"type": "ref/prompt", "name": "p"},
                    "argument": {"name": "a", "value": ""}
                })),
                &token,
            )
            .await
            .unwrap();
        assert!(result.completion.values.is_empty());
        assert_eq!(result.completion.total, Some(0));
        assert_eq!(result.completion.has_more, Some(false));
    }

    #[tokio::test]
    async fn test_logging_route_gated_by_capability() {
        let server = Server::builder("s", "1").build().unwrap();
        let (endpoint, _connection) = handshaken(&server).await;
        let token = CancellationToken::new();

        let err = endpoint
            .request::<EmptyResult>(
                methods::LOGGING_SET_LEVEL,
                Some(serde_json::json!({"level": "warning"})),
                &token,
            )
            .await
            .unwrap_err();
        assert_eq!(i32::from(err.code), -32601);
    }
}
