//! Server builder: capability declaration and handler validation.

use std::future::Future;
use std::sync::Arc;

use mcplex_core::McpResult;
use mcplex_endpoint::{BoxFuture, NotificationHandler, RequestContext};
use mcplex_protocol::{
    CallToolParams, CallToolResult, CompleteParams, CompleteResult, GetPromptParams,
    GetPromptResult, Implementation, ListPromptsResult, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, LoggingCapability, PageParams, PromptsCapability,
    ReadResourceParams, ReadResourceResult, ResourcesCapability, ServerCapabilities,
    SubscribeResourceParams, ToolsCapability, UnsubscribeResourceParams, PROTOCOL_VERSION,
};

use crate::collection::{PrimitiveCollection, ServerPrompt, ServerTool};
use crate::{Server, ServerError};

/// User-supplied `tools/list` page handler.
pub type ListToolsHandler = Arc<
    dyn Fn(RequestContext, PageParams) -> BoxFuture<'static, McpResult<ListToolsResult>>
        + Send
        + Sync,
>;
/// User-supplied `tools/call` handler.
pub type CallToolHandler = Arc<
    dyn Fn(RequestContext, CallToolParams) -> BoxFuture<'static, McpResult<CallToolResult>>
        + Send
        + Sync,
>;
/// User-supplied `prompts/list` page handler.
pub type ListPromptsHandler = Arc<
    dyn Fn(RequestContext, PageParams) -> BoxFuture<'static, McpResult<ListPromptsResult>>
        + Send
        + Sync,
>;
/// User-supplied `prompts/get` handler.
pub type GetPromptHandler = Arc<
    dyn Fn(RequestContext, GetPromptParams) -> BoxFuture<'static, McpResult<GetPromptResult>>
        + Send
        + Sync,
>;
/// User-supplied `resources/list` handler.
pub type ListResourcesHandler = Arc<
    dyn Fn(RequestContext, PageParams) -> BoxFuture<'static, McpResult<ListResourcesResult>>
        + Send
        + Sync,
>;
/// User-supplied `resources/read` handler.
pub type ReadResourceHandler = Arc<
    dyn Fn(
            RequestContext,
            ReadResourceParams,
        ) -> BoxFuture<'static, McpResult<ReadResourceResult>>
        + Send
        + Sync,
>;
/// User-supplied `resources/templates/list` handler.
pub type ListResourceTemplatesHandler =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, McpResult<ListResourceTemplatesResult>> + Send + Sync>;
/// User-supplied `resources/subscribe` hook.
pub type SubscribeResourceHandler = Arc<
    dyn Fn(RequestContext, SubscribeResourceParams) -> BoxFuture<'static, McpResult<()>>
        + Send
        + Sync,
>;
/// User-supplied `resources/unsubscribe` hook.
pub type UnsubscribeResourceHandler = Arc<
    dyn Fn(RequestContext, UnsubscribeResourceParams) -> BoxFuture<'static, McpResult<()>>
        + Send
        + Sync,
>;
/// User-supplied `completion/complete` handler.
pub type CompleteHandler = Arc<
    dyn Fn(RequestContext, CompleteParams) -> BoxFuture<'static, McpResult<CompleteResult>>
        + Send
        + Sync,
>;

/// Builder for configuring an MCP server.
///
/// Capabilities follow from what is registered: adding a tool or a tools
/// handler declares the tools capability, and so on. Paired handlers
/// (list+call, list+get, subscribe+unsubscribe) must both be present or
/// both absent; [`build`](Self::build) rejects asymmetry.
pub struct ServerBuilder {
    pub(crate) info: Implementation,
    pub(crate) instructions: Option<String>,
    pub(crate) protocol_version: String,
    pub(crate) tools: PrimitiveCollection<ServerTool>,
    pub(crate) prompts: PrimitiveCollection<ServerPrompt>,
    tools_enabled: bool,
    tools_list_changed: bool,
    prompts_enabled: bool,
    prompts_list_changed: bool,
    resource_subscriptions: bool,
    resources_list_changed: bool,
    logging_enabled: bool,
    pub(crate) notification_handlers: Vec<(String, NotificationHandler)>,
    pub(crate) list_tools_handler: Option<ListToolsHandler>,
    pub(crate) call_tool_handler: Option<CallToolHandler>,
    pub(crate) list_prompts_handler: Option<ListPromptsHandler>,
    pub(crate) get_prompt_handler: Option<GetPromptHandler>,
    pub(crate) list_resources_handler: Option<ListResourcesHandler>,
    pub(crate) read_resource_handler: Option<ReadResourceHandler>,
    pub(crate) list_resource_templates_handler: Option<ListResourceTemplatesHandler>,
    pub(crate) subscribe_resource_handler: Option<SubscribeResourceHandler>,
    pub(crate) unsubscribe_resource_handler: Option<UnsubscribeResourceHandler>,
    pub(crate) complete_handler: Option<CompleteHandler>,
}

impl ServerBuilder {
    /// Creates a builder for a server with the given identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            instructions: None,
            protocol_version: PROTOCOL_VERSION.to_string(),
            tools: PrimitiveCollection::new(),
            prompts: PrimitiveCollection::new(),
            tools_enabled: false,
            tools_list_changed: true,
            prompts_enabled: false,
            prompts_list_changed: true,
            resource_subscriptions: false,
            resources_list_changed: false,
            logging_enabled: false,
            notification_handlers: Vec::new(),
            list_tools_handler: None,
            call_tool_handler: None,
            list_prompts_handler: None,
            get_prompt_handler: None,
            list_resources_handler: None,
            read_resource_handler: None,
            list_resource_templates_handler: None,
            subscribe_resource_handler: None,
            unsubscribe_resource_handler: None,
            complete_handler: None,
        }
    }

    /// Sets the instructions returned from `initialize`.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets the protocol version the server speaks.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Adds a tool to the collection, declaring the tools capability.
    #[must_use]
    pub fn tool(self, tool: ServerTool) -> Self {
        self.tools.insert(tool);
        self.enable_tools()
    }

    /// Declares the tools capability without registering anything yet.
    #[must_use]
    pub fn enable_tools(mut self) -> Self {
        self.tools_enabled = true;
        self
    }

    /// Adds a prompt to the collection, declaring the prompts capability.
    #[must_use]
    pub fn prompt(self, prompt: ServerPrompt) -> Self {
        self.prompts.insert(prompt);
        self.enable_prompts()
    }

    /// Declares the prompts capability without registering anything yet.
    #[must_use]
    pub fn enable_prompts(mut self) -> Self {
        self.prompts_enabled = true;
        self
    }

    /// Advertises `subscribe` on the resources capability.
    ///
    /// Subscription state is tracked per session; the optional
    /// subscribe/unsubscribe hooks observe it.
    #[must_use]
    pub fn enable_resource_subscriptions(mut self) -> Self {
        self.resource_subscriptions = true;
        self
    }

    /// Declares the logging capability (`logging/setLevel`,
    /// `notifications/message`).
    #[must_use]
    pub fn enable_logging(mut self) -> Self {
        self.logging_enabled = true;
        self
    }

    /// Sets the user `tools/list` handler; paired with
    /// [`call_tool_handler`](Self::call_tool_handler).
    #[must_use]
    pub fn list_tools_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListToolsResult>> + Send + 'static,
    {
        self.list_tools_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.tools_enabled = true;
        self
    }

    /// Sets the user `tools/call` handler; paired with
    /// [`list_tools_handler`](Self::list_tools_handler).
    #[must_use]
    pub fn call_tool_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, CallToolParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        self.call_tool_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.tools_enabled = true;
        self
    }

    /// Sets the user `prompts/list` handler; paired with
    /// [`get_prompt_handler`](Self::get_prompt_handler).
    #[must_use]
    pub fn list_prompts_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListPromptsResult>> + Send + 'static,
    {
        self.list_prompts_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.prompts_enabled = true;
        self
    }

    /// Sets the user `prompts/get` handler; paired with
    /// [`list_prompts_handler`](Self::list_prompts_handler).
    #[must_use]
    pub fn get_prompt_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, GetPromptParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<GetPromptResult>> + Send + 'static,
    {
        self.get_prompt_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.prompts_enabled = true;
        self
    }

    /// Sets the `resources/list` handler; the resources capability requires
    /// this together with [`read_resource_handler`](Self::read_resource_handler).
    #[must_use]
    pub fn list_resources_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, PageParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListResourcesResult>> + Send + 'static,
    {
        self.list_resources_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self
    }

    /// Sets the `resources/read` handler.
    #[must_use]
    pub fn read_resource_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, ReadResourceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ReadResourceResult>> + Send + 'static,
    {
        self.read_resource_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self
    }

    /// Sets the `resources/templates/list` handler. Optional; the default
    /// returns no templates.
    #[must_use]
    pub fn resource_templates_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ListResourceTemplatesResult>> + Send + 'static,
    {
        self.list_resource_templates_handler = Some(Arc::new(move |ctx| Box::pin(f(ctx))));
        self
    }

    /// Sets the `resources/subscribe` hook; paired with
    /// [`unsubscribe_resource_handler`](Self::unsubscribe_resource_handler).
    #[must_use]
    pub fn subscribe_resource_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, SubscribeResourceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<()>> + Send + 'static,
    {
        self.subscribe_resource_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.resource_subscriptions = true;
        self
    }

    /// Sets the `resources/unsubscribe` hook.
    #[must_use]
    pub fn unsubscribe_resource_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, UnsubscribeResourceParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<()>> + Send + 'static,
    {
        self.unsubscribe_resource_handler =
            Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self.resource_subscriptions = true;
        self
    }

    /// Sets the `completion/complete` handler. Optional; the default
    /// returns an empty completion.
    #[must_use]
    pub fn complete_handler<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestContext, CompleteParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CompleteResult>> + Send + 'static,
    {
        self.complete_handler = Some(Arc::new(move |ctx, params| Box::pin(f(ctx, params))));
        self
    }

    /// Controls whether the tools capability advertises `listChanged`.
    #[must_use]
    pub fn tools_list_changed(mut self, enabled: bool) -> Self {
        self.tools_list_changed = enabled;
        self
    }

    /// Controls whether the prompts capability advertises `listChanged`.
    #[must_use]
    pub fn prompts_list_changed(mut self, enabled: bool) -> Self {
        self.prompts_list_changed = enabled;
        self
    }

    /// Controls whether the resources capability advertises `listChanged`.
    ///
    /// When enabled, emit changes with
    /// [`ServerConnection::notify_resources_list_changed`](crate::ServerConnection::notify_resources_list_changed).
    #[must_use]
    pub fn resources_list_changed(mut self, enabled: bool) -> Self {
        self.resources_list_changed = enabled;
        self
    }

    /// Registers a handler for a client-sent notification
    /// (e.g. `notifications/roots/list_changed`).
    #[must_use]
    pub fn notification_handler(
        mut self,
        method: impl Into<String>,
        handler: NotificationHandler,
    ) -> Self {
        self.notification_handlers.push((method.into(), handler));
        self
    }

    fn capabilities(&self, resources_enabled: bool) -> ServerCapabilities {
        ServerCapabilities {
            tools: self.tools_enabled.then(|| ToolsCapability {
                list_changed: self.tools_list_changed,
            }),
            prompts: self.prompts_enabled.then(|| PromptsCapability {
                list_changed: self.prompts_list_changed,
            }),
            resources: resources_enabled.then(|| ResourcesCapability {
                subscribe: self.resource_subscriptions,
                list_changed: self.resources_list_changed,
            }),
            logging: self.logging_enabled.then(LoggingCapability::default),
            experimental: None,
        }
    }

    /// Validates the configuration and produces a [`Server`].
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::HandlerPairAsymmetry`] when one side of a
    /// handler pair is missing, and
    /// [`ServerError::MissingCapabilityHandler`] when a declared capability
    /// lacks its required handlers.
    pub fn build(self) -> Result<Server, ServerError> {
        if self.list_tools_handler.is_some() != self.call_tool_handler.is_some() {
            return Err(ServerError::HandlerPairAsymmetry {
                pair: "tools/list + tools/call",
            });
        }
        if self.list_prompts_handler.is_some() != self.get_prompt_handler.is_some() {
            return Err(ServerError::HandlerPairAsymmetry {
                pair: "prompts/list + prompts/get",
            });
        }
        if self.subscribe_resource_handler.is_some() != self.unsubscribe_resource_handler.is_some()
        {
            return Err(ServerError::HandlerPairAsymmetry {
                pair: "resources/subscribe + resources/unsubscribe",
            });
        }

        let resources_enabled = self.list_resources_handler.is_some()
            || self.read_resource_handler.is_some()
            || self.list_resource_templates_handler.is_some()
            || self.resource_subscriptions;
        if resources_enabled
            && (self.list_resources_handler.is_none() || self.read_resource_handler.is_none())
        {
            return Err(ServerError::MissingCapabilityHandler {
                capability: "resources",
                methods: "resources/list + resources/read",
            });
        }

        let capabilities = self.capabilities(resources_enabled);
        Ok(Server::from_builder(self, capabilities))
    }
}
