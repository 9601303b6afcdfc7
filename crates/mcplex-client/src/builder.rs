//! Client builder and option validation.

use std::sync::Arc;
use std::time::Duration;

use mcplex_endpoint::NotificationHandler;
use mcplex_protocol::{
    methods, ClientCapabilities, Implementation, RootsCapability, SamplingCapability,
    PROTOCOL_VERSION,
};

use crate::roots::RootsHandler;
use crate::sampling::SamplingHandler;
use crate::{Client, ClientError};

/// Default initialization timeout.
pub(crate) const DEFAULT_INITIALIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for configuring an MCP client.
///
/// Declaring a capability requires supplying its handler: `sampling`
/// needs a [`SamplingHandler`], `roots` needs a [`RootsHandler`].
/// [`build`](Self::build) rejects an asymmetric configuration.
pub struct ClientBuilder {
    pub(crate) info: Implementation,
    pub(crate) capabilities: ClientCapabilities,
    pub(crate) protocol_version: String,
    pub(crate) initialize_timeout: Duration,
    pub(crate) sampling_handler: Option<Arc<dyn SamplingHandler>>,
    pub(crate) roots_handler: Option<Arc<dyn RootsHandler>>,
    pub(crate) notification_handlers: Vec<(String, NotificationHandler)>,
}

impl ClientBuilder {
    /// Creates a builder for a client with the given identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            capabilities: ClientCapabilities::default(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            initialize_timeout: DEFAULT_INITIALIZE_TIMEOUT,
            sampling_handler: None,
            roots_handler: None,
            notification_handlers: Vec::new(),
        }
    }

    /// Sets the protocol version to request; must match the server exactly.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Sets the initialization timeout (default 60 s).
    #[must_use]
    pub fn initialize_timeout(mut self, timeout: Duration) -> Self {
        self.initialize_timeout = timeout;
        self
    }

    /// Declares the sampling capability with its handler.
    #[must_use]
    pub fn with_sampling<H: SamplingHandler + 'static>(mut self, handler: H) -> Self {
        self.capabilities.sampling = Some(SamplingCapability::default());
        self.sampling_handler = Some(Arc::new(handler));
        self
    }

    /// Declares the roots capability with its handler.
    #[must_use]
    pub fn with_roots<H: RootsHandler + 'static>(mut self, handler: H, list_changed: bool) -> Self {
        self.capabilities.roots = Some(RootsCapability { list_changed });
        self.roots_handler = Some(Arc::new(handler));
        self
    }

    /// Overrides the declared capabilities wholesale.
    ///
    /// Declared sub-capabilities still require their handlers at
    /// [`build`](Self::build).
    #[must_use]
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Registers a handler for a server-sent notification
    /// (e.g. `notifications/tools/list_changed`).
    #[must_use]
    pub fn notification_handler(
        mut self,
        method: impl Into<String>,
        handler: NotificationHandler,
    ) -> Self {
        self.notification_handlers.push((method.into(), handler));
        self
    }

    /// Validates the configuration and produces an unconnected [`Client`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingCapabilityHandler`] if a declared
    /// capability lacks its handler.
    pub fn build(self) -> Result<Client, ClientError> {
        if self.capabilities.sampling.is_some() && self.sampling_handler.is_none() {
            return Err(ClientError::MissingCapabilityHandler {
                capability: "sampling",
                method: methods::SAMPLING_CREATE_MESSAGE,
            });
        }
        if self.capabilities.roots.is_some() && self.roots_handler.is_none() {
            return Err(ClientError::MissingCapabilityHandler {
                capability: "roots",
                method: methods::ROOTS_LIST,
            });
        }
        Ok(Client::from_builder(self))
    }
}
