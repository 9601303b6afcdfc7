//! Client session state.

use mcplex_protocol::{ClientCapabilities, Implementation, ServerCapabilities};

/// Client-side session state, captured after a successful handshake.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Client info sent during initialization.
    client_info: Implementation,
    /// Client capabilities sent during initialization.
    client_capabilities: ClientCapabilities,
    /// Server info received during initialization.
    server_info: Implementation,
    /// Server capabilities received during initialization.
    server_capabilities: ServerCapabilities,
    /// Negotiated protocol version.
    protocol_version: String,
    /// Server-provided instructions, if any.
    instructions: Option<String>,
}

impl ClientSession {
    /// Creates a new client session after successful initialization.
    #[must_use]
    pub fn new(
        client_info: Implementation,
        client_capabilities: ClientCapabilities,
        server_info: Implementation,
        server_capabilities: ServerCapabilities,
        protocol_version: String,
        instructions: Option<String>,
    ) -> Self {
        Self {
            client_info,
            client_capabilities,
            server_info,
            server_capabilities,
            protocol_version,
            instructions,
        }
    }

    /// Returns the client info.
    #[must_use]
    pub fn client_info(&self) -> &Implementation {
        &self.client_info
    }

    /// Returns the client capabilities.
    #[must_use]
    pub fn client_capabilities(&self) -> &ClientCapabilities {
        &self.client_capabilities
    }

    /// Returns the server info.
    #[must_use]
    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    /// Returns the server capabilities.
    #[must_use]
    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.server_capabilities
    }

    /// Returns the negotiated protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Returns the server's instructions, if provided.
    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}
