//! mcplex: a bidirectional MCP endpoint runtime.
//!
//! A JSON-RPC 2.0 messaging engine with a capability-negotiated
//! initialization handshake, pluggable transports, and the typed MCP
//! method surface for tools, prompts, resources, sampling, roots,
//! logging, and progress.
//!
//! # Crates
//!
//! - [`mcplex_protocol`]: envelopes and typed method payloads
//! - [`mcplex_transport`]: transport traits, NDJSON codec, stdio, memory
//! - [`mcplex_endpoint`]: the shared endpoint core
//! - [`mcplex_client`] / [`mcplex_server`]: the two roles
//!
//! # Quick start
//!
//! ```ignore
//! use mcplex::prelude::*;
//!
//! let server = Server::builder("demo", "1.0")
//!     .tool(my_tool())
//!     .build()?;
//! let connection = server.serve(StdioTransport::stdio());
//! connection.closed().await;
//! ```

#![forbid(unsafe_code)]

pub use mcplex_client as client;
pub use mcplex_core as core;
pub use mcplex_endpoint as endpoint;
pub use mcplex_protocol as protocol;
pub use mcplex_server as server;
pub use mcplex_transport as transport;

/// Commonly used types for building MCP clients and servers.
pub mod prelude {
    pub use mcplex_client::{Client, ClientBuilder, ClientError};
    pub use mcplex_core::{McpError, McpErrorCode, McpResult};
    pub use mcplex_endpoint::{Endpoint, EndpointBuilder, RequestContext};
    pub use mcplex_protocol::{
        CallToolParams, CallToolResult, ClientCapabilities, Content, Implementation,
        Prompt, RequestId, Resource, Root, ServerCapabilities, Tool, PROTOCOL_VERSION,
    };
    pub use mcplex_server::{
        PrimitiveCollection, Server, ServerBuilder, ServerConnection, ServerError, ServerPrompt,
        ServerTool,
    };
    pub use mcplex_transport::{ServerTransport, StdioTransport, Transport, TransportError};
}
