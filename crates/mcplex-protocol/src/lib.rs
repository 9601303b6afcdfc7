//! MCP protocol types and JSON-RPC implementation.
//!
//! This crate provides:
//! - JSON-RPC 2.0 message types
//! - MCP-specific method types (tools, prompts, resources, sampling, roots)
//! - Method name constants for the full MCP method set
//! - Protocol version negotiation types
//!
//! # MCP Protocol Overview
//!
//! MCP (Model Context Protocol) uses JSON-RPC 2.0 over various transports.
//! The protocol defines:
//!
//! - **Tools**: Executable functions the client can invoke
//! - **Prompts**: Template prompts for the client to use
//! - **Resources**: Data sources the client can read
//! - **Sampling**: Client-hosted completion generation requested by the server
//! - **Roots**: Filesystem-like anchor URIs advertised by the client
//!
//! # Wire Format
//!
//! All messages are newline-delimited JSON (NDJSON).

#![forbid(unsafe_code)]

mod jsonrpc;
mod messages;
pub mod methods;
mod types;

pub use jsonrpc::{
    IdSequence, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId, ResponseOutcome, V2, JSONRPC_VERSION,
};
pub use messages::*;
pub use types::*;
