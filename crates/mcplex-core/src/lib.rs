//! Core types for mcplex.
//!
//! This crate provides the fundamental building blocks shared by every
//! other mcplex crate:
//! - The MCP error model ([`McpError`], [`McpErrorCode`])
//! - The logging facade and hierarchical log targets
//!
//! # Design Principles
//!
//! - All types support `Send + Sync`
//! - Errors cross the wire unchanged: a handler's structured [`McpError`]
//!   becomes the JSON-RPC error object verbatim
//! - No logging sink is installed here; applications pick their own
//!   `tracing` subscriber

#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::{McpError, McpErrorCode, McpResult};
