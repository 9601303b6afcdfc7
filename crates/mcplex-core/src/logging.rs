//! Structured logging for mcplex.
//!
//! All mcplex crates log through the [`tracing`] facade using the
//! hierarchical targets below. The library never installs a subscriber;
//! applications pick their own backend:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("mcplex=debug,mcplex::transport=trace")
//!     .init();
//! ```
//!
//! # Log Levels
//!
//! - **error**: unrecoverable failures, transport loss
//! - **warn**: recoverable issues (unknown response id, dropped lines)
//! - **info**: session lifecycle (connect, handshake, shutdown)
//! - **debug**: request/response flow, handler dispatch
//! - **trace**: wire-level message details

// Re-export tracing macros for ergonomic use
pub use tracing::{debug, error, info, trace, warn};

/// Log targets used by mcplex components.
///
/// Use these constants with the `target:` argument to log macros
/// for consistent filtering.
pub mod targets {
    /// Root target for all mcplex logs.
    pub const MCPLEX: &str = "mcplex";

    /// Shared endpoint: correlation, dispatch, read loop.
    pub const ENDPOINT: &str = "mcplex::endpoint";

    /// Transport layer (stdio, in-memory).
    pub const TRANSPORT: &str = "mcplex::transport";

    /// Client role: handshake and typed calls.
    pub const CLIENT: &str = "mcplex::client";

    /// Server role: routing and primitive collections.
    pub const SERVER: &str = "mcplex::server";

    /// Session state: capabilities, subscriptions.
    pub const SESSION: &str = "mcplex::session";
}
