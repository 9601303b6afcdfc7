//! Shared JSON-RPC endpoint core.
//!
//! Both MCP roles run on the same machinery: a single reader task owns the
//! inbound stream, outbound requests are correlated with responses through a
//! pending-completion table, and each inbound request is dispatched on its
//! own task so slow handlers never block the stream.
//!
//! The client and server crates build an [`EndpointBuilder`], install their
//! role's handlers, and call [`EndpointBuilder::connect`] to turn a raw
//! transport into a live [`Endpoint`].

#![forbid(unsafe_code)]

mod endpoint;
mod handler;

pub use endpoint::{Endpoint, EndpointBuilder, WeakEndpoint};
pub use handler::{
    BoxFuture, NotificationHandler, RequestContext, RequestHandler, notification_handler,
    request_handler,
};
