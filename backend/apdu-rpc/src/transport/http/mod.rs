//! Request/response binding over HTTP `POST`.
//!
//! The response body is authoritative. The server answers `200` for
//! error-carrying responses, `503` when it has no platform at all and `500`
//! for faults outside dispatch, each with an [`models::RpcResponse`] body, so
//! the client decodes every status the same way. Only a body that is not an
//! `RpcResponse` becomes a [`crate::TransportError`].
//!
//! There is no push channel. `on_event` returns `None` on the client and
//! `emit_event` drops events on the server.

mod client;
mod server;

pub use client::HttpClientTransport;
pub use server::{HttpServerConfig, HttpServerTransport};

/// Path segment requests are posted to, relative to the base URL.
pub const DEFAULT_RPC_PATH: &str = "rpc";
