//! Duplex binding over WebSocket text frames.
//!
//! Every frame is a JSON [`models::ClientFrame`] or [`models::ServerFrame`].
//! The first client frame on a connection must be `auth`; the server answers
//! `auth_result` and closes on failure. After that, requests are handled
//! concurrently and responses are written in completion order, so clients
//! correlate by `id`. Events are broadcast to every authenticated connection.

mod client;
mod server;

pub use client::WsClientTransport;
pub use server::{WsServerConfig, WsServerTransport};
