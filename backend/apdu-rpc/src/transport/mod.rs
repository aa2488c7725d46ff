//! The two seams everything else is written against.
//!
//! [`ClientTransport`] delivers one request and resolves with its response.
//! [`ServerTransport`] owns a listening resource, hands each request to the
//! registered [`RpcHandler`], and pushes events where the medium allows it.
//! The adapter and the proxies never see a concrete binding.

pub mod events;
pub mod http;
pub mod memory;
pub mod ws;

pub use events::{EventCallback, EventListeners, Subscription};
pub use http::{HttpClientTransport, HttpServerConfig, HttpServerTransport};
pub use memory::InMemoryTransport;
pub use ws::{WsClientTransport, WsServerConfig, WsServerTransport};

use crate::error::TransportError;

use models::{RpcEvent, RpcRequest, RpcResponse};

use std::sync::Arc;

use async_trait::async_trait;

/// Turns a request into a response. Must not fail; errors travel inside the
/// response.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn handle(&self, request: RpcRequest) -> RpcResponse;
}

#[async_trait]
pub trait ClientTransport: Send + Sync {
    /// Sends one request. No retry, no timeout unless the binding adds one.
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Subscribes to pushed events. `None` means this binding has no push
    /// channel and nothing will ever be delivered.
    fn on_event(&self, _callback: EventCallback) -> Option<Subscription> {
        None
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Registers the single handler. A later call replaces the earlier one.
    fn on_request(&self, handler: Arc<dyn RpcHandler>);

    /// Pushes to connected clients. A no-op without a push channel.
    fn emit_event(&self, event: RpcEvent);

    async fn start(&self) -> Result<(), TransportError>;

    async fn stop(&self) -> Result<(), TransportError>;
}
