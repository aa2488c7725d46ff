use crate::error::TransportError;
use crate::transport::{
    ClientTransport, EventCallback, EventListeners, RpcHandler, ServerTransport, Subscription,
};

use models::{RpcError, RpcEvent, RpcRequest, RpcResponse, codes};

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use log::debug;

/// Both ends in one process. `call` invokes the registered handler directly;
/// `emit_event` reaches subscribers synchronously.
///
/// Clones share the same handler and subscribers, so one clone can serve as
/// the server side and another as the client side.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    handler: Arc<RwLock<Option<Arc<dyn RpcHandler>>>>,
    listeners: EventListeners,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_handler(&self) -> Option<Arc<dyn RpcHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ClientTransport for InMemoryTransport {
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        match self.current_handler() {
            Some(handler) => Ok(handler.handle(request).await),
            None => Ok(RpcResponse::failure(
                request.id,
                RpcError::new(codes::NO_HANDLER, "No request handler registered"),
            )),
        }
    }

    fn on_event(&self, callback: EventCallback) -> Option<Subscription> {
        Some(self.listeners.subscribe(callback))
    }
}

#[async_trait]
impl ServerTransport for InMemoryTransport {
    fn on_request(&self, handler: Arc<dyn RpcHandler>) {
        *self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn emit_event(&self, event: RpcEvent) {
        self.listeners.dispatch(&event);
    }

    async fn start(&self) -> Result<(), TransportError> {
        debug!("In-memory transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        debug!("In-memory transport stopped");
        Ok(())
    }
}
