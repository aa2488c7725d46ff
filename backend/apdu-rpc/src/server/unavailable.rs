use crate::transport::RpcHandler;

use models::{RpcError, RpcRequest, RpcResponse, codes};

use async_trait::async_trait;
use log::debug;

/// Answers every request with `NOT_AVAILABLE`.
///
/// Registered in place of the adapter when the configured platform could not
/// be constructed, so clients get a clean error instead of a dead socket.
pub struct UnavailableHandler {
    reason: String,
}

impl UnavailableHandler {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl RpcHandler for UnavailableHandler {
    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        debug!("Refusing {} ({}): platform unavailable", request.method, request.id);
        RpcResponse::failure(
            request.id,
            RpcError::new(codes::NOT_AVAILABLE, self.reason.clone()),
        )
    }
}
