use crate::client::request_id::RequestIdGenerator;
use crate::error::SmartCardError;
use crate::transport::ClientTransport;

use models::{RpcMethod, RpcRequest};

use std::sync::Arc;

use log::trace;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One RPC round trip: builds the request, checks the response belongs to
/// it, and turns an `error` payload into [`SmartCardError::Remote`].
pub(crate) struct RpcCaller {
    transport: Arc<dyn ClientTransport>,
    ids: RequestIdGenerator,
}

impl RpcCaller {
    pub(crate) fn new(transport: Arc<dyn ClientTransport>) -> Self {
        Self {
            transport,
            ids: RequestIdGenerator::new(),
        }
    }

    pub(crate) fn transport(&self) -> &Arc<dyn ClientTransport> {
        &self.transport
    }

    pub(crate) async fn call(
        &self,
        method: RpcMethod,
        params: Vec<Value>,
    ) -> Result<Value, SmartCardError> {
        let request = RpcRequest::new(self.ids.next_id(), method.as_str(), params);
        let id = request.id.clone();
        trace!("-> {method} ({id})");

        let response = self.transport.call(request).await?;
        if response.id != id {
            return Err(SmartCardError::protocol(format!(
                "Response id {} does not match request {id}",
                response.id
            )));
        }
        Ok(response.into_result()?)
    }

    /// [`Self::call`], then decodes the result into `T`.
    pub(crate) async fn call_as<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: Vec<Value>,
    ) -> Result<T, SmartCardError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            SmartCardError::protocol(format!("{method} returned an unexpected result: {e}"))
        })
    }

    /// For calls whose result carries nothing.
    pub(crate) async fn call_unit(
        &self,
        method: RpcMethod,
        params: Vec<Value>,
    ) -> Result<(), SmartCardError> {
        self.call(method, params).await.map(|_| ())
    }
}

/// Encodes one positional parameter.
pub(crate) fn param<T: Serialize + ?Sized>(value: &T) -> Result<Value, SmartCardError> {
    serde_json::to_value(value)
        .map_err(|e| SmartCardError::internal(format!("Failed to encode parameter: {e}")))
}
