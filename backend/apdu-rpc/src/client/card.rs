use crate::client::device::DeviceProxy;
use crate::client::rpc::{RpcCaller, param};
use crate::error::SmartCardError;
use crate::platform::SmartCard;

use models::{
    CommandApdu, ResponseApdu, RpcMethod, SerializedCommandApdu, SerializedResponseApdu,
};

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

/// Remote card session. The owning device is referenced weakly; releasing
/// the card only tells the device to forget it.
pub struct CardProxy {
    handle: String,
    caller: Arc<RpcCaller>,
    device: Weak<DeviceProxy>,
}

impl CardProxy {
    pub(crate) fn new(handle: String, caller: Arc<RpcCaller>, device: Weak<DeviceProxy>) -> Self {
        Self {
            handle,
            caller,
            device,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    fn handle_param(&self) -> Value {
        Value::String(self.handle.clone())
    }
}

#[async_trait]
impl SmartCard for CardProxy {
    async fn get_atr(&self) -> Result<Vec<u8>, SmartCardError> {
        self.caller
            .call_as(RpcMethod::CardGetAtr, vec![self.handle_param()])
            .await
    }

    async fn transmit(&self, command: &CommandApdu) -> Result<ResponseApdu, SmartCardError> {
        let wire = param(&SerializedCommandApdu::from(command))?;
        let response: SerializedResponseApdu = self
            .caller
            .call_as(RpcMethod::CardTransmit, vec![self.handle_param(), wire])
            .await?;
        Ok(ResponseApdu::from(response))
    }

    async fn transmit_raw(&self, command: &[u8]) -> Result<Vec<u8>, SmartCardError> {
        self.caller
            .call_as(
                RpcMethod::CardTransmitRaw,
                vec![self.handle_param(), param(command)?],
            )
            .await
    }

    async fn reset(&self) -> Result<(), SmartCardError> {
        self.caller
            .call_unit(RpcMethod::CardReset, vec![self.handle_param()])
            .await
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        self.caller
            .call_unit(RpcMethod::CardRelease, vec![self.handle_param()])
            .await?;
        if let Some(device) = self.device.upgrade() {
            device.untrack_card(&self.handle);
        }
        debug!("Released remote card {}", self.handle);
        Ok(())
    }
}
