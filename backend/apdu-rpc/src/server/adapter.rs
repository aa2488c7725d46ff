use crate::error::{SmartCardError, TransportError};
use crate::platform::{SmartCard, SmartCardDevice, SmartCardPlatform};
use crate::server::handles::HandleTable;
use crate::server::params::Params;
use crate::transport::{RpcHandler, ServerTransport};

use models::{
    CommandApdu, RpcMethod, RpcRequest, RpcResponse, SerializedCommandApdu,
    SerializedDeviceInfo, SerializedResponseApdu,
};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

const DEVICE_HANDLE_PREFIX: &str = "device";
const CARD_HANDLE_PREFIX: &str = "card";

struct DeviceEntry {
    device: Arc<dyn SmartCardDevice>,
    device_id: String,
    /// Card handle of the live session, if any. Held across `start_session`
    /// and for the whole of `device.release`, so neither can interleave with
    /// the other.
    session: AsyncMutex<Option<String>>,
    /// Set under the session lock once the device is released. Requests that
    /// were queued on the lock see `HANDLE_NOT_FOUND`.
    released: AtomicBool,
}

struct CardEntry {
    card: Arc<dyn SmartCard>,
    device_handle: String,
    /// Serializes APDU exchanges, resets and release on one card.
    exchange: AsyncMutex<()>,
    released: AtomicBool,
}

struct AdapterCore {
    platform: Arc<dyn SmartCardPlatform>,
    devices: HandleTable<DeviceEntry>,
    cards: HandleTable<CardEntry>,
}

/// Exposes a [`SmartCardPlatform`] through a [`ServerTransport`].
///
/// Handles for devices and cards are minted here (`device-<n>`, `card-<n>`)
/// and are the only way clients address server-side objects. Every failure,
/// panics included, is turned into an error response at [`Self::handle_request`].
pub struct SmartCardPlatformAdapter {
    core: Arc<AdapterCore>,
    transport: Arc<dyn ServerTransport>,
}

impl SmartCardPlatformAdapter {
    /// Registers itself as the transport's request handler.
    pub fn new(platform: Arc<dyn SmartCardPlatform>, transport: Arc<dyn ServerTransport>) -> Self {
        let core = Arc::new(AdapterCore {
            platform,
            devices: HandleTable::new(DEVICE_HANDLE_PREFIX),
            cards: HandleTable::new(CARD_HANDLE_PREFIX),
        });
        transport.on_request(Arc::clone(&core) as Arc<dyn RpcHandler>);
        Self { core, transport }
    }

    pub async fn start(&self) -> Result<(), TransportError> {
        self.transport.start().await?;
        info!("Smart card adapter started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), TransportError> {
        self.transport.stop().await?;
        info!("Smart card adapter stopped");
        Ok(())
    }

    pub async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        self.core.handle_request(request).await
    }

    /// The dispatcher behind this adapter, for registering on further
    /// transports. Every transport it is registered on shares one set of
    /// handles.
    pub fn handler(&self) -> Arc<dyn RpcHandler> {
        Arc::clone(&self.core) as Arc<dyn RpcHandler>
    }

    pub fn device_handles(&self) -> Vec<String> {
        self.core.devices.handles()
    }

    pub fn card_handles(&self) -> Vec<String> {
        self.core.cards.handles()
    }
}

#[async_trait]
impl RpcHandler for AdapterCore {
    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        self.handle_request(request).await
    }
}

impl AdapterCore {
    async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        debug!("Dispatching {} ({})", request.method, request.id);

        let outcome = AssertUnwindSafe(self.dispatch(&request.method, &request.params))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => RpcResponse::success(request.id, result),
            Ok(Err(e)) => {
                debug!("{} ({}) failed: {e}", request.method, request.id);
                RpcResponse::failure(request.id, e.to_rpc_error())
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| String::from("Unknown error"));
                error!("{} ({}) panicked: {message}", request.method, request.id);
                RpcResponse::failure(
                    request.id,
                    SmartCardError::internal(message).to_rpc_error(),
                )
            }
        }
    }

    async fn dispatch(&self, method: &str, params: &[Value]) -> Result<Value, SmartCardError> {
        let Some(rpc_method) = RpcMethod::parse(method) else {
            return Err(SmartCardError::internal(format!("Unknown method: {method}")));
        };
        let params = Params::new(rpc_method, params);

        match rpc_method {
            RpcMethod::PlatformInit => {
                self.platform.init(params.optional_bool(0)?).await?;
                Ok(Value::Null)
            }
            RpcMethod::PlatformRelease => {
                self.release_all().await;
                self.platform.release(params.optional_bool(0)?).await?;
                Ok(Value::Null)
            }
            RpcMethod::PlatformIsInitialized => Ok(Value::Bool(self.platform.is_initialized())),
            RpcMethod::PlatformGetDeviceInfo => {
                let infos: Vec<SerializedDeviceInfo> = self
                    .platform
                    .get_device_info()
                    .await?
                    .iter()
                    .map(SerializedDeviceInfo::from)
                    .collect();
                to_json(&infos)
            }
            RpcMethod::PlatformAcquireDevice => {
                let device_id = params.string(0)?;
                let device = self.platform.acquire_device(device_id).await?;
                let handle = self.devices.insert(Arc::new(DeviceEntry {
                    device,
                    device_id: device_id.to_string(),
                    session: AsyncMutex::new(None),
                    released: AtomicBool::new(false),
                }));
                info!("Acquired device {device_id} as {handle}");
                Ok(Value::String(handle))
            }

            RpcMethod::DeviceGetDeviceInfo => {
                let entry = self.device(params.handle()?)?;
                to_json(&SerializedDeviceInfo::from(&entry.device.get_device_info()))
            }
            RpcMethod::DeviceIsSessionActive => {
                let entry = self.device(params.handle()?)?;
                Ok(Value::Bool(entry.device.is_session_active()))
            }
            RpcMethod::DeviceIsDeviceAvailable => {
                let entry = self.device(params.handle()?)?;
                Ok(Value::Bool(entry.device.is_device_available().await?))
            }
            RpcMethod::DeviceIsCardPresent => {
                let entry = self.device(params.handle()?)?;
                Ok(Value::Bool(entry.device.is_card_present().await?))
            }
            RpcMethod::DeviceStartSession => {
                let device_handle = params.handle()?;
                let entry = self.device(device_handle)?;
                let mut session = entry.session.lock().await;
                ensure_device_live(&entry, device_handle)?;

                if let Some(card_handle) = session.as_deref()
                    && self.cards.contains(card_handle)
                {
                    return Err(SmartCardError::already_connected(format!(
                        "Device {device_handle} already has an active session: {card_handle}"
                    )));
                }

                let card = entry.device.start_session().await?;
                let card_handle = self.cards.insert(Arc::new(CardEntry {
                    card,
                    device_handle: device_handle.to_string(),
                    exchange: AsyncMutex::new(()),
                    released: AtomicBool::new(false),
                }));
                *session = Some(card_handle.clone());
                info!("Started session {card_handle} on {device_handle}");
                Ok(Value::String(card_handle))
            }
            RpcMethod::DeviceWaitForCardPresence => {
                let entry = self.device(params.handle()?)?;
                let timeout = params.millis(1)?;
                entry.device.wait_for_card_presence(timeout).await?;
                Ok(Value::Null)
            }
            RpcMethod::DeviceRelease => {
                let device_handle = params.handle()?;
                let entry = self.device(device_handle)?;
                let mut session = entry.session.lock().await;
                ensure_device_live(&entry, device_handle)?;

                if let Some(card_handle) = session.take()
                    && let Err(e) = self.release_card(&card_handle).await
                {
                    debug!("Card {card_handle} not released with {device_handle}: {e}");
                }
                entry.device.release().await?;
                entry.released.store(true, Ordering::SeqCst);
                self.devices.remove(device_handle);
                drop(session);
                info!("Released device {} ({device_handle})", entry.device_id);
                Ok(Value::Null)
            }

            RpcMethod::CardGetAtr => {
                let entry = self.card(params.handle()?)?;
                to_json(&entry.card.get_atr().await?)
            }
            RpcMethod::CardTransmit => {
                let card_handle = params.handle()?;
                let entry = self.card(card_handle)?;
                let wire: SerializedCommandApdu = params.decode(1)?;
                let command = CommandApdu::try_from(wire)?;

                let _exchange = entry.exchange.lock().await;
                ensure_live(&entry, card_handle)?;
                let response = entry.card.transmit(&command).await?;
                to_json(&SerializedResponseApdu::from(&response))
            }
            RpcMethod::CardTransmitRaw => {
                let card_handle = params.handle()?;
                let entry = self.card(card_handle)?;
                let raw: Vec<u8> = params.decode(1)?;

                let _exchange = entry.exchange.lock().await;
                ensure_live(&entry, card_handle)?;
                to_json(&entry.card.transmit_raw(&raw).await?)
            }
            RpcMethod::CardReset => {
                let card_handle = params.handle()?;
                let entry = self.card(card_handle)?;

                let _exchange = entry.exchange.lock().await;
                ensure_live(&entry, card_handle)?;
                entry.card.reset().await?;
                Ok(Value::Null)
            }
            RpcMethod::CardRelease => {
                self.release_card(params.handle()?).await?;
                Ok(Value::Null)
            }
        }
    }

    #[track_caller]
    fn device(&self, handle: &str) -> Result<Arc<DeviceEntry>, SmartCardError> {
        self.devices
            .get(handle)
            .ok_or_else(|| SmartCardError::handle_not_found(format!("Device not found: {handle}")))
    }

    #[track_caller]
    fn card(&self, handle: &str) -> Result<Arc<CardEntry>, SmartCardError> {
        self.cards
            .get(handle)
            .ok_or_else(|| SmartCardError::handle_not_found(format!("Card not found: {handle}")))
    }

    /// Waits for in-flight exchanges on the card, releases it and forgets the
    /// handle. Anyone queued behind the release sees `HANDLE_NOT_FOUND`.
    async fn release_card(&self, card_handle: &str) -> Result<(), SmartCardError> {
        let entry = self.card(card_handle)?;
        let _exchange = entry.exchange.lock().await;
        ensure_live(&entry, card_handle)?;

        entry.card.release().await?;
        entry.released.store(true, Ordering::SeqCst);
        self.cards.remove(card_handle);
        info!("Released session {card_handle} on {}", entry.device_handle);
        Ok(())
    }

    /// Best-effort teardown of every card, then every device.
    async fn release_all(&self) {
        for card_handle in self.cards.handles() {
            if let Err(e) = self.release_card(&card_handle).await {
                warn!("Ignoring failure releasing {card_handle}: {e}");
            }
        }
        for (device_handle, entry) in self.devices.drain() {
            let _session = entry.session.lock().await;
            if entry.released.swap(true, Ordering::SeqCst) {
                continue;
            }
            if let Err(e) = entry.device.release().await {
                warn!("Ignoring failure releasing {device_handle}: {e}");
            }
        }
        // Cards whose release failed are dropped too; their devices are gone.
        self.cards.drain();
    }
}

#[track_caller]
fn ensure_device_live(entry: &DeviceEntry, device_handle: &str) -> Result<(), SmartCardError> {
    if entry.released.load(Ordering::SeqCst) {
        return Err(SmartCardError::handle_not_found(format!(
            "Device not found: {device_handle}"
        )));
    }
    Ok(())
}

#[track_caller]
fn ensure_live(entry: &CardEntry, card_handle: &str) -> Result<(), SmartCardError> {
    if entry.released.load(Ordering::SeqCst) {
        return Err(SmartCardError::handle_not_found(format!(
            "Card not found: {card_handle}"
        )));
    }
    Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, SmartCardError> {
    serde_json::to_value(value)
        .map_err(|e| SmartCardError::internal(format!("Failed to serialize result: {e}")))
}
