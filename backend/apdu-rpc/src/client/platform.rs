use crate::client::device::DeviceProxy;
use crate::client::rpc::RpcCaller;
use crate::error::SmartCardError;
use crate::platform::{SmartCardDevice, SmartCardPlatform};
use crate::transport::{ClientTransport, EventCallback, Subscription};

use models::{DeviceInfo, RpcMethod, SerializedDeviceInfo, codes};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

#[derive(Default)]
struct DeviceTable {
    by_id: HashMap<String, Arc<DeviceProxy>>,
    by_handle: HashMap<String, Arc<DeviceProxy>>,
    /// Ids with an `acquireDevice` in flight.
    acquiring: HashSet<String>,
}

/// State shared between the platform proxy and the device proxies it hands
/// out. Devices keep a `Weak` to it so they can untrack themselves.
pub(crate) struct PlatformShared {
    caller: Arc<RpcCaller>,
    initialized: AtomicBool,
    devices: Mutex<DeviceTable>,
}

impl PlatformShared {
    fn devices(&self) -> MutexGuard<'_, DeviceTable> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by a device proxy once its remote release has gone through.
    pub(crate) fn untrack_device(&self, device_id: &str, handle: &str) {
        let mut table = self.devices();
        table.by_id.remove(device_id);
        table.by_handle.remove(handle);
        debug!("Untracked device {device_id} ({handle})");
    }

    #[track_caller]
    fn assert_initialized(&self) -> Result<(), SmartCardError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SmartCardError::not_initialized("Platform not initialized"));
        }
        Ok(())
    }
}

/// Removes the id from `acquiring` however the acquisition ends.
struct AcquireSlot<'a> {
    shared: &'a PlatformShared,
    device_id: &'a str,
}

impl Drop for AcquireSlot<'_> {
    fn drop(&mut self) {
        self.shared.devices().acquiring.remove(self.device_id);
    }
}

/// A [`SmartCardPlatform`] whose every operation is an RPC call.
///
/// Devices acquired through it are tracked locally so that [`release`]
/// can cascade to them first.
///
/// [`release`]: SmartCardPlatform::release
pub struct PlatformProxy {
    shared: Arc<PlatformShared>,
}

impl PlatformProxy {
    pub fn new(transport: Arc<dyn ClientTransport>) -> Self {
        Self {
            shared: Arc::new(PlatformShared {
                caller: Arc::new(RpcCaller::new(transport)),
                initialized: AtomicBool::new(false),
                devices: Mutex::new(DeviceTable::default()),
            }),
        }
    }

    /// Server push events, when the transport has a push channel.
    pub fn on_event(&self, callback: EventCallback) -> Option<Subscription> {
        self.shared.caller.transport().on_event(callback)
    }

    /// Device ids currently tracked by this proxy.
    pub fn tracked_device_ids(&self) -> Vec<String> {
        self.shared.devices().by_id.keys().cloned().collect()
    }

    pub fn tracked_device(&self, device_id: &str) -> Option<Arc<DeviceProxy>> {
        self.shared.devices().by_id.get(device_id).cloned()
    }

    async fn fetch_device_info(&self) -> Result<Vec<DeviceInfo>, SmartCardError> {
        let infos: Vec<SerializedDeviceInfo> = self
            .shared
            .caller
            .call_as(RpcMethod::PlatformGetDeviceInfo, Vec::new())
            .await?;
        Ok(infos.into_iter().map(DeviceInfo::from).collect())
    }
}

#[async_trait]
impl SmartCardPlatform for PlatformProxy {
    async fn init(&self, force: bool) -> Result<(), SmartCardError> {
        if !force && self.shared.initialized.load(Ordering::SeqCst) {
            return Err(SmartCardError::already_initialized(
                "Platform already initialized",
            ));
        }
        self.shared
            .caller
            .call_unit(RpcMethod::PlatformInit, vec![Value::Bool(force)])
            .await?;
        self.shared.initialized.store(true, Ordering::SeqCst);
        info!("Remote platform initialized");
        Ok(())
    }

    async fn release(&self, force: bool) -> Result<(), SmartCardError> {
        if !force {
            self.shared.assert_initialized()?;
        }

        let devices: Vec<Arc<DeviceProxy>> = self.shared.devices().by_id.values().cloned().collect();
        for device in devices {
            if let Err(e) = device.release().await {
                warn!(
                    "Ignoring failure releasing device {}: {e}",
                    device.device_id()
                );
            }
        }
        {
            let mut table = self.shared.devices();
            table.by_id.clear();
            table.by_handle.clear();
        }

        self.shared
            .caller
            .call_unit(RpcMethod::PlatformRelease, vec![Value::Bool(force)])
            .await?;
        self.shared.initialized.store(false, Ordering::SeqCst);
        info!("Remote platform released");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    async fn get_device_info(&self) -> Result<Vec<DeviceInfo>, SmartCardError> {
        self.shared.assert_initialized()?;
        self.fetch_device_info().await
    }

    async fn acquire_device(&self, id: &str) -> Result<Arc<dyn SmartCardDevice>, SmartCardError> {
        self.shared.assert_initialized()?;

        {
            let mut table = self.shared.devices();
            if table.by_id.contains_key(id) || !table.acquiring.insert(id.to_string()) {
                return Err(SmartCardError::already_connected(format!(
                    "Device already acquired: {id}"
                )));
            }
        }
        let _slot = AcquireSlot {
            shared: &self.shared,
            device_id: id,
        };

        let handle: String = self
            .shared
            .caller
            .call_as(
                RpcMethod::PlatformAcquireDevice,
                vec![Value::String(id.to_string())],
            )
            .await?;

        let info = match self.fetch_device_info().await {
            Ok(infos) => infos.into_iter().find(|info| info.id() == id),
            Err(e) => {
                self.release_orphan(&handle).await;
                return Err(e);
            }
        };
        let Some(info) = info else {
            self.release_orphan(&handle).await;
            return Err(SmartCardError::card(
                codes::DEVICE_NOT_FOUND,
                format!("Device {id} missing from the remote device list"),
            ));
        };

        let device = DeviceProxy::new(
            handle.clone(),
            info,
            Arc::clone(&self.shared.caller),
            Arc::downgrade(&self.shared),
        );
        {
            let mut table = self.shared.devices();
            table.by_id.insert(id.to_string(), Arc::clone(&device));
            table.by_handle.insert(handle.clone(), Arc::clone(&device));
        }
        info!("Acquired remote device {id} ({handle})");
        Ok(device)
    }
}

impl PlatformProxy {
    /// Gives back a handle we will never wrap in a proxy.
    async fn release_orphan(&self, handle: &str) {
        if let Err(e) = self
            .shared
            .caller
            .call_unit(
                RpcMethod::DeviceRelease,
                vec![Value::String(handle.to_string())],
            )
            .await
        {
            warn!("Ignoring failure releasing orphaned device handle {handle}: {e}");
        }
    }
}
