use crate::client::card::CardProxy;
use crate::client::platform::PlatformShared;
use crate::client::rpc::{RpcCaller, param};
use crate::error::SmartCardError;
use crate::platform::{EmulatedCard, SmartCard, SmartCardDevice};

use models::{DeviceInfo, RpcMethod};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

/// Clears `starting` however `start_session` ends.
struct StartingGuard<'a>(&'a AtomicBool);

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Remote reader addressed by a server-minted handle.
///
/// `is_session_active` is this proxy's own belief, set when a session is
/// opened and cleared on release. It says nothing about whether a card is
/// physically present.
pub struct DeviceProxy {
    this: Weak<DeviceProxy>,
    platform: Weak<PlatformShared>,
    caller: Arc<RpcCaller>,
    handle: String,
    info: DeviceInfo,
    session_active: AtomicBool,
    starting: AtomicBool,
    card: Mutex<Option<Arc<CardProxy>>>,
}

impl DeviceProxy {
    pub(crate) fn new(
        handle: String,
        info: DeviceInfo,
        caller: Arc<RpcCaller>,
        platform: Weak<PlatformShared>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            platform,
            caller,
            handle,
            info,
            session_active: AtomicBool::new(false),
            starting: AtomicBool::new(false),
            card: Mutex::new(None),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn device_id(&self) -> &str {
        self.info.id()
    }

    /// The open card session, if this proxy holds one.
    pub fn current_card(&self) -> Option<Arc<CardProxy>> {
        self.card_slot().clone()
    }

    fn card_slot(&self) -> MutexGuard<'_, Option<Arc<CardProxy>>> {
        self.card.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_param(&self) -> Value {
        Value::String(self.handle.clone())
    }

    /// Called by a card proxy after its remote release.
    pub(crate) fn untrack_card(&self, card_handle: &str) {
        let mut slot = self.card_slot();
        if slot.as_ref().is_some_and(|card| card.handle() == card_handle) {
            *slot = None;
            self.session_active.store(false, Ordering::SeqCst);
            debug!("Untracked card {card_handle} on {}", self.handle);
        }
    }
}

#[async_trait]
impl SmartCardDevice for DeviceProxy {
    fn get_device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn is_session_active(&self) -> bool {
        self.session_active.load(Ordering::SeqCst)
    }

    async fn is_device_available(&self) -> Result<bool, SmartCardError> {
        self.caller
            .call_as(RpcMethod::DeviceIsDeviceAvailable, vec![self.handle_param()])
            .await
    }

    async fn is_card_present(&self) -> Result<bool, SmartCardError> {
        self.caller
            .call_as(RpcMethod::DeviceIsCardPresent, vec![self.handle_param()])
            .await
    }

    async fn start_session(&self) -> Result<Arc<dyn SmartCard>, SmartCardError> {
        if self.card_slot().is_some() || self.starting.swap(true, Ordering::SeqCst) {
            return Err(SmartCardError::already_connected(format!(
                "Device {} already has an active session",
                self.device_id()
            )));
        }
        let _starting = StartingGuard(&self.starting);

        let card_handle: String = self
            .caller
            .call_as(RpcMethod::DeviceStartSession, vec![self.handle_param()])
            .await?;
        self.session_active.store(true, Ordering::SeqCst);

        let card = Arc::new(CardProxy::new(
            card_handle.clone(),
            Arc::clone(&self.caller),
            self.this.clone(),
        ));
        *self.card_slot() = Some(Arc::clone(&card));
        info!("Session {card_handle} started on {}", self.handle);
        Ok(card)
    }

    /// The server side enforces the timeout; there is no local polling.
    async fn wait_for_card_presence(&self, timeout: Duration) -> Result<(), SmartCardError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.caller
            .call_unit(
                RpcMethod::DeviceWaitForCardPresence,
                vec![self.handle_param(), param(&millis)?],
            )
            .await
    }

    async fn start_hce_session(&self) -> Result<Arc<dyn EmulatedCard>, SmartCardError> {
        Err(SmartCardError::unsupported(
            "Host card emulation cannot be used over a remote connection",
        ))
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        let card = self.card_slot().take();
        if let Some(card) = card
            && let Err(e) = card.release().await
        {
            warn!(
                "Ignoring failure releasing card {} on {}: {e}",
                card.handle(),
                self.handle
            );
        }

        self.caller
            .call_unit(RpcMethod::DeviceRelease, vec![self.handle_param()])
            .await?;
        self.session_active.store(false, Ordering::SeqCst);

        if let Some(platform) = self.platform.upgrade() {
            platform.untrack_device(self.device_id(), &self.handle);
        }
        info!("Released remote device {} ({})", self.device_id(), self.handle);
        Ok(())
    }
}
