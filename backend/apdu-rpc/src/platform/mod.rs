//! Capability traits for smart-card access.
//!
//! A platform enumerates readers and hands out devices; a device opens at most
//! one card session at a time. [`crate::client::PlatformProxy`] and
//! [`mock::MockPlatform`] are independent implementations of the same traits,
//! so consumers written against `dyn SmartCardPlatform` cannot tell a local
//! reader from a remote one.
//!
//! All methods take `&self`; implementations keep their state behind interior
//! mutability so trait objects can be shared across tasks.

pub mod mock;

use crate::error::SmartCardError;

use models::{CommandApdu, DeviceInfo, ResponseApdu};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait SmartCardPlatform: Send + Sync {
    /// Without `force`, initializing twice is an `ALREADY_INITIALIZED` error.
    async fn init(&self, force: bool) -> Result<(), SmartCardError>;

    /// Without `force`, releasing an uninitialized platform is a
    /// `NOT_INITIALIZED` error.
    async fn release(&self, force: bool) -> Result<(), SmartCardError>;

    fn is_initialized(&self) -> bool;

    async fn get_device_info(&self) -> Result<Vec<DeviceInfo>, SmartCardError>;

    async fn acquire_device(&self, id: &str) -> Result<Arc<dyn SmartCardDevice>, SmartCardError>;
}

#[async_trait]
pub trait SmartCardDevice: Send + Sync {
    fn get_device_info(&self) -> DeviceInfo;

    fn is_session_active(&self) -> bool;

    async fn is_device_available(&self) -> Result<bool, SmartCardError>;

    async fn is_card_present(&self) -> Result<bool, SmartCardError>;

    /// Opens a card session. A device holds at most one live session.
    async fn start_session(&self) -> Result<Arc<dyn SmartCard>, SmartCardError>;

    /// Suspends until a card is detected or `timeout` elapses (`TIMEOUT`).
    async fn wait_for_card_presence(&self, timeout: Duration) -> Result<(), SmartCardError>;

    /// Host card emulation needs a local radio. Implementations without one
    /// keep this default.
    async fn start_hce_session(&self) -> Result<Arc<dyn EmulatedCard>, SmartCardError> {
        Err(SmartCardError::unsupported(
            "Host card emulation is not supported on this device",
        ))
    }

    async fn release(&self) -> Result<(), SmartCardError>;
}

#[async_trait]
pub trait SmartCard: Send + Sync {
    async fn get_atr(&self) -> Result<Vec<u8>, SmartCardError>;

    async fn transmit(&self, command: &CommandApdu) -> Result<ResponseApdu, SmartCardError>;

    /// Sends bytes as-is and returns the card's bytes as-is (`data ‖ sw1 ‖ sw2`).
    /// Nothing on the way is allowed to parse or reject them.
    async fn transmit_raw(&self, command: &[u8]) -> Result<Vec<u8>, SmartCardError>;

    async fn reset(&self) -> Result<(), SmartCardError>;

    async fn release(&self) -> Result<(), SmartCardError>;
}

/// A card emulated by the host.
#[async_trait]
pub trait EmulatedCard: Send + Sync {
    async fn release(&self) -> Result<(), SmartCardError>;
}
