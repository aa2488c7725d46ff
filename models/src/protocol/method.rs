use std::fmt;

/// The closed, dot-namespaced method set. The wire string is the sole
/// dispatch key on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    PlatformInit,
    PlatformRelease,
    PlatformIsInitialized,
    PlatformGetDeviceInfo,
    PlatformAcquireDevice,

    DeviceGetDeviceInfo,
    DeviceIsSessionActive,
    DeviceIsDeviceAvailable,
    DeviceIsCardPresent,
    DeviceStartSession,
    DeviceWaitForCardPresence,
    DeviceRelease,

    CardGetAtr,
    CardTransmit,
    CardTransmitRaw,
    CardReset,
    CardRelease,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 17] = [
        RpcMethod::PlatformInit,
        RpcMethod::PlatformRelease,
        RpcMethod::PlatformIsInitialized,
        RpcMethod::PlatformGetDeviceInfo,
        RpcMethod::PlatformAcquireDevice,
        RpcMethod::DeviceGetDeviceInfo,
        RpcMethod::DeviceIsSessionActive,
        RpcMethod::DeviceIsDeviceAvailable,
        RpcMethod::DeviceIsCardPresent,
        RpcMethod::DeviceStartSession,
        RpcMethod::DeviceWaitForCardPresence,
        RpcMethod::DeviceRelease,
        RpcMethod::CardGetAtr,
        RpcMethod::CardTransmit,
        RpcMethod::CardTransmitRaw,
        RpcMethod::CardReset,
        RpcMethod::CardRelease,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::PlatformInit => "platform.init",
            RpcMethod::PlatformRelease => "platform.release",
            RpcMethod::PlatformIsInitialized => "platform.isInitialized",
            RpcMethod::PlatformGetDeviceInfo => "platform.getDeviceInfo",
            RpcMethod::PlatformAcquireDevice => "platform.acquireDevice",
            RpcMethod::DeviceGetDeviceInfo => "device.getDeviceInfo",
            RpcMethod::DeviceIsSessionActive => "device.isSessionActive",
            RpcMethod::DeviceIsDeviceAvailable => "device.isDeviceAvailable",
            RpcMethod::DeviceIsCardPresent => "device.isCardPresent",
            RpcMethod::DeviceStartSession => "device.startSession",
            RpcMethod::DeviceWaitForCardPresence => "device.waitForCardPresence",
            RpcMethod::DeviceRelease => "device.release",
            RpcMethod::CardGetAtr => "card.getAtr",
            RpcMethod::CardTransmit => "card.transmit",
            RpcMethod::CardTransmitRaw => "card.transmitRaw",
            RpcMethod::CardReset => "card.reset",
            RpcMethod::CardRelease => "card.release",
        }
    }

    /// Exact, case-sensitive lookup. `None` for anything outside the namespace.
    pub fn parse(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == method)
    }

    /// `device.*` and `card.*` methods address a handle in `params[0]`.
    pub fn takes_handle(&self) -> bool {
        !self.as_str().starts_with("platform.")
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
