mod builder;

pub use builder::DeviceInfoBuilder;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device-to-card link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum D2cProtocol {
    Iso7816,
    Nfc,
    Integrated,
    Other,
    Unknown,
}

/// Platform-to-device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum P2dProtocol {
    Usb,
    Ble,
    Nfc,
    Integrated,
    Other,
    Unknown,
}

/// Describes a reader the platform can see. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    id: String,
    device_path: Option<String>,
    friendly_name: Option<String>,
    description: Option<String>,
    supports_apdu: bool,
    supports_hce: bool,
    is_integrated_device: bool,
    is_removable_device: bool,
    d2c_protocol: D2cProtocol,
    p2d_protocol: P2dProtocol,
    apdu_api: Vec<String>,
    antenna_info: Option<Value>,
}

impl DeviceInfo {
    pub fn builder() -> DeviceInfoBuilder {
        DeviceInfoBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_path(&self) -> Option<&str> {
        self.device_path.as_deref()
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.friendly_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn supports_apdu(&self) -> bool {
        self.supports_apdu
    }

    pub fn supports_hce(&self) -> bool {
        self.supports_hce
    }

    pub fn is_integrated_device(&self) -> bool {
        self.is_integrated_device
    }

    pub fn is_removable_device(&self) -> bool {
        self.is_removable_device
    }

    pub fn d2c_protocol(&self) -> D2cProtocol {
        self.d2c_protocol
    }

    pub fn p2d_protocol(&self) -> P2dProtocol {
        self.p2d_protocol
    }

    pub fn apdu_api(&self) -> &[String] {
        &self.apdu_api
    }

    /// Free-form, platform specific. Passed through untouched.
    pub fn antenna_info(&self) -> Option<&Value> {
        self.antenna_info.as_ref()
    }

    pub fn to_serialized(&self) -> SerializedDeviceInfo {
        SerializedDeviceInfo::from(self)
    }
}

/// JSON projection of [`DeviceInfo`] with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedDeviceInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub supports_apdu: bool,
    pub supports_hce: bool,
    pub is_integrated_device: bool,
    pub is_removable_device: bool,
    pub d2c_protocol: D2cProtocol,
    pub p2d_protocol: P2dProtocol,
    #[serde(default)]
    pub apdu_api: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antenna_info: Option<Value>,
}

impl From<&DeviceInfo> for SerializedDeviceInfo {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            id: info.id.clone(),
            device_path: info.device_path.clone(),
            friendly_name: info.friendly_name.clone(),
            description: info.description.clone(),
            supports_apdu: info.supports_apdu,
            supports_hce: info.supports_hce,
            is_integrated_device: info.is_integrated_device,
            is_removable_device: info.is_removable_device,
            d2c_protocol: info.d2c_protocol,
            p2d_protocol: info.p2d_protocol,
            apdu_api: info.apdu_api.clone(),
            antenna_info: info.antenna_info.clone(),
        }
    }
}

impl From<SerializedDeviceInfo> for DeviceInfo {
    fn from(info: SerializedDeviceInfo) -> Self {
        Self {
            id: info.id,
            device_path: info.device_path,
            friendly_name: info.friendly_name,
            description: info.description,
            supports_apdu: info.supports_apdu,
            supports_hce: info.supports_hce,
            is_integrated_device: info.is_integrated_device,
            is_removable_device: info.is_removable_device,
            d2c_protocol: info.d2c_protocol,
            p2d_protocol: info.p2d_protocol,
            apdu_api: info.apdu_api,
            antenna_info: info.antenna_info,
        }
    }
}
