use crate::error::model_error::ModelError;
use crate::{D2cProtocol, DeviceInfo, ErrorLocation, P2dProtocol};

use serde_json::Value;
use std::panic::Location;

/// Builder for validated [`DeviceInfo`] instances.
///
/// Only `id` is mandatory. Capability flags default to `false`, protocols to
/// `Unknown`.
#[derive(Debug, Default)]
pub struct DeviceInfoBuilder {
    id: Option<String>,
    device_path: Option<String>,
    friendly_name: Option<String>,
    description: Option<String>,
    supports_apdu: bool,
    supports_hce: bool,
    is_integrated_device: bool,
    is_removable_device: bool,
    d2c_protocol: Option<D2cProtocol>,
    p2d_protocol: Option<P2dProtocol>,
    apdu_api: Vec<String>,
    antenna_info: Option<Value>,
}

impl DeviceInfoBuilder {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_device_path(mut self, path: impl Into<String>) -> Self {
        self.device_path = Some(path.into());
        self
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_supports_apdu(mut self, supports: bool) -> Self {
        self.supports_apdu = supports;
        self
    }

    pub fn with_supports_hce(mut self, supports: bool) -> Self {
        self.supports_hce = supports;
        self
    }

    pub fn with_integrated_device(mut self, integrated: bool) -> Self {
        self.is_integrated_device = integrated;
        self
    }

    pub fn with_removable_device(mut self, removable: bool) -> Self {
        self.is_removable_device = removable;
        self
    }

    pub fn with_d2c_protocol(mut self, protocol: D2cProtocol) -> Self {
        self.d2c_protocol = Some(protocol);
        self
    }

    pub fn with_p2d_protocol(mut self, protocol: P2dProtocol) -> Self {
        self.p2d_protocol = Some(protocol);
        self
    }

    pub fn with_apdu_api(mut self, api: impl Into<String>) -> Self {
        self.apdu_api.push(api.into());
        self
    }

    pub fn with_antenna_info(mut self, info: Value) -> Self {
        self.antenna_info = Some(info);
        self
    }

    /// Build the DeviceInfo with validation.
    #[track_caller]
    pub fn build(self) -> Result<DeviceInfo, ModelError> {
        let id = self.id.ok_or_else(|| ModelError::Validation {
            message: String::from("Device id is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if id.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Device id cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.supports_apdu && self.apdu_api.is_empty() {
            return Err(ModelError::Validation {
                message: format!("Device {id} supports APDU but names no APDU API"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(DeviceInfo {
            id,
            device_path: self.device_path,
            friendly_name: self.friendly_name,
            description: self.description,
            supports_apdu: self.supports_apdu,
            supports_hce: self.supports_hce,
            is_integrated_device: self.is_integrated_device,
            is_removable_device: self.is_removable_device,
            d2c_protocol: self.d2c_protocol.unwrap_or(D2cProtocol::Unknown),
            p2d_protocol: self.p2d_protocol.unwrap_or(P2dProtocol::Unknown),
            apdu_api: self.apdu_api,
            antenna_info: self.antenna_info,
        })
    }
}
