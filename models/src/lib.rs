//! Wire contracts for APDU-over-IP.
//!
//! This crate contains pure data structures shared by both ends of the RPC
//! boundary. Nothing here performs I/O; the transports and the server/client
//! logic in `apdu-rpc` operate on these types.
//!
//! ## Contents
//!
//! - **protocol**: request/response/error/event envelopes, the closed method
//!   namespace, and WebSocket frame wrappers
//! - **apdu**: command/response APDU values with ISO 7816-4 byte encoding, and
//!   their JSON-safe serialized projections
//! - **device_info**: reader descriptors and their serialized projection

pub mod apdu;
pub mod device_info;
pub mod error;
pub mod protocol;

#[cfg(test)]
mod tests;

pub use apdu::{CommandApdu, ResponseApdu, SerializedCommandApdu, SerializedResponseApdu};
pub use common::ErrorLocation;
pub use device_info::{
    D2cProtocol, DeviceInfo, DeviceInfoBuilder, P2dProtocol, SerializedDeviceInfo,
};
pub use error::model_error::ModelError;
pub use protocol::{
    ClientFrame, RpcError, RpcEvent, RpcMethod, RpcRequest, RpcResponse, ServerFrame, codes,
};
