//! Request/response envelopes exchanged over any transport.
//!
//! JSON has no byte-array type, so every byte sequence crossing the wire is a
//! `Vec<u8>` serialized as an array of numbers.

mod frame;
mod method;

pub use frame::{ClientFrame, ServerFrame};
pub use method::RpcMethod;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Machine-readable error codes carried in [`RpcError::code`].
///
/// Callers branch on these, never on the human message.
pub mod codes {
    /// Request arrived before any handler was registered on the server transport.
    pub const NO_HANDLER: &str = "NO_HANDLER";
    /// Uncaught failure during dispatch, including unknown method names.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    /// The server's platform collaborator could not be constructed at all.
    pub const NOT_AVAILABLE: &str = "NOT_AVAILABLE";
    /// Device already acquired, or a card session already open on it.
    pub const ALREADY_CONNECTED: &str = "ALREADY_CONNECTED";
    pub const ALREADY_INITIALIZED: &str = "ALREADY_INITIALIZED";
    pub const NOT_INITIALIZED: &str = "NOT_INITIALIZED";
    /// Reader-level failure reported by a platform implementation.
    pub const READER_ERROR: &str = "READER_ERROR";
    /// Structural limitation (HCE over a remote proxy). Never retry.
    pub const UNSUPPORTED_OPERATION: &str = "UNSUPPORTED_OPERATION";
    /// Device or card handle unknown to the server. Re-acquire from scratch.
    pub const HANDLE_NOT_FOUND: &str = "HANDLE_NOT_FOUND";
    /// Positional parameters missing or of the wrong shape.
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    /// Client-side: the transport failed to deliver the call.
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    /// Client-side: a response could not be matched or decoded.
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";
    pub const CARD_NOT_PRESENT: &str = "CARD_NOT_PRESENT";
    pub const DEVICE_NOT_FOUND: &str = "DEVICE_NOT_FOUND";
    pub const TIMEOUT: &str = "TIMEOUT";
}

/// One RPC call. `params[0]` is the resource handle for `device.*`/`card.*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Answer to one [`RpcRequest`], correlated by `id`.
///
/// Exactly one of `result`/`error` is meaningful. A method returning nothing
/// answers `"result": null`, which deserializes to `result: None`; use
/// [`RpcResponse::into_result`] rather than inspecting the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: RpcError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `error` wins if present; otherwise the result, with absent meaning `null`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Server push notification. Only duplex transports deliver these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcEvent {
    pub const CARD_REMOVED: &'static str = "card.removed";
    pub const CARD_INSERTED: &'static str = "card.inserted";
    pub const DEVICE_CHANGED: &'static str = "device.changed";

    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            handle: None,
            data: None,
        }
    }

    pub fn for_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}
