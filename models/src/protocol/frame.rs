//! Envelopes for duplex transports.
//!
//! Request/response transports (HTTP) carry bare [`RpcRequest`]/[`RpcResponse`]
//! bodies. A WebSocket carries responses and pushed events on the same
//! stream, so every frame is tagged with a `type`.

use super::{RpcEvent, RpcRequest, RpcResponse};

use serde::{Deserialize, Serialize};

/// Client to server. The first frame on a connection must be `Auth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Auth { token: String },
    Request(RpcRequest),
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    AuthResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Response(RpcResponse),
    Event(RpcEvent),
}
