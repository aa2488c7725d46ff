use crate::error::transport::TransportError;

use common::ErrorLocation;
use models::{ModelError, RpcError, codes};

use std::panic::Location;

use serde_json::Value;
use thiserror::Error as ThisError;

/// Error surface shared by every platform, device and card implementation,
/// local or remote.
///
/// Callers branch on [`SmartCardError::code`]. `Card` carries a code raised
/// by a platform implementation; `Remote` is whatever the far side of an RPC
/// boundary reported, passed through untouched.
#[derive(Debug, ThisError)]
pub enum SmartCardError {
    #[error("Not Initialized Error: {message} {location}")]
    NotInitialized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Already Initialized Error: {message} {location}")]
    AlreadyInitialized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Already Connected Error: {message} {location}")]
    AlreadyConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Handle Not Found Error: {message} {location}")]
    HandleNotFound {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Params Error: {message} {location}")]
    InvalidParams {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unsupported Operation Error: {message} {location}")]
    UnsupportedOperation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Internal Error: {message} {location}")]
    Internal {
        message: String,
        location: ErrorLocation,
    },

    #[error("Card Error [{code}]: {message} {location}")]
    Card {
        code: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Remote Error [{code}]: {message} {location}")]
    Remote {
        code: String,
        message: String,
        data: Option<Value>,
        location: ErrorLocation,
    },
}

impl SmartCardError {
    #[track_caller]
    pub fn not_initialized(message: impl Into<String>) -> Self {
        SmartCardError::NotInitialized {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn already_initialized(message: impl Into<String>) -> Self {
        SmartCardError::AlreadyInitialized {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn already_connected(message: impl Into<String>) -> Self {
        SmartCardError::AlreadyConnected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn handle_not_found(message: impl Into<String>) -> Self {
        SmartCardError::HandleNotFound {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        SmartCardError::InvalidParams {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unsupported(message: impl Into<String>) -> Self {
        SmartCardError::UnsupportedOperation {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn protocol(message: impl Into<String>) -> Self {
        SmartCardError::Protocol {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        SmartCardError::Internal {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn card(code: impl Into<String>, message: impl Into<String>) -> Self {
        SmartCardError::Card {
            code: code.into(),
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            SmartCardError::NotInitialized { .. } => codes::NOT_INITIALIZED,
            SmartCardError::AlreadyInitialized { .. } => codes::ALREADY_INITIALIZED,
            SmartCardError::AlreadyConnected { .. } => codes::ALREADY_CONNECTED,
            SmartCardError::HandleNotFound { .. } => codes::HANDLE_NOT_FOUND,
            SmartCardError::InvalidParams { .. } => codes::INVALID_PARAMS,
            SmartCardError::UnsupportedOperation { .. } => codes::UNSUPPORTED_OPERATION,
            SmartCardError::Transport { .. } => codes::TRANSPORT_ERROR,
            SmartCardError::Protocol { .. } => codes::PROTOCOL_ERROR,
            SmartCardError::Internal { .. } => codes::INTERNAL_ERROR,
            SmartCardError::Card { code, .. } | SmartCardError::Remote { code, .. } => code,
        }
    }

    /// The bare human message, without kind prefix or location.
    pub fn message(&self) -> &str {
        match self {
            SmartCardError::NotInitialized { message, .. }
            | SmartCardError::AlreadyInitialized { message, .. }
            | SmartCardError::AlreadyConnected { message, .. }
            | SmartCardError::HandleNotFound { message, .. }
            | SmartCardError::InvalidParams { message, .. }
            | SmartCardError::UnsupportedOperation { message, .. }
            | SmartCardError::Transport { message, .. }
            | SmartCardError::Protocol { message, .. }
            | SmartCardError::Internal { message, .. }
            | SmartCardError::Card { message, .. }
            | SmartCardError::Remote { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            SmartCardError::Remote { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    /// Wire form. Locations stay on this side of the boundary.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.code().to_string(),
            message: self.message().to_string(),
            data: self.data().cloned(),
        }
    }
}

impl From<RpcError> for SmartCardError {
    #[track_caller]
    fn from(error: RpcError) -> Self {
        SmartCardError::Remote {
            code: error.code,
            message: error.message,
            data: error.data,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for SmartCardError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        SmartCardError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<ModelError> for SmartCardError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        SmartCardError::InvalidParams {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
