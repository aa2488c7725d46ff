use apdu_rpc::{ConfigError, TransportError};

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the bridge from starting or shutting down cleanly.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Error from this app
    #[error("Bridge Error: {message} {location}")]
    Bridge {
        message: String,
        location: ErrorLocation,
    },

    /// Configuration could not be located, read or validated
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// A server transport failed to bind or stop
    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for BridgeError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        BridgeError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for BridgeError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        BridgeError::Transport {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
