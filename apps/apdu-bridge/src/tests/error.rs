use crate::error::BridgeError;

use apdu_rpc::{ConfigError, TransportError};

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies foreign errors convert with their message intact.
///
/// **WHY THIS MATTERS**: `main` returns `BridgeError`, so whatever stopped
/// startup is what the operator sees.
///
/// **BUG THIS CATCHES**: Would catch a conversion that drops the source
/// message or maps to the wrong variant.
#[test]
fn given_config_error_when_converted_then_config_variant_keeps_reason() {
    // GIVEN
    let source = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: String::from("platform.mock_devices needs at least one id"),
    };

    // WHEN
    let err = BridgeError::from(source);

    // THEN
    match &err {
        BridgeError::Config { message, .. } => {
            assert!(message.contains("mock_devices"), "{message}");
        }
        other => panic!("expected Config variant, got {other:?}"),
    }
    assert!(err.to_string().starts_with("Config Error: "));
}

#[test]
fn given_transport_error_when_converted_then_transport_variant() {
    let source = TransportError::Closed {
        message: String::from("socket gone"),
        location: ErrorLocation::from(Location::caller()),
    };

    let err: BridgeError = source.into();

    assert!(matches!(err, BridgeError::Transport { ref message, .. } if message.contains("socket gone")));
}
