use crate::error::{SmartCardError, TransportError};

use common::ErrorLocation;
use models::{RpcError, codes};

use std::panic::Location;

use serde_json::json;

/// **VALUE**: Verifies a remote error keeps code, message and data intact.
///
/// **WHY THIS MATTERS**: Callers branch on `code`. If the passthrough
/// rewrote it to a generic tag, a `CARD_NOT_PRESENT` from the server would be
/// indistinguishable from a crash.
///
/// **BUG THIS CATCHES**: Would catch `From<RpcError>` mapping every code to
/// INTERNAL_ERROR.
#[test]
fn given_rpc_error_when_converting_then_code_message_and_data_pass_through() {
    // GIVEN
    let wire = RpcError::new(codes::CARD_NOT_PRESENT, "No card").with_data(json!({"slot": 1}));

    // WHEN
    let err = SmartCardError::from(wire.clone());

    // THEN
    assert_eq!(err.code(), codes::CARD_NOT_PRESENT);
    assert_eq!(err.message(), "No card");
    assert_eq!(err.data(), Some(&json!({"slot": 1})));
    assert_eq!(err.to_rpc_error(), wire);
}

#[test]
fn given_local_error_when_serializing_for_wire_then_location_stays_local() {
    let err = SmartCardError::handle_not_found("Card not found: card-9");

    let wire = err.to_rpc_error();

    assert_eq!(wire.code, codes::HANDLE_NOT_FOUND);
    assert_eq!(wire.message, "Card not found: card-9");
    assert!(wire.data.is_none());
    assert!(err.to_string().starts_with("Handle Not Found Error: Card not found: card-9"));
}

#[test]
fn given_transport_failure_when_converting_then_transport_code() {
    let transport = TransportError::Closed {
        message: String::from("gone"),
        location: ErrorLocation::from(Location::caller()),
    };

    let err = SmartCardError::from(transport);

    assert_eq!(err.code(), codes::TRANSPORT_ERROR);
    assert!(err.message().contains("gone"));
}

#[test]
fn given_card_error_when_reading_code_then_custom_code_is_kept() {
    let err = SmartCardError::card(codes::TIMEOUT, "No card detected within 5ms");

    assert_eq!(err.code(), codes::TIMEOUT);
    assert_eq!(err.to_rpc_error().code, "TIMEOUT");
}
