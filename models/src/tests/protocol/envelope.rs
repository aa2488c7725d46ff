use crate::{RpcError, RpcEvent, RpcRequest, RpcResponse, codes};

use serde_json::{Value, json};

/// **VALUE**: Verifies a `null` result is a success, not a malformed response.
///
/// **WHY THIS MATTERS**: `platform.init`, `card.reset` and every release
/// answer `{"id": ..., "result": null}`. serde turns that `null` into `None`,
/// which looks exactly like a missing field.
///
/// **BUG THIS CATCHES**: `into_result` treating `result: None` as an error,
/// which would make every void call fail on the client.
#[test]
fn given_null_result_when_converting_then_ok_null() {
    // GIVEN: A void method's response on the wire
    let response: RpcResponse =
        serde_json::from_value(json!({"id": "req-1", "result": null})).expect("deserialize");

    // WHEN: Converting
    let result = response.into_result();

    // THEN: Success with Null
    assert_eq!(result, Ok(Value::Null));
}

#[test]
fn given_error_and_result_when_converting_then_error_wins() {
    let response = RpcResponse {
        id: "req-1".into(),
        result: Some(json!(true)),
        error: Some(RpcError::new(codes::INTERNAL_ERROR, "boom")),
    };

    let result = response.into_result();

    assert_eq!(result.map_err(|e| e.code), Err(codes::INTERNAL_ERROR.to_string()));
}

#[test]
fn given_failure_when_serialized_then_result_key_is_absent() {
    let response = RpcResponse::failure(
        "req-2",
        RpcError::new(codes::HANDLE_NOT_FOUND, "Card not found: card-9"),
    );

    let value = serde_json::to_value(&response).expect("serialize");

    assert_eq!(
        value,
        json!({
            "id": "req-2",
            "error": {"code": "HANDLE_NOT_FOUND", "message": "Card not found: card-9"}
        })
    );
}

#[test]
fn given_request_without_params_when_deserializing_then_params_empty() {
    let request: RpcRequest =
        serde_json::from_value(json!({"id": "a", "method": "platform.isInitialized"}))
            .expect("deserialize");

    assert!(request.params.is_empty());
}

#[test]
fn given_request_with_handle_when_serialized_then_params_is_positional_array() {
    let request = RpcRequest::new("b", "card.getAtr", vec![json!("card-1")]);

    let value = serde_json::to_value(&request).expect("serialize");

    assert_eq!(value, json!({"id": "b", "method": "card.getAtr", "params": ["card-1"]}));
}

#[test]
fn given_error_with_data_when_round_tripping_then_data_survives() {
    let error = RpcError::new("CARD_ERROR", "blocked").with_data(json!({"sw": 27011}));

    let back: RpcError =
        serde_json::from_value(serde_json::to_value(&error).expect("serialize")).expect("deserialize");

    assert_eq!(back, error);
    assert_eq!(error.to_string(), "CARD_ERROR: blocked");
}

#[test]
fn given_event_without_handle_when_serialized_then_handle_omitted() {
    let event = RpcEvent::new(RpcEvent::DEVICE_CHANGED);

    let value = serde_json::to_value(&event).expect("serialize");

    assert_eq!(value, json!({"event": "device.changed"}));
}
