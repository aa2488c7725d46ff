use crate::{ClientFrame, RpcEvent, RpcRequest, RpcResponse, ServerFrame};

use serde_json::json;

/// **VALUE**: Pins the tagged frame layout used on WebSocket connections.
///
/// **WHY THIS MATTERS**: Responses and pushed events share one stream. The
/// `type` tag is the only thing telling them apart, and request fields must
/// sit at the top level next to it.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The enum switches to external tagging (`{"Request": {...}}`)
/// - Variant names stop being snake_case
#[test]
fn given_request_frame_when_serialized_then_is_flat_with_type_tag() {
    // GIVEN: A wrapped request
    let frame = ClientFrame::Request(RpcRequest::new(
        "req-1",
        "platform.init",
        vec![json!(false)],
    ));

    // WHEN: Serializing
    let value = serde_json::to_value(&frame).expect("serialize");

    // THEN: Flat object with type = request
    assert_eq!(
        value,
        json!({"type": "request", "id": "req-1", "method": "platform.init", "params": [false]})
    );
}

#[test]
fn given_auth_frame_json_when_deserializing_then_token_is_read() {
    let frame: ClientFrame =
        serde_json::from_value(json!({"type": "auth", "token": "abc"})).expect("deserialize");

    assert_eq!(frame, ClientFrame::Auth { token: "abc".into() });
}

#[test]
fn given_auth_result_failure_when_serialized_then_has_error() {
    let frame = ServerFrame::AuthResult {
        success: false,
        error: Some("Invalid token".into()),
    };

    let value = serde_json::to_value(&frame).expect("serialize");

    assert_eq!(
        value,
        json!({"type": "auth_result", "success": false, "error": "Invalid token"})
    );
}

#[test]
fn given_server_frames_when_deserializing_then_variant_follows_type() {
    let response: ServerFrame =
        serde_json::from_value(json!({"type": "response", "id": "r", "result": 3}))
            .expect("deserialize response");
    let event: ServerFrame = serde_json::from_value(
        json!({"type": "event", "event": "card.removed", "handle": "card-1"}),
    )
    .expect("deserialize event");

    assert_eq!(response, ServerFrame::Response(RpcResponse::success("r", json!(3))));
    assert_eq!(
        event,
        ServerFrame::Event(RpcEvent::new(RpcEvent::CARD_REMOVED).for_handle("card-1"))
    );
}

#[test]
fn given_unknown_frame_type_when_deserializing_then_fails() {
    let result = serde_json::from_value::<ClientFrame>(json!({"type": "ping"}));

    assert!(result.is_err());
}
