use crate::{CommandApdu, ResponseApdu, SerializedCommandApdu, SerializedResponseApdu};

use serde_json::json;

/// **VALUE**: Pins the command wire shape: byte arrays as number arrays and
/// explicit `null` for absent body or Le.
///
/// **WHY THIS MATTERS**: Peers in other languages rebuild the command from
/// exactly these six keys. A missing key reads as `undefined`, not `null`.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `skip_serializing_if` is added to `data`/`le`
/// - Bytes are emitted as a base64 string
#[test]
fn given_command_when_serialized_then_matches_wire_shape() {
    // GIVEN: SELECT EF 0002
    let apdu = CommandApdu::select_ef(0x0002);

    // WHEN: Serializing
    let value = serde_json::to_value(SerializedCommandApdu::from(&apdu)).expect("serialize");

    // THEN: Six keys, le is null
    assert_eq!(
        value,
        json!({"cla": 0, "ins": 164, "p1": 2, "p2": 12, "data": [0, 2], "le": null})
    );
}

#[test]
fn given_wire_command_with_empty_data_when_converting_then_data_is_none() {
    let wire: SerializedCommandApdu =
        serde_json::from_value(json!({"cla": 0, "ins": 32, "p1": 0, "p2": 145, "data": [], "le": null}))
            .expect("deserialize");

    let apdu = CommandApdu::try_from(wire).expect("valid command");

    assert_eq!(apdu.data(), None);
    assert_eq!(apdu.to_bytes(), vec![0x00, 0x20, 0x00, 0x91]);
}

#[test]
fn given_out_of_range_byte_when_deserializing_command_then_fails() {
    let result = serde_json::from_value::<SerializedCommandApdu>(
        json!({"cla": 256, "ins": 0, "p1": 0, "p2": 0, "data": null, "le": null}),
    );

    assert!(result.is_err());
}

/// **VALUE**: Verifies the combined status word is never put on the wire.
///
/// **WHY THIS MATTERS**: Sending `sw` next to `sw1`/`sw2` lets the two drift;
/// receivers must always derive it.
///
/// **BUG THIS CATCHES**: Someone adding a convenience `sw` field to the
/// serialized struct.
#[test]
fn given_response_when_serialized_then_only_data_sw1_sw2_are_sent() {
    // GIVEN: A wrong-PIN response
    let response = ResponseApdu::status(0x63C1);

    // WHEN: Serializing
    let value = serde_json::to_value(SerializedResponseApdu::from(&response)).expect("serialize");

    // THEN: No `sw` key
    assert_eq!(value, json!({"data": [], "sw1": 99, "sw2": 193}));
}

#[test]
fn given_wire_response_when_converting_then_sw_is_derived() {
    let wire: SerializedResponseApdu =
        serde_json::from_value(json!({"data": [1, 2, 3], "sw1": 144, "sw2": 0})).expect("deserialize");

    let response = ResponseApdu::from(wire);

    assert_eq!(response.sw(), 0x9000);
    assert_eq!(response.data(), &[1, 2, 3]);
}
