use crate::{D2cProtocol, DeviceInfo, P2dProtocol, SerializedDeviceInfo};

use serde_json::json;

fn mock_reader() -> DeviceInfo {
    DeviceInfo::builder()
        .with_id("mock-reader-0")
        .with_friendly_name("Mock Card Reader mock-reader-0")
        .with_supports_apdu(true)
        .with_removable_device(true)
        .with_d2c_protocol(D2cProtocol::Iso7816)
        .with_p2d_protocol(P2dProtocol::Usb)
        .with_apdu_api("mock")
        .build()
        .expect("Valid descriptor")
}

/// **VALUE**: Pins the camelCase JSON shape other language clients read.
///
/// **WHY THIS MATTERS**: Descriptors cross the wire as plain JSON. A snake_case
/// key or an uppercase enum value breaks every non-Rust peer silently.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - `rename_all = "camelCase"` is removed from the projection
/// - Protocol enums serialize as `"Iso7816"` instead of `"iso7816"`
/// - Absent optionals are emitted as `null` instead of omitted
#[test]
fn given_device_info_when_serialized_then_uses_camel_case_wire_shape() {
    // GIVEN: A mock reader descriptor
    let info = mock_reader();

    // WHEN: Projecting to JSON
    let value = serde_json::to_value(info.to_serialized()).expect("serialize");

    // THEN: Keys and enum values match the wire contract
    assert_eq!(
        value,
        json!({
            "id": "mock-reader-0",
            "friendlyName": "Mock Card Reader mock-reader-0",
            "supportsApdu": true,
            "supportsHce": false,
            "isIntegratedDevice": false,
            "isRemovableDevice": true,
            "d2cProtocol": "iso7816",
            "p2dProtocol": "usb",
            "apduApi": ["mock"]
        })
    );
}

#[test]
fn given_wire_json_when_reconstructed_then_equals_original_descriptor() {
    let wire = json!({
        "id": "mock-reader-0",
        "friendlyName": "Mock Card Reader mock-reader-0",
        "supportsApdu": true,
        "supportsHce": false,
        "isIntegratedDevice": false,
        "isRemovableDevice": true,
        "d2cProtocol": "iso7816",
        "p2dProtocol": "usb",
        "apduApi": ["mock"]
    });

    let serialized: SerializedDeviceInfo = serde_json::from_value(wire).expect("deserialize");
    let info = DeviceInfo::from(serialized);

    assert_eq!(info, mock_reader());
}

#[test]
fn given_unknown_protocol_value_when_deserializing_then_fails() {
    let wire = json!({
        "id": "x",
        "supportsApdu": false,
        "supportsHce": false,
        "isIntegratedDevice": false,
        "isRemovableDevice": false,
        "d2cProtocol": "carrier-pigeon",
        "p2dProtocol": "usb"
    });

    let result = serde_json::from_value::<SerializedDeviceInfo>(wire);

    assert!(result.is_err());
}
