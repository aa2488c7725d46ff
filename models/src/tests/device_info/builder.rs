use crate::{D2cProtocol, DeviceInfoBuilder, ModelError, P2dProtocol};

/// **VALUE**: Verifies that builder validation rejects a missing device id.
///
/// **WHY THIS MATTERS**: The id is what `acquireDevice` takes and what the
/// client proxy matches the re-fetched descriptor list against. A descriptor
/// without one can never be acquired.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Required field validation is removed
/// - `build()` silently substitutes an empty string
#[test]
fn given_missing_id_when_building_then_returns_validation_error() {
    // GIVEN: Builder without id
    let builder = DeviceInfoBuilder::default()
        .with_friendly_name("Reader")
        .with_supports_apdu(true)
        .with_apdu_api("pcsc");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Device id is required");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that whitespace-only ids are rejected.
///
/// **BUG THIS CATCHES**: An `is_empty()` check without `trim()`, letting
/// `"  "` through as a device id that no reader will ever match.
#[test]
fn given_blank_id_when_building_then_returns_validation_error() {
    // GIVEN: Builder with a blank id
    let builder = DeviceInfoBuilder::default().with_id("   ");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Device id cannot be empty");
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies an APDU-capable device must name its APDU API.
///
/// **WHY THIS MATTERS**: Consumers pick their transport off `apdu_api`.
/// `supports_apdu = true` with an empty list is a contradictory descriptor.
///
/// **BUG THIS CATCHES**: Would catch if the consistency check is dropped.
#[test]
fn given_apdu_support_without_api_when_building_then_returns_validation_error() {
    // GIVEN: Builder claiming APDU support but naming no API
    let builder = DeviceInfoBuilder::default()
        .with_id("reader-1")
        .with_supports_apdu(true);

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error mentioning the device
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert!(message.contains("reader-1"));
        }
        other => panic!("Expected validation error, got {other:?}"),
    }
}

#[test]
fn given_only_id_when_building_then_defaults_are_applied() {
    let info = DeviceInfoBuilder::default()
        .with_id("reader-1")
        .build()
        .expect("Minimal builder should succeed");

    assert_eq!(info.id(), "reader-1");
    assert_eq!(info.friendly_name(), None);
    assert!(!info.supports_apdu());
    assert!(!info.supports_hce());
    assert_eq!(info.d2c_protocol(), D2cProtocol::Unknown);
    assert_eq!(info.p2d_protocol(), P2dProtocol::Unknown);
    assert!(info.apdu_api().is_empty());
    assert!(info.antenna_info().is_none());
}

/// **VALUE**: Verifies every `with_*` setter reaches the built value.
///
/// **BUG THIS CATCHES**: A setter writing the wrong field, e.g. integrated and
/// removable flags swapped during refactoring.
#[test]
fn given_all_fields_when_building_then_values_are_preserved() {
    // GIVEN: Fully populated builder
    let builder = DeviceInfoBuilder::default()
        .with_id("mock-reader-0")
        .with_device_path("/dev/mock0")
        .with_friendly_name("Mock Card Reader mock-reader-0")
        .with_description("test reader")
        .with_supports_apdu(true)
        .with_supports_hce(false)
        .with_integrated_device(false)
        .with_removable_device(true)
        .with_d2c_protocol(D2cProtocol::Iso7816)
        .with_p2d_protocol(P2dProtocol::Usb)
        .with_apdu_api("mock")
        .with_antenna_info(serde_json::json!({"deviceSize": [10, 20]}));

    // WHEN: Building
    let info = builder.build().expect("Valid builder should succeed");

    // THEN: Every field is carried through
    assert_eq!(info.device_path(), Some("/dev/mock0"));
    assert_eq!(info.friendly_name(), Some("Mock Card Reader mock-reader-0"));
    assert_eq!(info.description(), Some("test reader"));
    assert!(info.supports_apdu());
    assert!(!info.is_integrated_device());
    assert!(info.is_removable_device());
    assert_eq!(info.d2c_protocol(), D2cProtocol::Iso7816);
    assert_eq!(info.p2d_protocol(), P2dProtocol::Usb);
    assert_eq!(info.apdu_api(), ["mock".to_string()]);
    assert_eq!(
        info.antenna_info(),
        Some(&serde_json::json!({"deviceSize": [10, 20]}))
    );
}
