use crate::server::params::Params;

use models::{RpcMethod, SerializedCommandApdu, codes};

use std::time::Duration;

use serde_json::{Value, json};

#[test]
fn given_handle_string_when_reading_handle_then_returns_it() {
    let values = vec![json!("device-1")];
    let params = Params::new(RpcMethod::DeviceIsCardPresent, &values);

    assert_eq!(params.handle().expect("handle"), "device-1");
}

/// **VALUE**: Verifies a missing or mistyped handle is INVALID_PARAMS.
///
/// **WHY THIS MATTERS**: A number where a handle belongs is a client bug and
/// must be reported as such, distinct from a handle that simply expired.
///
/// **BUG THIS CATCHES**: Would catch coercing `42` to `"42"` and reporting
/// HANDLE_NOT_FOUND instead.
#[test]
fn given_non_string_handle_when_reading_handle_then_invalid_params_names_method() {
    // GIVEN
    let values = vec![json!(42)];
    let params = Params::new(RpcMethod::CardGetAtr, &values);

    // WHEN
    let err = params.handle().expect_err("should reject");

    // THEN
    assert_eq!(err.code(), codes::INVALID_PARAMS);
    assert!(err.message().contains("card.getAtr"));
    assert!(err.message().contains("parameter 0"));

    let empty: Vec<Value> = Vec::new();
    let err = Params::new(RpcMethod::CardGetAtr, &empty)
        .handle()
        .expect_err("should reject");
    assert!(err.message().contains("got nothing"));
}

#[test]
fn given_platform_method_when_reading_handle_then_internal_error() {
    let values = vec![json!("mock-reader-0")];
    let params = Params::new(RpcMethod::PlatformAcquireDevice, &values);

    let err = params.handle().expect_err("platform calls carry no handle");

    assert_eq!(err.code(), codes::INTERNAL_ERROR);
    assert!(err.message().contains("platform.acquireDevice"));
}

#[test]
fn given_absent_or_null_force_when_reading_optional_bool_then_false() {
    let none: Vec<Value> = Vec::new();
    let null = vec![Value::Null];
    let yes = vec![json!(true)];
    let bad = vec![json!("yes")];

    assert!(!Params::new(RpcMethod::PlatformInit, &none).optional_bool(0).expect("absent"));
    assert!(!Params::new(RpcMethod::PlatformInit, &null).optional_bool(0).expect("null"));
    assert!(Params::new(RpcMethod::PlatformInit, &yes).optional_bool(0).expect("true"));
    assert_eq!(
        Params::new(RpcMethod::PlatformInit, &bad)
            .optional_bool(0)
            .expect_err("string")
            .code(),
        codes::INVALID_PARAMS
    );
}

#[test]
fn given_timeout_when_reading_millis_then_negative_and_fractional_are_rejected() {
    let ok = vec![json!("device-1"), json!(1500)];
    let negative = vec![json!("device-1"), json!(-1)];
    let fractional = vec![json!("device-1"), json!(1.5)];

    let method = RpcMethod::DeviceWaitForCardPresence;
    assert_eq!(
        Params::new(method, &ok).millis(1).expect("valid"),
        Duration::from_millis(1500)
    );
    assert!(Params::new(method, &negative).millis(1).is_err());
    assert!(Params::new(method, &fractional).millis(1).is_err());
}

/// **VALUE**: Verifies structured parameters decode and malformed ones fail
/// cleanly.
///
/// **WHY THIS MATTERS**: `card.transmit` carries a command object; a byte
/// value of 300 must not be truncated into a different command.
///
/// **BUG THIS CATCHES**: Would catch lossy numeric conversion when decoding.
#[test]
fn given_command_object_when_decoding_then_out_of_range_byte_is_invalid_params() {
    // GIVEN
    let good = vec![
        json!("card-1"),
        json!({"cla": 0, "ins": 164, "p1": 4, "p2": 12, "data": [1, 2], "le": null}),
    ];
    let bad = vec![
        json!("card-1"),
        json!({"cla": 300, "ins": 164, "p1": 4, "p2": 12, "data": null, "le": null}),
    ];

    // WHEN
    let decoded: SerializedCommandApdu = Params::new(RpcMethod::CardTransmit, &good)
        .decode(1)
        .expect("valid command");
    let err = Params::new(RpcMethod::CardTransmit, &bad)
        .decode::<SerializedCommandApdu>(1)
        .expect_err("cla out of range");

    // THEN
    assert_eq!(decoded.ins, 0xA4);
    assert_eq!(decoded.data, Some(vec![1, 2]));
    assert_eq!(err.code(), codes::INVALID_PARAMS);
    assert!(err.message().contains("malformed"));
}
