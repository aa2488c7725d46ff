use crate::RpcMethod;

use std::collections::HashSet;

/// **VALUE**: Verifies `parse` is the exact inverse of `as_str` over the whole
/// namespace.
///
/// **WHY THIS MATTERS**: The server dispatches on the parsed method. A name
/// that formats one way and parses another is unreachable and answers
/// "Unknown method" to a client using it correctly.
///
/// **BUG THIS CATCHES**: A typo in one `as_str` arm, or a method added to the
/// enum but not to `ALL`.
#[test]
fn given_every_method_when_parsing_its_name_then_returns_same_method() {
    for method in RpcMethod::ALL {
        assert_eq!(RpcMethod::parse(method.as_str()), Some(method));
    }

    let names: HashSet<&str> = RpcMethod::ALL.iter().map(RpcMethod::as_str).collect();
    assert_eq!(names.len(), 17, "method names must be unique");
}

#[test]
fn given_names_outside_namespace_when_parsing_then_none() {
    for name in ["", "platform", "platform.INIT", "card.transmitraw", "system.exit"] {
        assert_eq!(RpcMethod::parse(name), None, "{name} must not parse");
    }
}

#[test]
fn given_methods_when_checking_handle_then_only_platform_methods_take_none() {
    assert!(!RpcMethod::PlatformAcquireDevice.takes_handle());
    assert!(RpcMethod::DeviceRelease.takes_handle());
    assert!(RpcMethod::CardTransmitRaw.takes_handle());
    assert_eq!(RpcMethod::CardTransmitRaw.to_string(), "card.transmitRaw");
}
