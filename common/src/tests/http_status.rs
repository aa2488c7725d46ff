use crate::HttpStatusCode;

/// **VALUE**: The HTTP transport treats 503 as "platform not available", distinct from
/// other 5xx faults.
///
/// **BUG THIS CATCHES**: Range checks drifting so that 503 stops being recognized, which
/// would turn a clean `NOT_AVAILABLE` into an opaque transport error.
#[test]
fn given_503_when_categorized_then_unavailable_and_server_error() {
    let status = HttpStatusCode::from(503);

    assert!(status.is_unavailable());
    assert!(status.is_server_error());
    assert!(!status.is_client_error());
    assert!(!status.is_success());
}

#[test]
fn given_boundaries_when_categorized_then_ranges_are_half_open() {
    assert!(HttpStatusCode(200).is_success());
    assert!(!HttpStatusCode(300).is_success());
    assert!(HttpStatusCode(499).is_client_error());
    assert!(!HttpStatusCode(500).is_client_error());
    assert!(!HttpStatusCode(600).is_server_error());
}

#[test]
fn given_status_when_displayed_then_prefixed() {
    assert_eq!(HttpStatusCode(500).to_string(), "HTTP 500");
}

#[test]
fn given_server_status_constants_when_asked_for_reason_then_standard_phrases() {
    assert_eq!(HttpStatusCode::OK.reason(), "OK");
    assert_eq!(HttpStatusCode::SERVICE_UNAVAILABLE.reason(), "Service Unavailable");
    assert_eq!(HttpStatusCode::INTERNAL_SERVER_ERROR.reason(), "Internal Server Error");
    assert_eq!(HttpStatusCode(418).reason(), "Client Error");
}
