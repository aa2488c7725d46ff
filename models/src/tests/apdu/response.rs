use crate::{ModelError, ResponseApdu};

#[test]
fn given_9000_when_checking_success_then_is_success() {
    let response = ResponseApdu::new(vec![0x01, 0x02], 0x90, 0x00);

    assert!(response.is_success());
    assert_eq!(response.sw(), 0x9000);
    assert_eq!(response.remaining_pin_attempts(), None);
}

/// **VALUE**: Verifies the PIN retry counter is read from the low nibble of SW2.
///
/// **WHY THIS MATTERS**: Three wrong PINs block the card permanently. Callers
/// must see the counter to stop before that happens.
///
/// **BUG THIS CATCHES**: Returning the whole SW2 byte (0xC2 = 194 attempts).
#[test]
fn given_63cx_when_reading_attempts_then_returns_low_nibble() {
    // GIVEN: A failed VERIFY with two attempts left
    let response = ResponseApdu::status(0x63C2);

    // WHEN/THEN: Counter is 2 and the response is not a success
    assert_eq!(response.remaining_pin_attempts(), Some(2));
    assert!(!response.is_success());
    assert_eq!(response.sw1(), 0x63);
    assert_eq!(response.sw2(), 0xC2);
}

#[test]
fn given_response_when_converting_to_bytes_then_status_trails_data() {
    let response = ResponseApdu::new(vec![0xDF, 0x22], 0x90, 0x00);

    assert_eq!(response.to_bytes(), vec![0xDF, 0x22, 0x90, 0x00]);
}

#[test]
fn given_raw_bytes_when_parsing_then_splits_last_two_as_status() {
    let response = ResponseApdu::from_bytes(&[0xAA, 0xBB, 0x6A, 0x82]).expect("parse");

    assert_eq!(response.data(), &[0xAA, 0xBB]);
    assert_eq!(response.sw(), 0x6A82);
}

#[test]
fn given_status_only_bytes_when_parsing_then_data_is_empty() {
    let response = ResponseApdu::from_bytes(&[0x90, 0x00]).expect("parse");

    assert!(response.data().is_empty());
    assert!(response.is_success());
}

#[test]
fn given_single_byte_when_parsing_then_fails() {
    let result = ResponseApdu::from_bytes(&[0x90]);

    assert!(matches!(result, Err(ModelError::Decoding { .. })));
}
