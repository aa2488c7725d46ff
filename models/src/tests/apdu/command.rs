use crate::{CommandApdu, ModelError};

const KENHOJO_AID: [u8; 8] = [0xD3, 0x92, 0x10, 0x00, 0x00, 0x00, 0x01, 0x01];

#[test]
fn given_header_only_when_encoding_then_case1_is_four_bytes() {
    let apdu = CommandApdu::header(0x00, 0x84, 0x00, 0x00);

    assert_eq!(apdu.to_bytes(), vec![0x00, 0x84, 0x00, 0x00]);
}

/// **VALUE**: Verifies the SELECT DF builder produces the exact bytes a card expects.
///
/// **WHY THIS MATTERS**: This is the first command of every session. If the
/// header or Lc is off, the card answers `6A82` and nothing else works.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - P1/P2 are swapped (select-by-name is P1 = 04)
/// - Lc is written as the length of the whole command
#[test]
fn given_aid_when_building_select_df_then_encodes_case3_short() {
    // GIVEN: The Kenhojo application identifier
    let apdu = CommandApdu::select_df(&KENHOJO_AID).expect("valid AID");

    // WHEN: Encoding
    let bytes = apdu.to_bytes();

    // THEN: Header, Lc = 8, AID, no Le
    let mut expected = vec![0x00, 0xA4, 0x04, 0x0C, 0x08];
    expected.extend_from_slice(&KENHOJO_AID);
    assert_eq!(bytes, expected);
}

#[test]
fn given_pin_when_building_verify_then_p2_addresses_short_ef() {
    let apdu = CommandApdu::verify(b"1234", 0x11).expect("valid PIN");

    assert_eq!(
        apdu.to_bytes(),
        vec![0x00, 0x20, 0x00, 0x91, 0x04, b'1', b'2', b'3', b'4']
    );
}

#[test]
fn given_empty_pin_when_building_verify_then_body_is_omitted() {
    let apdu = CommandApdu::verify(&[], 0x11).expect("empty PIN is a counter query");

    assert_eq!(apdu.data(), None);
    assert_eq!(apdu.to_bytes(), vec![0x00, 0x20, 0x00, 0x91]);
}

#[test]
fn given_fid_when_building_select_ef_then_fid_is_big_endian() {
    let apdu = CommandApdu::select_ef(0x0002);

    assert_eq!(apdu.to_bytes(), vec![0x00, 0xA4, 0x02, 0x0C, 0x02, 0x00, 0x02]);
}

/// **VALUE**: Verifies Le = 0 means "everything" and encodes as a zero byte.
///
/// **BUG THIS CATCHES**: Treating `Some(0)` like `None` and dropping the Le
/// byte, turning a case 2 READ BINARY into a case 1 command the card rejects.
#[test]
fn given_zero_le_when_encoding_read_binary_then_emits_zero_le_byte() {
    // GIVEN: READ BINARY asking for the whole file
    let apdu = CommandApdu::read_binary(0, 0).expect("valid offset");

    // WHEN: Encoding and computing Ne
    let bytes = apdu.to_bytes();

    // THEN: Case 2S with Le = 00, meaning 256
    assert_eq!(bytes, vec![0x00, 0xB0, 0x00, 0x00, 0x00]);
    assert_eq!(apdu.ne(), 256);
}

#[test]
fn given_short_ef_when_building_full_read_then_p1_has_sfi_flag() {
    let apdu = CommandApdu::read_ef_binary_full(0x02);

    assert_eq!(apdu.to_bytes(), vec![0x00, 0xB0, 0x82, 0x00, 0x00]);
}

#[test]
fn given_offset_over_15_bits_when_building_read_binary_then_fails() {
    let result = CommandApdu::read_binary(0x8000, 0);

    assert!(matches!(result, Err(ModelError::Encoding { .. })));
}

/// **VALUE**: Verifies the switch to extended length encoding.
///
/// **WHY THIS MATTERS**: Certificates and signatures exceed 255 bytes. A short
/// Lc silently truncates `len % 256`, sending a corrupt command.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The extended marker byte `00` is omitted
/// - Le is written as one byte while Lc is extended
#[test]
fn given_long_body_when_encoding_then_uses_case4_extended() {
    // GIVEN: A 300 byte body with Le 256
    let body = vec![0xAB; 300];
    let apdu = CommandApdu::new(0x00, 0x2A, 0x9E, 0x9A, Some(body.clone()), Some(256))
        .expect("valid command");

    // WHEN: Encoding
    let bytes = apdu.to_bytes();

    // THEN: 00 marker, two byte Lc, body, two byte Le
    assert!(apdu.is_extended());
    assert_eq!(&bytes[..7], &[0x00, 0x2A, 0x9E, 0x9A, 0x00, 0x01, 0x2C]);
    assert_eq!(&bytes[7..307], body.as_slice());
    assert_eq!(&bytes[307..], &[0x01, 0x00]);
}

#[test]
fn given_le_65536_when_encoding_then_case2_extended_wraps_to_zero() {
    let apdu =
        CommandApdu::new(0x00, 0xB0, 0x00, 0x00, None, Some(65536)).expect("maximum Le");

    assert_eq!(apdu.to_bytes(), vec![0x00, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn given_le_above_extended_maximum_when_building_then_fails() {
    let result = CommandApdu::new(0x00, 0xB0, 0x00, 0x00, None, Some(65537));

    assert!(matches!(result, Err(ModelError::Encoding { .. })));
}

/// **VALUE**: Verifies decoding recognises every ISO 7816-4 case.
///
/// **WHY THIS MATTERS**: The server's raw transmit path parses whatever bytes
/// the client sends. A misread case shifts data into Le or vice versa.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - A single trailing byte after the body is not read as Le (case 4S)
/// - Le `00` is not expanded to 256
/// - Three bytes after the header are not read as extended Le (case 2E)
#[test]
fn given_each_iso_case_when_decoding_then_fields_are_recovered() {
    // Case 2S
    let apdu = CommandApdu::from_bytes(&[0x00, 0xB0, 0x00, 0x00, 0x00]).expect("case 2S");
    assert_eq!(apdu.data(), None);
    assert_eq!(apdu.le(), Some(256));

    // Case 3S
    let apdu = CommandApdu::from_bytes(&[0x00, 0xA4, 0x02, 0x0C, 0x02, 0x00, 0x02])
        .expect("case 3S");
    assert_eq!(apdu.data(), Some(&[0x00, 0x02][..]));
    assert_eq!(apdu.le(), None);

    // Case 4S
    let apdu = CommandApdu::from_bytes(&[0x00, 0x88, 0x00, 0x00, 0x01, 0xFF, 0x10])
        .expect("case 4S");
    assert_eq!(apdu.data(), Some(&[0xFF][..]));
    assert_eq!(apdu.le(), Some(0x10));

    // Case 2E
    let apdu = CommandApdu::from_bytes(&[0x00, 0xB0, 0x00, 0x00, 0x00, 0x01, 0x00])
        .expect("case 2E");
    assert_eq!(apdu.data(), None);
    assert_eq!(apdu.le(), Some(256));

    // Case 3E
    let apdu = CommandApdu::from_bytes(&[0x00, 0xD6, 0x00, 0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB])
        .expect("case 3E");
    assert_eq!(apdu.data(), Some(&[0xAA, 0xBB][..]));
    assert_eq!(apdu.le(), None);

    // Case 4E
    let apdu = CommandApdu::from_bytes(&[
        0x00, 0x2A, 0x9E, 0x9A, 0x00, 0x00, 0x01, 0xCC, 0x00, 0x00,
    ])
    .expect("case 4E");
    assert_eq!(apdu.data(), Some(&[0xCC][..]));
    assert_eq!(apdu.le(), Some(65536));
}

#[test]
fn given_truncated_or_inconsistent_bytes_when_decoding_then_fails() {
    let cases: [&[u8]; 5] = [
        &[0x00, 0xA4, 0x04],
        &[0x00, 0xA4, 0x04, 0x0C, 0x05, 0x01],
        &[0x00, 0xA4, 0x04, 0x0C, 0x00, 0x01],
        &[0x00, 0xA4, 0x04, 0x0C, 0x00, 0x00, 0x00, 0x01],
        &[0x00, 0xA4, 0x04, 0x0C, 0x00, 0x00, 0x03, 0x01],
    ];

    for bytes in cases {
        let result = CommandApdu::from_bytes(bytes);
        assert!(
            matches!(result, Err(ModelError::Decoding { .. })),
            "{bytes:02X?} should not decode"
        );
    }
}

#[test]
fn given_encoded_select_when_decoding_then_equals_original() {
    let original = CommandApdu::select_df(&KENHOJO_AID).expect("valid AID");

    let decoded = CommandApdu::from_bytes(&original.to_bytes()).expect("decode");

    assert_eq!(decoded, original);
}

/// **VALUE**: Verifies a decoding error points at the code that asked for the
/// decode.
///
/// **WHY THIS MATTERS**: Every failed `from_bytes` otherwise reports the same
/// line inside the decoder, and the log no longer says which caller sent
/// the bad bytes.
///
/// **BUG THIS CATCHES**: Would catch the error being built somewhere that
/// does not forward the caller's location.
#[test]
fn given_truncated_bytes_when_decoding_then_error_location_is_the_caller() {
    // GIVEN
    let bytes = [0x00, 0xA4];

    // WHEN
    let expected_line = line!() + 1;
    let err = CommandApdu::from_bytes(&bytes).unwrap_err();

    // THEN
    match err {
        ModelError::Decoding { message, location } => {
            assert!(message.contains("4 byte header"), "{message}");
            assert_eq!(location.file, file!());
            assert_eq!(location.line, expected_line);
        }
        other => panic!("expected Decoding, got {other:?}"),
    }
}
