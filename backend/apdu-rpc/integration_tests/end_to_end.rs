use crate::helpers::{Fixture, KENHOJO_AID, find_tlv};

use apdu_rpc::platform::mock::{
    DEFAULT_MOCK_DEVICE_ID, KENHOJO_EF_BASIC_FOUR as EF_BASIC_FOUR, KENHOJO_EF_PIN as EF_PIN,
    TAG_NAME,
};
use apdu_rpc::{PlatformProxy, SmartCard, SmartCardPlatform};

use models::CommandApdu;

/// **VALUE**: Runs the whole select, verify, read sequence through the
/// proxies, the adapter and the mock card.
///
/// **WHY THIS MATTERS**: This is the sequence the card-reading service runs.
/// If it works here, a consumer cannot tell the remote platform from a
/// local one.
///
/// **BUG THIS CATCHES**: Would catch any layer mangling APDU bytes, status
/// words or device info on the way through.
#[tokio::test]
async fn given_mock_reader_when_running_select_verify_read_then_name_is_decoded() {
    // GIVEN
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");

    let infos = platform.get_device_info().await.expect("device info");
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].id(), DEFAULT_MOCK_DEVICE_ID);
    assert_eq!(
        infos[0].friendly_name(),
        Some("Mock Card Reader mock-reader-0")
    );
    assert!(infos[0].supports_apdu());

    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    assert!(device.is_session_active());

    // WHEN
    let select = card
        .transmit(&CommandApdu::select_df(&KENHOJO_AID).expect("select"))
        .await
        .expect("select");
    let verify = card
        .transmit(&CommandApdu::verify(b"1234", EF_PIN).expect("verify"))
        .await
        .expect("verify");
    let read = card
        .transmit(&CommandApdu::read_ef_binary_full(EF_BASIC_FOUR))
        .await
        .expect("read");

    // THEN
    assert_eq!(select.sw(), 0x9000);
    assert_eq!(verify.sw(), 0x9000);
    assert_eq!(read.sw(), 0x9000);
    let name = find_tlv(read.data(), TAG_NAME).expect("DF22 present");
    assert_eq!(std::str::from_utf8(name).expect("utf-8"), "山田太郎");

    platform.release(false).await.expect("release");
    assert!(!platform.is_initialized());
}

/// **VALUE**: Verifies each wrong PIN lowers the remaining count by exactly
/// one and the count never goes below zero.
///
/// **WHY THIS MATTERS**: A wrong PIN is a successful RPC whose status word
/// carries the retry count. The UI shows that number to the user.
///
/// **BUG THIS CATCHES**: Would catch a wrong PIN surfacing as an RPC error,
/// or a counter that skips or wraps.
#[tokio::test]
async fn given_expected_pin_1234_when_sending_0000_repeatedly_then_attempts_count_down_to_zero() {
    // GIVEN
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    card.transmit(&CommandApdu::select_df(&KENHOJO_AID).expect("select"))
        .await
        .expect("select");
    let wrong = CommandApdu::verify(b"0000", EF_PIN).expect("verify");

    // WHEN
    let mut counts = Vec::new();
    for _ in 0..3 {
        let response = card.transmit(&wrong).await.expect("wrong PIN is not an RPC error");
        assert_eq!(response.sw1(), 0x63);
        counts.push(response.sw2() & 0x0F);
    }
    let after_zero = card.transmit(&wrong).await.expect("blocked is not an RPC error");

    // THEN
    assert_eq!(counts, vec![2, 1, 0]);
    assert_ne!(after_zero.sw1(), 0x63, "no retry count below zero");
    assert_eq!(after_zero.sw(), 0x6983);
}

/// **VALUE**: Verifies the structured and raw transmit overloads through the
/// proxy.
///
/// **WHY THIS MATTERS**: Raw callers get raw bytes back, structured callers
/// get a response with `sw == sw1 << 8 | sw2`, and both describe the same
/// card answer.
///
/// **BUG THIS CATCHES**: Would catch the raw path returning a structured
/// object or reordering `sw1`/`sw2`.
#[tokio::test]
async fn given_verified_card_when_reading_both_ways_then_raw_is_data_then_status() {
    // GIVEN
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    card.transmit(&CommandApdu::select_df(&KENHOJO_AID).expect("select"))
        .await
        .expect("select");
    card.transmit(&CommandApdu::verify(b"1234", EF_PIN).expect("verify"))
        .await
        .expect("verify");
    let read = CommandApdu::read_ef_binary_full(EF_BASIC_FOUR);

    // WHEN
    let structured = card.transmit(&read).await.expect("structured");
    let raw = card.transmit_raw(&read.to_bytes()).await.expect("raw");

    // THEN
    assert_eq!(
        structured.sw(),
        (u16::from(structured.sw1()) << 8) | u16::from(structured.sw2())
    );
    let mut expected = structured.data().to_vec();
    expected.extend([structured.sw1(), structured.sw2()]);
    assert_eq!(raw, expected);
}

#[tokio::test]
async fn given_malformed_raw_bytes_when_transmitting_then_card_answers_instead_of_rpc_error() {
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");

    let raw = card.transmit_raw(&[0xFF]).await.expect("raw");

    assert_eq!(raw, vec![0x67, 0x00]);
    assert_eq!(card.get_atr().await.expect("atr")[0], 0x3B);
}
