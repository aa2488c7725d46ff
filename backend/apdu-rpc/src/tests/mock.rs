use crate::platform::mock::{
    DEFAULT_MOCK_DEVICE_ID, KENHOJO_AID, KENHOJO_EF_BASIC_FOUR, KENHOJO_EF_PIN, MockCardProfile,
    MockPlatform, TAG_NAME,
};
use crate::platform::{SmartCard, SmartCardDevice, SmartCardPlatform};

use models::apdu::sw;
use models::{CommandApdu, codes};

use std::sync::Arc;
use std::time::Duration;

async fn open_session(platform: &MockPlatform) -> (Arc<dyn SmartCardDevice>, Arc<dyn SmartCard>) {
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    (device, card)
}

async fn select_kenhojo(card: &dyn SmartCard) {
    let select = CommandApdu::select_df(&KENHOJO_AID).expect("select");
    let response = card.transmit(&select).await.expect("transmit");
    assert_eq!(response.sw(), sw::SUCCESS);
}

#[test]
fn given_default_profile_when_encoding_basic_four_then_name_tlv_leads() {
    let profile = MockCardProfile::default();

    let tlv = profile.basic_four_tlv();

    let name = profile.name.as_bytes();
    assert_eq!(&tlv[..2], &TAG_NAME.to_be_bytes());
    assert_eq!(tlv[2] as usize, name.len());
    assert_eq!(&tlv[3..3 + name.len()], name);
}

/// **VALUE**: Verifies the platform refuses work before `init`.
///
/// **WHY THIS MATTERS**: The proxies assert initialization locally; the
/// mock has to behave the same way or tests pass against a laxer contract.
///
/// **BUG THIS CATCHES**: Would catch device listing that ignores the flag.
#[tokio::test]
async fn given_uninitialized_platform_when_listing_devices_then_not_initialized() {
    // GIVEN
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");

    // WHEN
    let err = platform.get_device_info().await.expect_err("should fail");

    // THEN
    assert_eq!(err.code(), codes::NOT_INITIALIZED);
    assert_eq!(
        platform
            .release(false)
            .await
            .expect_err("release before init")
            .code(),
        codes::NOT_INITIALIZED
    );
}

#[tokio::test]
async fn given_initialized_platform_when_init_again_then_only_force_succeeds() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    platform.init(false).await.expect("first init");

    let err = platform.init(false).await.expect_err("second init");

    assert_eq!(err.code(), codes::ALREADY_INITIALIZED);
    platform.init(true).await.expect("forced init");
}

#[tokio::test]
async fn given_acquired_device_when_acquiring_again_then_already_connected() {
    let platform = MockPlatform::new(["a", "b"]).expect("mock");
    platform.init(false).await.expect("init");
    let device = platform.acquire_device("a").await.expect("acquire");

    let err = platform.acquire_device("a").await.err().expect("double acquire");
    assert_eq!(err.code(), codes::ALREADY_CONNECTED);

    let missing = platform.acquire_device("zzz").await.err().expect("unknown id");
    assert_eq!(missing.code(), codes::DEVICE_NOT_FOUND);

    device.release().await.expect("release");
    platform.acquire_device("a").await.expect("reacquire after release");
}

/// **VALUE**: Verifies session gating on card presence.
///
/// **WHY THIS MATTERS**: A reader with no card must fail `start_session`
/// with a code consumers can branch on.
///
/// **BUG THIS CATCHES**: Would catch opening a session against an empty slot.
#[tokio::test]
async fn given_card_removed_when_starting_session_then_card_not_present() {
    // GIVEN
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    platform.init(false).await.expect("init");
    platform
        .device(DEFAULT_MOCK_DEVICE_ID)
        .expect("device")
        .set_card_present(false);
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");

    // WHEN
    let err = device.start_session().await.err().expect("no card");

    // THEN
    assert_eq!(err.code(), codes::CARD_NOT_PRESENT);
    assert!(!device.is_card_present().await.expect("presence"));
}

#[tokio::test]
async fn given_active_session_when_starting_another_then_already_connected() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (device, card) = open_session(&platform).await;

    let err = device.start_session().await.err().expect("second session");
    assert_eq!(err.code(), codes::ALREADY_CONNECTED);

    card.release().await.expect("release card");
    assert!(!device.is_session_active());
    device.start_session().await.expect("session after release");
}

#[tokio::test]
async fn given_no_card_when_waiting_briefly_then_times_out() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    platform.init(false).await.expect("init");
    let reader = platform.device(DEFAULT_MOCK_DEVICE_ID).expect("device");
    reader.set_card_present(false);

    let err = reader
        .wait_for_card_presence(Duration::from_millis(20))
        .await
        .expect_err("should time out");

    assert_eq!(err.code(), codes::TIMEOUT);
}

/// **VALUE**: Verifies a waiter wakes when the card is inserted mid-wait.
///
/// **WHY THIS MATTERS**: `waitForCardPresence` is the one long suspension in
/// the protocol. It must resolve on insertion, not only at the deadline.
///
/// **BUG THIS CATCHES**: Would catch polling the flag once and then sleeping.
#[tokio::test]
async fn given_waiter_when_card_inserted_then_wait_resolves() {
    // GIVEN
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    platform.init(false).await.expect("init");
    let reader = platform.device(DEFAULT_MOCK_DEVICE_ID).expect("device");
    reader.set_card_present(false);

    // WHEN
    let inserter = Arc::clone(&reader);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        inserter.set_card_present(true);
    });

    // THEN
    reader
        .wait_for_card_presence(Duration::from_secs(5))
        .await
        .expect("card inserted");
}

#[tokio::test]
async fn given_no_selection_when_reading_then_security_status_not_satisfied() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;

    let read = CommandApdu::read_ef_binary_full(KENHOJO_EF_BASIC_FOUR);
    let response = card.transmit(&read).await.expect("transmit");

    assert_eq!(response.sw(), sw::SECURITY_STATUS_NOT_SATISFIED);
}

/// **VALUE**: Verifies the retry counter counts down by one and stops at
/// zero, after which VERIFY reports the method blocked.
///
/// **WHY THIS MATTERS**: Consumers show "N attempts left" from `63Cx`. An
/// off-by-one or wraparound tells users they have 15 tries left on a card
/// about to lock.
///
/// **BUG THIS CATCHES**: Would catch a counter that underflows or one that is
/// reset by a new session.
#[tokio::test]
async fn given_wrong_pins_when_verifying_then_counter_drops_to_zero_then_blocks() {
    // GIVEN
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;
    select_kenhojo(card.as_ref()).await;
    let wrong = CommandApdu::verify(b"0000", KENHOJO_EF_PIN).expect("verify");

    // WHEN / THEN
    for expected in [2u8, 1, 0] {
        let response = card.transmit(&wrong).await.expect("transmit");
        assert_eq!(response.sw1(), 0x63);
        assert_eq!(response.remaining_pin_attempts(), Some(expected));
    }
    let blocked = card.transmit(&wrong).await.expect("transmit");
    assert_eq!(blocked.sw(), sw::AUTH_METHOD_BLOCKED);

    let right = CommandApdu::verify(b"1234", KENHOJO_EF_PIN).expect("verify");
    let still_blocked = card.transmit(&right).await.expect("transmit");
    assert_eq!(still_blocked.sw(), sw::AUTH_METHOD_BLOCKED);
    assert_eq!(
        platform
            .device(DEFAULT_MOCK_DEVICE_ID)
            .expect("device")
            .remaining_pin_attempts(),
        0
    );
}

#[tokio::test]
async fn given_empty_verify_when_transmitting_then_reports_counter_without_spending_it() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;
    select_kenhojo(card.as_ref()).await;

    let retry_query = CommandApdu::verify(b"", KENHOJO_EF_PIN).expect("verify");
    let first = card.transmit(&retry_query).await.expect("transmit");
    let second = card.transmit(&retry_query).await.expect("transmit");

    assert_eq!(first.sw(), 0x63C3);
    assert_eq!(second.sw(), 0x63C3);
}

#[tokio::test]
async fn given_verified_card_when_reading_with_small_le_then_response_is_truncated() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;
    select_kenhojo(card.as_ref()).await;
    let verify = CommandApdu::verify(b"1234", KENHOJO_EF_PIN).expect("verify");
    assert!(card.transmit(&verify).await.expect("verify").is_success());
    let select_ef = CommandApdu::select_ef(u16::from(KENHOJO_EF_BASIC_FOUR));
    assert!(card.transmit(&select_ef).await.expect("select ef").is_success());

    let read = CommandApdu::read_binary(0, 4).expect("read");
    let response = card.transmit(&read).await.expect("transmit");

    assert!(response.is_success());
    assert_eq!(response.data(), &MockCardProfile::default().basic_four_tlv()[..4]);
}

/// **VALUE**: Verifies raw transmit answers malformed bytes with `6700`
/// instead of failing the call.
///
/// **WHY THIS MATTERS**: The raw path exists so testing tools can send
/// broken APDUs and observe the card's reaction.
///
/// **BUG THIS CATCHES**: Would catch raw transmit returning an error for
/// unparseable input.
#[tokio::test]
async fn given_truncated_bytes_when_transmitting_raw_then_wrong_length_status() {
    // GIVEN
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;

    // WHEN
    let response = card.transmit_raw(&[0x00, 0xA4]).await.expect("transmit raw");

    // THEN
    assert_eq!(response, vec![0x67, 0x00]);
}

#[tokio::test]
async fn given_released_card_when_transmitting_then_reader_error() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;
    card.release().await.expect("release");

    let err = card.get_atr().await.expect_err("released");

    assert_eq!(err.code(), codes::READER_ERROR);
}

#[tokio::test]
async fn given_card_pulled_mid_session_when_transmitting_then_card_not_present() {
    let platform = MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock");
    let (_device, card) = open_session(&platform).await;
    platform
        .device(DEFAULT_MOCK_DEVICE_ID)
        .expect("device")
        .set_card_present(false);

    let err = card
        .transmit(&CommandApdu::header(0x00, 0x84, 0x00, 0x00))
        .await
        .expect_err("card gone");

    assert_eq!(err.code(), codes::CARD_NOT_PRESENT);
}
