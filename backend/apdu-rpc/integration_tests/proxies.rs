use crate::helpers::{Fixture, FixedResponseTransport, RecordingTransport};

use apdu_rpc::platform::mock::DEFAULT_MOCK_DEVICE_ID;
use apdu_rpc::{ClientTransport, PlatformProxy, SmartCard, SmartCardDevice, SmartCardPlatform};

use models::{RpcResponse, codes};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

fn recording_proxy(fixture: &Fixture) -> (PlatformProxy, Arc<RecordingTransport>) {
    let recorder = Arc::new(RecordingTransport::new(
        Arc::clone(&fixture.client) as Arc<dyn ClientTransport>
    ));
    let proxy = PlatformProxy::new(Arc::clone(&recorder) as Arc<dyn ClientTransport>);
    (proxy, recorder)
}

/// **VALUE**: Verifies acquiring the same device twice on one proxy fails
/// fast with ALREADY_CONNECTED and creates nothing.
///
/// **WHY THIS MATTERS**: Two proxies for one reader would each believe they
/// own its session. This is a programmer error and must be loud.
///
/// **BUG THIS CATCHES**: Would catch returning the cached proxy silently, or
/// making the remote call before checking the local table.
#[tokio::test]
async fn given_acquired_device_when_acquiring_same_id_again_then_already_connected() {
    // GIVEN
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    let _device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("first acquire");
    recorder.clear();

    // WHEN
    let err = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .err()
        .expect("second acquire");

    // THEN
    assert_eq!(err.code(), codes::ALREADY_CONNECTED);
    assert!(recorder.calls().is_empty(), "no remote call for a local rejection");
    assert_eq!(platform.tracked_device_ids(), vec![DEFAULT_MOCK_DEVICE_ID]);
    assert_eq!(fixture.adapter.device_handles().len(), 1);
}

/// **VALUE**: Verifies a device release with an open card releases the card
/// before the device.
///
/// **WHY THIS MATTERS**: Releasing the reader first can leave the card
/// session dangling on real hardware.
///
/// **BUG THIS CATCHES**: Would catch the cascade running after the device's
/// own remote release.
#[tokio::test]
async fn given_device_with_open_card_when_releasing_then_card_release_comes_first() {
    // GIVEN
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let _card = device.start_session().await.expect("session");
    recorder.clear();

    // WHEN
    device.release().await.expect("release");

    // THEN
    assert_eq!(recorder.calls(), vec!["card.release", "device.release"]);
    assert!(!device.is_session_active());
    assert!(platform.tracked_device_ids().is_empty());
}

#[tokio::test]
async fn given_open_device_and_card_when_releasing_platform_then_cascade_runs_top_down_last() {
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    device.start_session().await.expect("session");
    recorder.clear();

    platform.release(false).await.expect("release");

    assert_eq!(
        recorder.calls(),
        vec!["card.release", "device.release", "platform.release"]
    );
    assert!(!platform.is_initialized());
}

/// **VALUE**: Verifies a failing nested release does not stop the cascade.
///
/// **WHY THIS MATTERS**: Once the user asks to release, the system must end
/// released. One stuck card cannot hold the platform open.
///
/// **BUG THIS CATCHES**: Would catch `?` on the nested release result.
#[tokio::test]
async fn given_card_release_failing_when_releasing_platform_then_platform_still_released() {
    // GIVEN
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    device.start_session().await.expect("session");
    recorder.clear();
    recorder.fail_method("card.release");

    // WHEN
    platform.release(false).await.expect("release completes");

    // THEN
    assert!(!platform.is_initialized());
    assert!(platform.tracked_device_ids().is_empty());
    assert_eq!(
        recorder.calls(),
        vec!["card.release", "device.release", "platform.release"]
    );
    assert!(!fixture.mock.is_initialized());
}

#[tokio::test]
async fn given_initialized_proxy_when_init_without_force_then_rejected_locally() {
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    recorder.clear();

    let err = platform.init(false).await.expect_err("second init");

    assert_eq!(err.code(), codes::ALREADY_INITIALIZED);
    assert!(recorder.calls().is_empty());
    platform.init(true).await.expect("forced init");
    assert_eq!(recorder.calls(), vec!["platform.init"]);
}

#[tokio::test]
async fn given_uninitialized_proxy_when_using_it_then_not_initialized_without_remote_call() {
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);

    let listing = platform.get_device_info().await.expect_err("list");
    let acquiring = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .err()
        .expect("acquire");
    let releasing = platform.release(false).await.expect_err("release");

    for err in [listing, acquiring, releasing] {
        assert_eq!(err.code(), codes::NOT_INITIALIZED);
    }
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn given_remote_device_when_starting_hce_then_unsupported_operation() {
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");

    let err = device.start_hce_session().await.err().expect("hce");

    assert_eq!(err.code(), codes::UNSUPPORTED_OPERATION);
}

#[tokio::test]
async fn given_open_card_when_starting_second_session_then_already_connected() {
    let fixture = Fixture::new();
    let (platform, recorder) = recording_proxy(&fixture);
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    recorder.clear();

    let err = device.start_session().await.err().expect("second session");

    assert_eq!(err.code(), codes::ALREADY_CONNECTED);
    assert!(recorder.calls().is_empty());
    card.release().await.expect("release card");
    assert!(!device.is_session_active());
    device.start_session().await.expect("session after release");
}

/// **VALUE**: Verifies a remote error code reaches the caller unchanged.
///
/// **WHY THIS MATTERS**: Consumers branch on `code`. CARD_NOT_PRESENT must
/// arrive as CARD_NOT_PRESENT, not as a transport or internal error.
///
/// **BUG THIS CATCHES**: Would catch the proxy rewrapping remote errors.
#[tokio::test]
async fn given_no_card_in_reader_when_starting_session_then_remote_code_passes_through() {
    // GIVEN
    let fixture = Fixture::new();
    fixture
        .mock
        .device(DEFAULT_MOCK_DEVICE_ID)
        .expect("mock device")
        .set_card_present(false);
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");

    // WHEN
    let err = device.start_session().await.err().expect("no card");

    // THEN
    assert_eq!(err.code(), codes::CARD_NOT_PRESENT);
    assert!(!device.is_session_active());
    assert!(!device.is_card_present().await.expect("presence"));
}

#[tokio::test]
async fn given_no_card_when_waiting_remotely_then_server_timeout_passes_through() {
    let fixture = Fixture::new();
    fixture
        .mock
        .device(DEFAULT_MOCK_DEVICE_ID)
        .expect("mock device")
        .set_card_present(false);
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");

    let err = device
        .wait_for_card_presence(Duration::from_millis(20))
        .await
        .expect_err("timeout");

    assert_eq!(err.code(), codes::TIMEOUT);
}

/// **VALUE**: Verifies a remote wait resolves as soon as a card is inserted
/// while the call is pending.
///
/// **WHY THIS MATTERS**: Waiting for a card is the one long-running call.
/// The server must keep watching the reader, not answer from a snapshot.
///
/// **BUG THIS CATCHES**: Would catch a wait that only checks presence once,
/// or one that sits out its full timeout after the card arrives.
#[tokio::test]
async fn given_pending_remote_wait_when_card_inserted_then_wait_resolves_early() {
    // GIVEN
    let fixture = Fixture::new();
    let reader = fixture
        .mock
        .device(DEFAULT_MOCK_DEVICE_ID)
        .expect("mock device");
    reader.set_card_present(false);
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let inserter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        reader.set_card_present(true);
    });

    // WHEN
    let started = tokio::time::Instant::now();
    device
        .wait_for_card_presence(Duration::from_secs(5))
        .await
        .expect("card inserted");

    // THEN
    assert!(started.elapsed() < Duration::from_secs(5));
    inserter.await.expect("inserter");
    let card = device.start_session().await.expect("session");
    assert_eq!(card.get_atr().await.expect("atr")[0], 0x3B);
}

#[tokio::test]
async fn given_response_for_other_request_when_calling_then_protocol_error() {
    let transport = FixedResponseTransport::new(RpcResponse::success("someone-else", json!(true)));
    let platform = PlatformProxy::new(Arc::new(transport));

    let err = platform.init(false).await.expect_err("mismatched id");

    assert_eq!(err.code(), codes::PROTOCOL_ERROR);
    assert!(!platform.is_initialized());
}

#[tokio::test]
async fn given_released_proxy_device_when_acquiring_again_then_succeeds() {
    let fixture = Fixture::new();
    let platform = PlatformProxy::new(fixture.client.clone());
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");

    device.release().await.expect("release");
    let again = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("reacquire");

    assert_eq!(again.get_device_info().id(), DEFAULT_MOCK_DEVICE_ID);
    assert!(platform.tracked_device(DEFAULT_MOCK_DEVICE_ID).is_some());
}
