use apdu_bridge::bridge::Bridge;

use apdu_rpc::config::PlatformKind;
use apdu_rpc::error::TransportError;
use apdu_rpc::{
    BridgeConfig, ClientTransport, HttpClientTransport, PlatformProxy, SmartCardPlatform,
    WsClientTransport,
};

use models::{RpcRequest, codes};

use std::sync::Arc;

use serde_json::json;

const TOKEN: &str = "bridge-test-token";

fn test_config(kind: PlatformKind) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server.listen = "127.0.0.1:0".parse().unwrap();
    config.server.auth_token = Some(String::from(TOKEN));
    config.platform.kind = kind;
    config.platform.mock_devices = vec![String::from("reader-a"), String::from("reader-b")];
    config
}

/// **VALUE**: Verifies the bridge serves the configured mock readers over
/// WebSocket with the configured token.
///
/// **WHY THIS MATTERS**: This is what `main` does. Config fields that do not
/// reach the server (token, device list) would only show up in production.
///
/// **BUG THIS CATCHES**: Would catch the token or device ids being dropped
/// between config and server.
#[tokio::test]
async fn given_mock_config_when_bridge_started_then_client_sees_configured_readers() {
    // GIVEN
    let bridge = Bridge::from_config(&test_config(PlatformKind::Mock)).unwrap();
    bridge.start().await.unwrap();
    let url = bridge.ws_url().unwrap();

    // WHEN
    let transport = WsClientTransport::connect(&url, TOKEN).await.unwrap();
    let platform = PlatformProxy::new(Arc::new(transport));
    platform.init(false).await.unwrap();
    let infos = platform.get_device_info().await.unwrap();

    // THEN
    let ids: Vec<&str> = infos.iter().map(|info| info.id()).collect();
    assert_eq!(ids, vec!["reader-a", "reader-b"]);

    platform.release(false).await.unwrap();
    bridge.stop().await.unwrap();
}

#[tokio::test]
async fn given_bridge_with_token_when_client_uses_another_then_rejected() {
    let bridge = Bridge::from_config(&test_config(PlatformKind::Mock)).unwrap();
    bridge.start().await.unwrap();

    let result = WsClientTransport::connect(&bridge.ws_url().unwrap(), "wrong").await;

    assert!(matches!(result, Err(TransportError::Auth { .. })));
    bridge.stop().await.unwrap();
}

/// **VALUE**: Verifies a pcsc config still serves, answering NOT_AVAILABLE.
///
/// **WHY THIS MATTERS**: Clients need a clean error code to show "no reader
/// subsystem" instead of a connection failure they would retry forever.
///
/// **BUG THIS CATCHES**: Would catch the bridge failing to start, or
/// leaving the transport without a handler (NO_HANDLER).
#[tokio::test]
async fn given_pcsc_config_when_calling_then_not_available() {
    // GIVEN
    let bridge = Bridge::from_config(&test_config(PlatformKind::Pcsc)).unwrap();
    bridge.start().await.unwrap();
    let transport = WsClientTransport::connect(&bridge.ws_url().unwrap(), TOKEN)
        .await
        .unwrap();

    // WHEN
    let response = transport
        .call(RpcRequest::new("r1", "platform.init", Vec::new()))
        .await
        .unwrap();

    // THEN
    assert_eq!(response.id, "r1");
    assert_eq!(response.error.unwrap().code, codes::NOT_AVAILABLE);
    bridge.stop().await.unwrap();
}

#[tokio::test]
async fn given_stopped_bridge_then_no_local_addr() {
    let bridge = Bridge::from_config(&test_config(PlatformKind::Mock)).unwrap();
    assert!(bridge.local_addr().is_none());

    bridge.start().await.unwrap();
    assert!(bridge.local_addr().is_some());

    bridge.stop().await.unwrap();
    assert!(bridge.local_addr().is_none());
}

fn with_http(mut config: BridgeConfig) -> BridgeConfig {
    config.server.http_listen = Some("127.0.0.1:0".parse().unwrap());
    config
}

/// **VALUE**: Verifies the HTTP endpoint and the WebSocket server dispatch
/// into one set of handles.
///
/// **WHY THIS MATTERS**: A device acquired over one binding must not be
/// acquirable again over the other, and its handle must work on both.
///
/// **BUG THIS CATCHES**: Would catch the HTTP endpoint getting its own
/// adapter, which would hand out duplicate handles for the same reader.
#[tokio::test]
async fn given_http_listen_when_acquiring_over_http_then_handle_works_over_websocket() {
    // GIVEN
    let bridge = Bridge::from_config(&with_http(test_config(PlatformKind::Mock))).unwrap();
    bridge.start().await.unwrap();
    let http = HttpClientTransport::new(&bridge.http_url().unwrap()).unwrap();
    let ws = WsClientTransport::connect(&bridge.ws_url().unwrap(), TOKEN)
        .await
        .unwrap();

    // WHEN
    http.call(RpcRequest::new("h1", "platform.init", vec![json!(false)]))
        .await
        .unwrap();
    let acquired = http
        .call(RpcRequest::new("h2", "platform.acquireDevice", vec![json!("reader-a")]))
        .await
        .unwrap();
    let handle = acquired.result.unwrap();
    let present = ws
        .call(RpcRequest::new("w1", "device.isCardPresent", vec![handle]))
        .await
        .unwrap();

    // THEN
    assert_eq!(present.id, "w1");
    assert_eq!(present.result, Some(json!(true)));
    bridge.stop().await.unwrap();
    assert!(bridge.http_url().is_none());
}

#[tokio::test]
async fn given_pcsc_config_with_http_when_calling_then_not_available() {
    let bridge = Bridge::from_config(&with_http(test_config(PlatformKind::Pcsc))).unwrap();
    bridge.start().await.unwrap();
    let platform = PlatformProxy::new(Arc::new(
        HttpClientTransport::new(&bridge.http_url().unwrap()).unwrap(),
    ));

    let err = platform.init(false).await.unwrap_err();

    assert_eq!(err.code(), codes::NOT_AVAILABLE);
    bridge.stop().await.unwrap();
}

#[tokio::test]
async fn given_no_http_listen_then_no_http_url() {
    let bridge = Bridge::from_config(&test_config(PlatformKind::Mock)).unwrap();
    bridge.start().await.unwrap();

    assert!(bridge.http_url().is_none());
    bridge.stop().await.unwrap();
}
