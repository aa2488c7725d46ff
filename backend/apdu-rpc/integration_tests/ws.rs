use crate::helpers::KENHOJO_AID;

use apdu_rpc::error::TransportError;
use apdu_rpc::platform::mock::{DEFAULT_MOCK_DEVICE_ID, MockPlatform};
use apdu_rpc::{
    ClientTransport, PlatformProxy, ServerTransport, SmartCard, SmartCardPlatform,
    SmartCardPlatformAdapter, WsClientTransport, WsServerConfig, WsServerTransport,
};

use common::RedactedToken;
use models::{CommandApdu, RpcEvent, RpcRequest, ServerFrame, codes};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TEST_AUTH_TOKEN: &str = "test-token-12345";

struct RunningServer {
    server: Arc<WsServerTransport>,
    adapter: SmartCardPlatformAdapter,
    url: String,
}

async fn start_server() -> RunningServer {
    let listen: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let config = WsServerConfig::new(listen).with_auth_token(RedactedToken::new(TEST_AUTH_TOKEN));
    let server = Arc::new(WsServerTransport::new(config));
    let platform = Arc::new(MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock"));
    let adapter = SmartCardPlatformAdapter::new(platform, Arc::clone(&server) as Arc<dyn ServerTransport>);
    adapter.start().await.expect("start");
    let addr = server.local_addr().expect("bound");
    RunningServer {
        server,
        adapter,
        url: format!("ws://{addr}"),
    }
}

/// **VALUE**: Verifies the full proxy stack works over a real socket.
///
/// **WHY THIS MATTERS**: The in-memory tests prove the logic. This proves
/// the frames, the auth handshake and id correlation on the wire.
///
/// **BUG THIS CATCHES**: Would catch frame tags drifting between client and
/// server, or responses never reaching the pending table.
#[tokio::test]
async fn given_authenticated_client_when_selecting_application_then_status_is_success() {
    // GIVEN
    let running = start_server().await;
    let transport = WsClientTransport::connect(&running.url, TEST_AUTH_TOKEN)
        .await
        .expect("connect");
    let platform = PlatformProxy::new(Arc::new(transport));

    // WHEN
    platform.init(false).await.expect("init");
    let device = platform
        .acquire_device(DEFAULT_MOCK_DEVICE_ID)
        .await
        .expect("acquire");
    let card = device.start_session().await.expect("session");
    let response = card
        .transmit(&CommandApdu::select_df(&KENHOJO_AID).expect("select"))
        .await
        .expect("transmit");

    // THEN
    assert_eq!(response.sw(), 0x9000);
    platform.release(false).await.expect("release");
    running.adapter.stop().await.expect("stop");
}

#[tokio::test]
async fn given_wrong_token_when_connecting_then_auth_error() {
    let running = start_server().await;

    let result = WsClientTransport::connect(&running.url, "not-the-token").await;

    assert!(matches!(result, Err(TransportError::Auth { .. })));
    running.adapter.stop().await.expect("stop");
}

/// **VALUE**: Verifies concurrent calls over one socket each get their own
/// response.
///
/// **WHY THIS MATTERS**: The server answers in completion order. Matching by
/// arrival order would hand one caller another's result.
///
/// **BUG THIS CATCHES**: Would catch a client that pops responses FIFO.
#[tokio::test]
async fn given_many_concurrent_calls_when_responses_interleave_then_each_matches_its_id() {
    // GIVEN
    let running = start_server().await;
    let transport = Arc::new(
        WsClientTransport::connect(&running.url, TEST_AUTH_TOKEN)
            .await
            .expect("connect"),
    );

    // WHEN
    let calls = (0..20).map(|i| {
        let transport = Arc::clone(&transport);
        async move {
            let method = if i % 2 == 0 {
                "platform.isInitialized"
            } else {
                "platform.doesNotExist"
            };
            let response = transport
                .call(RpcRequest::new(format!("c{i}"), method, Vec::new()))
                .await
                .expect("call");
            (i, response)
        }
    });
    let results = join_all(calls).await;

    // THEN
    for (i, response) in results {
        assert_eq!(response.id, format!("c{i}"));
        assert_eq!(response.is_error(), i % 2 == 1);
    }
    running.adapter.stop().await.expect("stop");
}

#[tokio::test]
async fn given_subscribed_client_when_server_emits_then_event_arrives() {
    let running = start_server().await;
    let transport = WsClientTransport::connect(&running.url, TEST_AUTH_TOKEN)
        .await
        .expect("connect");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = transport
        .on_event(Arc::new(move |event: &RpcEvent| {
            let _ = tx.send(event.clone());
        }))
        .expect("websocket has a push channel");
    // One round trip guarantees the connection is past auth and subscribed.
    transport
        .call(RpcRequest::new("warmup", "platform.isInitialized", Vec::new()))
        .await
        .expect("warmup");

    running
        .server
        .emit_event(RpcEvent::new(RpcEvent::CARD_REMOVED).for_handle("card-1"));

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event in time")
        .expect("channel open");
    assert_eq!(event.event, "card.removed");
    assert_eq!(event.handle.as_deref(), Some("card-1"));
    running.adapter.stop().await.expect("stop");
}

#[tokio::test]
async fn given_authenticated_socket_when_sending_garbage_then_internal_error_with_unknown_id() {
    let running = start_server().await;
    let (mut ws, _) = connect_async(running.url.as_str()).await.expect("connect");
    let auth = format!(r#"{{"type":"auth","token":"{TEST_AUTH_TOKEN}"}}"#);
    ws.send(Message::text(auth)).await.expect("send auth");
    let _auth_result = ws.next().await.expect("auth result").expect("frame");

    ws.send(Message::text("{not json")).await.expect("send garbage");
    let reply = ws.next().await.expect("reply").expect("frame");

    let Message::Text(text) = reply else {
        panic!("expected a text frame");
    };
    match serde_json::from_str::<ServerFrame>(text.as_str()).expect("server frame") {
        ServerFrame::Response(response) => {
            assert_eq!(response.id, "unknown");
            assert_eq!(
                response.error.expect("error").code,
                codes::INTERNAL_ERROR
            );
        }
        other => panic!("expected a response frame, got {other:?}"),
    }
    running.adapter.stop().await.expect("stop");
}

#[tokio::test]
async fn given_connected_client_when_server_stops_then_calls_fail_closed() {
    let running = start_server().await;
    let transport = WsClientTransport::connect(&running.url, TEST_AUTH_TOKEN)
        .await
        .expect("connect");

    running.adapter.stop().await.expect("stop");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !transport.is_closed() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let result = transport
        .call(RpcRequest::new("late", "platform.isInitialized", Vec::new()))
        .await;
    assert!(matches!(result, Err(TransportError::Closed { .. })));
}
