use crate::helpers::{Fixture, KENHOJO_AID};

use apdu_rpc::platform::mock::{DEFAULT_MOCK_DEVICE_ID, MockPlatform};
use apdu_rpc::{
    ClientTransport, HttpClientTransport, HttpServerConfig, HttpServerTransport, PlatformProxy,
    RpcHandler, ServerTransport, SmartCardPlatform, SmartCardPlatformAdapter, UnavailableHandler,
};

use models::{CommandApdu, RpcEvent, RpcRequest, RpcResponse, codes};

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

async fn start_bare_server() -> Arc<HttpServerTransport> {
    let listen: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let server = Arc::new(HttpServerTransport::new(HttpServerConfig::new(listen)));
    server.start().await.expect("start");
    server
}

async fn start_adapter() -> (Arc<HttpServerTransport>, SmartCardPlatformAdapter) {
    let listen: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let server = Arc::new(HttpServerTransport::new(HttpServerConfig::new(listen)));
    let platform = Arc::new(MockPlatform::new([DEFAULT_MOCK_DEVICE_ID]).expect("mock"));
    let adapter =
        SmartCardPlatformAdapter::new(platform, Arc::clone(&server) as Arc<dyn ServerTransport>);
    adapter.start().await.expect("start");
    (server, adapter)
}

fn rpc_url(server: &HttpServerTransport) -> String {
    server.rpc_url().expect("started")
}

async fn post_raw(url: &str, body: &str) -> (StatusCode, RpcResponse) {
    let response = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("send");
    let status = response.status();
    let decoded = response.json::<RpcResponse>().await.expect("rpc body");
    (status, decoded)
}

struct PanickingHandler;

#[async_trait]
impl RpcHandler for PanickingHandler {
    async fn handle(&self, _request: RpcRequest) -> RpcResponse {
        panic!("handler blew up");
    }
}

/// **VALUE**: Verifies the full proxy stack works over the HTTP binding.
///
/// **WHY THIS MATTERS**: HTTP is the binding for clients that cannot hold a
/// socket open. Client and server must agree on path, body and status.
///
/// **BUG THIS CATCHES**: Would catch the server posting to a different path
/// than the client, or bodies that the other side cannot decode.
#[tokio::test]
async fn given_http_server_with_adapter_when_selecting_application_then_status_is_success() {
    // GIVEN
    let (server, adapter) = start_adapter().await;
    let transport = HttpClientTransport::new(&rpc_url(&server)).expect("transport");
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
    assert_eq!(card.get_atr().await.expect("atr")[0], 0x3B);
    platform.release(false).await.expect("release");
    assert!(adapter.device_handles().is_empty());
    assert!(adapter.card_handles().is_empty());
    adapter.stop().await.expect("stop");
}

/// **VALUE**: Verifies dispatch failures travel as 200 with an error body.
///
/// **WHY THIS MATTERS**: The body is authoritative. Mapping domain errors
/// onto HTTP statuses would make clients branch on two channels.
///
/// **BUG THIS CATCHES**: Would catch an error response answered 4xx or 5xx.
#[tokio::test]
async fn given_unknown_handle_when_posting_then_200_with_handle_not_found() {
    // GIVEN
    let (server, adapter) = start_adapter().await;
    let body = json!({"id": "r1", "method": "card.getAtr", "params": ["card-99"]}).to_string();

    // WHEN
    let (status, response) = post_raw(&rpc_url(&server), &body).await;

    // THEN
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.id, "r1");
    assert_eq!(response.error.expect("error").code, codes::HANDLE_NOT_FOUND);
    adapter.stop().await.expect("stop");
}

/// **VALUE**: Verifies a bridge without a platform answers 503 `NOT_AVAILABLE`.
///
/// **WHY THIS MATTERS**: Clients tell "no reader stack here" apart from
/// faults by this status and code.
///
/// **BUG THIS CATCHES**: Would catch the unavailable response going out as
/// 200, or the id not being echoed.
#[tokio::test]
async fn given_unavailable_handler_when_posting_then_503_not_available() {
    // GIVEN
    let server = start_bare_server().await;
    server.on_request(Arc::new(UnavailableHandler::new("PC/SC not available")));
    let body = json!({"id": "r2", "method": "platform.init", "params": [false]}).to_string();

    // WHEN
    let (status, response) = post_raw(&rpc_url(&server), &body).await;

    // THEN
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.id, "r2");
    let error = response.error.expect("error");
    assert_eq!(error.code, codes::NOT_AVAILABLE);
    assert_eq!(error.message, "PC/SC not available");
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn given_no_handler_registered_when_posting_then_503_not_available() {
    let server = start_bare_server().await;
    let body = json!({"id": "r3", "method": "platform.init", "params": []}).to_string();

    let (status, response) = post_raw(&rpc_url(&server), &body).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.id, "r3");
    let error = response.error.expect("error");
    assert_eq!(error.code, codes::NOT_AVAILABLE);
    assert_eq!(error.message, "Smart card platform not available");
    server.stop().await.expect("stop");
}

/// **VALUE**: Verifies a 503 reaches a proxy caller as `NOT_AVAILABLE`.
///
/// **BUG THIS CATCHES**: Would catch the client treating the 503 status as a
/// transport failure instead of decoding its body.
#[tokio::test]
async fn given_unavailable_server_when_calling_through_proxy_then_code_reaches_caller() {
    let server = start_bare_server().await;
    server.on_request(Arc::new(UnavailableHandler::new("PC/SC not available")));
    let transport = HttpClientTransport::new(&rpc_url(&server)).expect("transport");
    let platform = PlatformProxy::new(Arc::new(transport));

    let err = platform.init(false).await.expect_err("unavailable");

    assert_eq!(err.code(), codes::NOT_AVAILABLE);
    server.stop().await.expect("stop");
}

/// **VALUE**: Verifies an undecodable body is answered 500 `INTERNAL_ERROR`.
///
/// **WHY THIS MATTERS**: The client only turns undecodable *responses* into
/// transport errors, so the server must always answer with a response body.
///
/// **BUG THIS CATCHES**: Would catch a dropped connection on bad input, and
/// an id that is lost when the body still carries one.
#[tokio::test]
async fn given_malformed_body_when_posting_then_500_with_id_or_unknown() {
    // GIVEN
    let (server, adapter) = start_adapter().await;
    let url = rpc_url(&server);

    // WHEN
    let (status, anonymous) = post_raw(&url, "{not json").await;
    let (_, with_id) = post_raw(&url, &json!({"id": "r4", "method": 7}).to_string()).await;
    let (_, empty_id) = post_raw(&url, &json!({"id": "", "params": []}).to_string()).await;

    // THEN
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(anonymous.id, "unknown");
    assert_eq!(anonymous.error.expect("error").code, codes::INTERNAL_ERROR);
    assert_eq!(with_id.id, "r4");
    assert_eq!(with_id.error.expect("error").code, codes::INTERNAL_ERROR);
    assert_eq!(empty_id.id, "unknown");
    adapter.stop().await.expect("stop");
}

/// **VALUE**: Verifies a handler that never completes is answered 500 with
/// the request id.
///
/// **BUG THIS CATCHES**: Would catch a panicking handler taking the
/// connection down with no answer.
#[tokio::test]
async fn given_panicking_handler_when_posting_then_500_internal_error_with_request_id() {
    let server = start_bare_server().await;
    server.on_request(Arc::new(PanickingHandler));
    let body = json!({"id": "r5", "method": "platform.init", "params": []}).to_string();

    let (status, response) = post_raw(&rpc_url(&server), &body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.id, "r5");
    assert_eq!(response.error.expect("error").code, codes::INTERNAL_ERROR);
    server.stop().await.expect("stop");
}

#[tokio::test]
async fn given_other_route_or_verb_when_requesting_then_404_or_405() {
    let server = start_bare_server().await;
    let addr = server.local_addr().expect("bound");
    let client = reqwest::Client::new();

    let elsewhere = client
        .post(format!("http://{addr}/other"))
        .body("{}")
        .send()
        .await
        .expect("send");
    let wrong_verb = client.get(rpc_url(&server)).send().await.expect("send");

    assert_eq!(elsewhere.status(), StatusCode::NOT_FOUND);
    assert_eq!(wrong_verb.status(), StatusCode::METHOD_NOT_ALLOWED);
    server.stop().await.expect("stop");
}

/// **VALUE**: Verifies start/stop bookkeeping and that events are dropped
/// quietly.
///
/// **BUG THIS CATCHES**: Would catch a second bind on an already started
/// server, a stop that leaves the address reported, or `emit_event`
/// panicking on a binding with no push channel.
#[tokio::test]
async fn given_started_server_when_emitting_and_stopping_then_lifecycle_is_clean() {
    // GIVEN
    let server = start_bare_server().await;

    // WHEN
    server.emit_event(RpcEvent::new("cardInserted"));
    let second_start = server.start().await;
    server.stop().await.expect("stop");

    // THEN
    assert!(second_start.is_err());
    assert!(server.local_addr().is_none());
    assert!(server.rpc_url().is_none());
    server.stop().await.expect("second stop is a no-op");
}

#[tokio::test]
async fn given_client_transport_when_calling_directly_then_response_id_matches() {
    let (server, adapter) = start_adapter().await;
    let transport = HttpClientTransport::new(&rpc_url(&server)).expect("transport");

    let response = transport
        .call(RpcRequest::new("r6", "platform.isInitialized", vec![]))
        .await
        .expect("response");

    assert_eq!(response.id, "r6");
    assert_eq!(response.result, Some(json!(false)));
    adapter.stop().await.expect("stop");
}

/// **VALUE**: Verifies an adapter's dispatcher can be served on a second
/// transport with shared handles.
///
/// **BUG THIS CATCHES**: Would catch `handler()` handing out a fresh
/// dispatcher whose handle tables are empty.
#[tokio::test]
async fn given_adapter_handler_on_http_when_acquiring_then_handle_visible_in_process() {
    // GIVEN
    let fixture = Fixture::new();
    let server = start_bare_server().await;
    server.on_request(fixture.adapter.handler());
    let transport = HttpClientTransport::new(&rpc_url(&server)).expect("transport");

    // WHEN
    transport
        .call(RpcRequest::new("r7", "platform.init", vec![json!(false)]))
        .await
        .expect("init");
    let acquired = transport
        .call(RpcRequest::new(
            "r8",
            "platform.acquireDevice",
            vec![json!(DEFAULT_MOCK_DEVICE_ID)],
        ))
        .await
        .expect("acquire");

    // THEN
    let handle = acquired.result.expect("handle");
    assert_eq!(fixture.adapter.device_handles(), vec![handle.as_str().expect("string").to_string()]);
    let present = fixture.call_ok("device.isCardPresent", vec![handle]).await;
    assert_eq!(present, json!(true));
    server.stop().await.expect("stop");
}
