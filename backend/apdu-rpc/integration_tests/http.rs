use apdu_rpc::error::TransportError;
use apdu_rpc::{ClientTransport, HttpClientTransport, PlatformProxy, SmartCardPlatform};

use models::{RpcError, RpcRequest, RpcResponse, codes};

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn transport_for(server: &MockServer) -> HttpClientTransport {
    HttpClientTransport::for_base_url(&format!("{}/", server.uri())).expect("transport")
}

/// **VALUE**: Verifies an error body on HTTP 200 is decoded as the response.
///
/// **WHY THIS MATTERS**: The server answers 200 for every dispatched
/// request, including failures. The `error` field is authoritative.
///
/// **BUG THIS CATCHES**: Would catch treating 200 as success without looking
/// at the body.
#[tokio::test]
async fn given_200_with_error_body_when_calling_then_error_response_is_returned() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"id": "r1", "method": "platform.init"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(RpcResponse::failure(
            "r1",
            RpcError::new(codes::ALREADY_INITIALIZED, "Platform already initialized"),
        )))
        .mount(&server)
        .await;
    let transport = transport_for(&server).await;

    // WHEN
    let response = transport
        .call(RpcRequest::new("r1", "platform.init", vec![json!(false)]))
        .await
        .expect("decoded");

    // THEN
    assert_eq!(response.id, "r1");
    assert_eq!(
        response.error.expect("error").code,
        codes::ALREADY_INITIALIZED
    );
}

#[tokio::test]
async fn given_503_not_available_when_calling_through_proxy_then_code_reaches_caller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(move |request: &wiremock::Request| {
            let rpc: RpcRequest = serde_json::from_slice(&request.body).expect("rpc request");
            ResponseTemplate::new(503).set_body_json(RpcResponse::failure(
                rpc.id,
                RpcError::new(codes::NOT_AVAILABLE, "No reader subsystem"),
            ))
        })
        .mount(&server)
        .await;
    let platform = PlatformProxy::new(Arc::new(transport_for(&server).await));

    let err = platform.init(false).await.expect_err("unavailable");

    assert_eq!(err.code(), codes::NOT_AVAILABLE);
    assert_eq!(err.message(), "No reader subsystem");
}

/// **VALUE**: Verifies a body that is not an RpcResponse is a transport
/// error quoting the status.
///
/// **WHY THIS MATTERS**: A proxy in front of the bridge may answer with an
/// HTML error page. That must surface as a transport failure, not a panic or
/// an empty success.
///
/// **BUG THIS CATCHES**: Would catch decoding garbage into a default
/// response.
#[tokio::test]
async fn given_html_body_when_calling_then_http_transport_error_names_status() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;
    let transport = transport_for(&server).await;

    // WHEN
    let err = transport
        .call(RpcRequest::new("r1", "platform.isInitialized", Vec::new()))
        .await
        .expect_err("undecodable");

    // THEN
    match err {
        TransportError::Http { message, .. } => assert!(message.contains("502"), "{message}"),
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn given_http_transport_when_subscribing_then_no_push_channel() {
    let transport = HttpClientTransport::new("http://127.0.0.1:9/rpc").expect("transport");

    let subscription = transport.on_event(Arc::new(|_| {}));

    assert!(subscription.is_none());
    assert_eq!(transport.endpoint().path(), "/rpc");
}
