use crate::error::TransportError;
use crate::transport::http::DEFAULT_RPC_PATH;
use crate::transport::{RpcHandler, ServerTransport};

use common::{ErrorLocation, HttpStatusCode};
use models::{RpcError, RpcEvent, RpcRequest, RpcResponse, codes};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const HEADER_END: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 4096;
const MAX_BODY_BYTES: usize = 1024 * 1024;
const UNKNOWN_REQUEST_ID: &str = "unknown";
const NOT_AVAILABLE_MESSAGE: &str = "Smart card platform not available";

type SharedHandler = Arc<RwLock<Option<Arc<dyn RpcHandler>>>>;

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub listen: SocketAddr,
    /// Accept peers outside loopback.
    pub allow_remote: bool,
    /// Absolute path of the single `POST` endpoint.
    pub path: String,
}

impl HttpServerConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            allow_remote: false,
            path: format!("/{DEFAULT_RPC_PATH}"),
        }
    }

    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// One request per connection, answered with `Connection: close`.
///
/// A request that reaches no handler (none registered, or the registered one
/// reports `NOT_AVAILABLE`) is answered `503`. Anything that fails before or
/// outside dispatch is answered `500` with `INTERNAL_ERROR`, echoing the
/// request `id` when the body has one and `"unknown"` otherwise.
pub struct HttpServerTransport {
    config: HttpServerConfig,
    handler: SharedHandler,
    running: Mutex<Option<Running>>,
}

impl HttpServerTransport {
    pub fn new(config: HttpServerConfig) -> Self {
        Self {
            config,
            handler: Arc::new(RwLock::new(None)),
            running: Mutex::new(None),
        }
    }

    /// Bound address once started. With port `0` this is where the OS put us.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.local_addr)
    }

    /// Full endpoint URL once started.
    pub fn rpc_url(&self) -> Option<String> {
        self.local_addr()
            .map(|addr| format!("http://{addr}{}", self.config.path))
    }
}

#[async_trait]
impl ServerTransport for HttpServerTransport {
    fn on_request(&self, handler: Arc<dyn RpcHandler>) {
        *self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// HTTP has no push channel; events are dropped.
    fn emit_event(&self, event: RpcEvent) {
        debug!("Dropping {} event, HTTP cannot push", event.event);
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.local_addr().is_some() {
            return Err(TransportError::Connect {
                message: String::from("HTTP server already started"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let listener = TcpListener::bind(self.config.listen).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let context = ConnectionContext {
            handler: Arc::clone(&self.handler),
            allow_remote: self.config.allow_remote,
            path: Arc::from(self.config.path.as_str()),
        };
        let accept_task = TokioSpawn(accept_loop(listener, context, shutdown_rx));

        info!(
            "RPC HTTP server listening on http://{local_addr}{}",
            self.config.path
        );
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) = Some(Running {
            local_addr,
            shutdown,
            accept_task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return Ok(());
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.accept_task.await {
            warn!("Accept loop ended abnormally: {e}");
        }
        info!("RPC HTTP server on {} stopped", running.local_addr);
        Ok(())
    }
}

#[derive(Clone)]
struct ConnectionContext {
    handler: SharedHandler,
    allow_remote: bool,
    path: Arc<str>,
}

impl ConnectionContext {
    fn handler(&self) -> Option<Arc<dyn RpcHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: ConnectionContext,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let context = context.clone();
                    TokioSpawn(async move {
                        if let Err(e) = handle_connection(stream, addr, context).await {
                            error!("HTTP connection {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => error!("Accept failed: {e}"),
            },
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    context: ConnectionContext,
) -> Result<(), TransportError> {
    if !context.allow_remote && !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {addr}");
        return Ok(());
    }

    let buffer = read_request(&mut stream).await?;
    if buffer.is_empty() {
        debug!("Client {addr} closed without a request");
        return Ok(());
    }

    let reply = respond(&buffer, &context).await;
    if !reply.status.is_success() {
        debug!("Answering {addr} with {}", reply.status);
    }
    stream.write_all(&reply.to_bytes()).await?;
    let _ = stream.shutdown().await;
    Ok(())
}

/// Reads until the headers and `Content-Length` bytes of body are in, the
/// peer stops sending, or the body limit is passed.
async fn read_request(stream: &mut TcpStream) -> Result<Vec<u8>, TransportError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        if let Some(header_end) = find_header_end(&buffer) {
            match parse_content_length(&buffer[..header_end]) {
                Some(length) if length > MAX_BODY_BYTES => break,
                Some(length) if buffer.len() >= header_end + HEADER_END.len() + length => break,
                Some(_) => {}
                None => break,
            }
        } else if buffer.len() > MAX_BODY_BYTES {
            break;
        }
    }
    Ok(buffer)
}

struct HttpReply {
    status: HttpStatusCode,
    body: Vec<u8>,
}

impl HttpReply {
    fn json(status: HttpStatusCode, response: &RpcResponse) -> Self {
        match serde_json::to_vec(response) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!("Failed to encode response {}: {e}", response.id);
                Self {
                    status: HttpStatusCode::INTERNAL_SERVER_ERROR,
                    body: Vec::new(),
                }
            }
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 128);
        out.extend_from_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status.0, self.status.reason()).as_bytes(),
        );
        out.extend_from_slice(b"Content-Type: application/json\r\n");
        out.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        out.extend_from_slice(b"Connection: close\r\n\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

async fn respond(request: &[u8], context: &ConnectionContext) -> HttpReply {
    let Some(header_end) = find_header_end(request) else {
        return fault(UNKNOWN_REQUEST_ID, "Incomplete request headers");
    };
    let headers = &request[..header_end];
    let Some((method, path)) = parse_request_line(headers) else {
        return fault(UNKNOWN_REQUEST_ID, "Invalid request line");
    };
    let path_only = path.split_once('?').map_or(path.as_str(), |(p, _)| p);

    if path_only != &*context.path {
        return HttpReply::json(
            HttpStatusCode::NOT_FOUND,
            &RpcResponse::failure(
                UNKNOWN_REQUEST_ID,
                RpcError::new(codes::INTERNAL_ERROR, format!("No route for {method} {path_only}")),
            ),
        );
    }
    if method != "POST" {
        return HttpReply::json(
            HttpStatusCode::METHOD_NOT_ALLOWED,
            &RpcResponse::failure(
                UNKNOWN_REQUEST_ID,
                RpcError::new(codes::INTERNAL_ERROR, format!("{method} not allowed, use POST")),
            ),
        );
    }

    let body_start = header_end + HEADER_END.len();
    let Some(length) = parse_content_length(headers) else {
        return fault(UNKNOWN_REQUEST_ID, "Missing Content-Length");
    };
    if length > MAX_BODY_BYTES {
        return fault(
            UNKNOWN_REQUEST_ID,
            &format!("Body of {length} bytes exceeds {MAX_BODY_BYTES}"),
        );
    }
    let Some(body) = request.get(body_start..body_start + length) else {
        return fault(UNKNOWN_REQUEST_ID, "Request body incomplete");
    };

    let rpc_request = match serde_json::from_slice::<RpcRequest>(body) {
        Ok(rpc_request) => rpc_request,
        Err(e) => {
            warn!("Undecodable RPC body: {e}");
            return fault(&request_id_of(body), &format!("Invalid request: {e}"));
        }
    };

    let Some(handler) = context.handler() else {
        return HttpReply::json(
            HttpStatusCode::SERVICE_UNAVAILABLE,
            &RpcResponse::failure(
                rpc_request.id,
                RpcError::new(codes::NOT_AVAILABLE, NOT_AVAILABLE_MESSAGE),
            ),
        );
    };

    let id = rpc_request.id.clone();
    let response = match TokioSpawn(async move { handler.handle(rpc_request).await }).await {
        Ok(response) => response,
        Err(e) => {
            error!("Handler for {id} did not complete: {e}");
            return fault(&id, &format!("Handler failed: {e}"));
        }
    };

    let unavailable = response
        .error
        .as_ref()
        .is_some_and(|e| e.code == codes::NOT_AVAILABLE);
    let status = if unavailable {
        HttpStatusCode::SERVICE_UNAVAILABLE
    } else {
        HttpStatusCode::OK
    };
    HttpReply::json(status, &response)
}

fn fault(id: &str, message: &str) -> HttpReply {
    HttpReply::json(
        HttpStatusCode::INTERNAL_SERVER_ERROR,
        &RpcResponse::failure(id, RpcError::new(codes::INTERNAL_ERROR, message)),
    )
}

/// The `id` of a body that failed to decode as a request, when there is one.
fn request_id_of(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("id")?.as_str().map(str::to_string))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| UNKNOWN_REQUEST_ID.to_string())
}

fn find_header_end(request: &[u8]) -> Option<usize> {
    request
        .windows(HEADER_END.len())
        .position(|window| window == HEADER_END)
}

fn parse_content_length(headers: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(headers).lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

fn parse_request_line(headers: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(headers);
    let mut parts = text.lines().next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    Some((method, path))
}
