use crate::error::TransportError;
use crate::transport::{RpcHandler, ServerTransport};

use common::{ErrorLocation, RedactedToken};
use models::{ClientFrame, RpcError, RpcEvent, RpcRequest, RpcResponse, ServerFrame, codes};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::spawn as TokioSpawn;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

const EVENT_BUFFER: usize = 64;
const UNKNOWN_REQUEST_ID: &str = "unknown";

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type SharedHandler = Arc<RwLock<Option<Arc<dyn RpcHandler>>>>;

#[derive(Debug, Clone)]
pub struct WsServerConfig {
    pub listen: SocketAddr,
    /// Accept peers outside loopback.
    pub allow_remote: bool,
    /// Required in the `auth` frame when set. Without it any token is accepted.
    pub auth_token: Option<Arc<RedactedToken>>,
}

impl WsServerConfig {
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            allow_remote: false,
            auth_token: None,
        }
    }

    pub fn with_allow_remote(mut self, allow: bool) -> Self {
        self.allow_remote = allow;
        self
    }

    pub fn with_auth_token(mut self, token: RedactedToken) -> Self {
        self.auth_token = Some(Arc::new(token));
        self
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

pub struct WsServerTransport {
    config: WsServerConfig,
    handler: SharedHandler,
    events: broadcast::Sender<RpcEvent>,
    running: Mutex<Option<Running>>,
}

impl WsServerTransport {
    pub fn new(config: WsServerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            config,
            handler: Arc::new(RwLock::new(None)),
            events,
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
}

#[async_trait]
impl ServerTransport for WsServerTransport {
    fn on_request(&self, handler: Arc<dyn RpcHandler>) {
        *self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn emit_event(&self, event: RpcEvent) {
        match self.events.send(event) {
            Ok(receivers) => debug!("Event delivered to {receivers} connection(s)"),
            Err(_) => debug!("Event dropped, no connections"),
        }
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.local_addr().is_some() {
            return Err(TransportError::Connect {
                message: String::from("WebSocket server already started"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let listener = TcpListener::bind(self.config.listen).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let context = ConnectionContext {
            handler: Arc::clone(&self.handler),
            auth_token: self.config.auth_token.clone(),
            allow_remote: self.config.allow_remote,
            events: self.events.clone(),
            shutdown: shutdown_rx.clone(),
        };
        let accept_task = TokioSpawn(accept_loop(listener, context, shutdown_rx));

        info!("RPC WebSocket server listening on {local_addr}");
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
        info!("RPC WebSocket server on {} stopped", running.local_addr);
        Ok(())
    }
}

#[derive(Clone)]
struct ConnectionContext {
    handler: SharedHandler,
    auth_token: Option<Arc<RedactedToken>>,
    allow_remote: bool,
    events: broadcast::Sender<RpcEvent>,
    shutdown: watch::Receiver<bool>,
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
                    debug!("Client connecting from {addr}");
                    let context = context.clone();
                    TokioSpawn(async move {
                        if let Err(e) = handle_connection(stream, addr, context).await {
                            error!("Connection {addr} failed: {e}");
                        }
                    });
                }
                Err(e) => error!("Accept failed: {e}"),
            },
        }
    }
}

/// Serves one connection: loopback check, auth handshake, then the request loop.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    mut context: ConnectionContext,
) -> Result<(), TransportError> {
    if !context.allow_remote && !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {addr}");
        return Ok(());
    }

    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| TransportError::Handshake {
            message: format!("WebSocket handshake with {addr} failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let (mut write, mut read) = ws_stream.split();

    // First frame must be the auth handshake.
    match read.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(ClientFrame::Auth { token }) => {
                let accepted = context
                    .auth_token
                    .as_ref()
                    .is_none_or(|expected| expected.matches(&token));
                if !accepted {
                    warn!("Client {addr} auth failed: invalid token");
                    send_frame(&mut write, &auth_result(false, Some("Invalid authentication token")))
                        .await?;
                    let _ = write.close().await;
                    return Ok(());
                }
                send_frame(&mut write, &auth_result(true, None)).await?;
                info!("Client {addr} authenticated");
            }
            _ => {
                warn!("Client {addr} auth failed: first frame was not an auth handshake");
                send_frame(&mut write, &auth_result(false, Some("Expected auth handshake")))
                    .await?;
                let _ = write.close().await;
                return Ok(());
            }
        },
        Some(Ok(_)) => {
            warn!("Client {addr} sent a non-text first frame");
            return Ok(());
        }
        Some(Err(e)) => {
            return Err(TransportError::Read {
                message: format!("Error reading first frame from {addr}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        None => {
            debug!("Client {addr} disconnected before auth");
            return Ok(());
        }
    }

    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ServerFrame>();

    let writer = TokioSpawn(async move {
        while let Some(frame) = outgoing_rx.recv().await {
            if let Err(e) = send_frame(&mut write, &frame).await {
                error!("Dropping connection {addr}: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    let mut events = context.events.subscribe();
    let event_outgoing = outgoing.clone();
    let forwarder = TokioSpawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event_outgoing.send(ServerFrame::Event(event)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client {addr} missed {skipped} event(s)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let result = loop {
        let message = tokio::select! {
            _ = context.shutdown.changed() => break Ok(()),
            message = read.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(ClientFrame::Request(request)) => {
                    let handler = context.handler();
                    let outgoing = outgoing.clone();
                    TokioSpawn(async move {
                        let response = dispatch(handler, request).await;
                        let _ = outgoing.send(ServerFrame::Response(response));
                    });
                }
                Ok(ClientFrame::Auth { .. }) => {
                    debug!("Client {addr} re-sent auth, ignoring");
                }
                Err(e) => {
                    warn!("Client {addr} sent an invalid frame: {e}");
                    let _ = outgoing.send(ServerFrame::Response(RpcResponse::failure(
                        UNKNOWN_REQUEST_ID,
                        RpcError::new(codes::INTERNAL_ERROR, format!("Invalid frame: {e}")),
                    )));
                }
            },
            Some(Ok(Message::Close(_))) | None => break Ok(()),
            Some(Ok(Message::Binary(_))) => warn!("Client {addr} sent a binary frame, ignoring"),
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                break Err(TransportError::Read {
                    message: format!("Error reading from {addr}: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    };

    forwarder.abort();
    drop(outgoing);
    let _ = writer.await;
    info!("Client {addr} disconnected");
    result
}

async fn dispatch(handler: Option<Arc<dyn RpcHandler>>, request: RpcRequest) -> RpcResponse {
    match handler {
        Some(handler) => handler.handle(request).await,
        None => RpcResponse::failure(
            request.id,
            RpcError::new(codes::NO_HANDLER, "No request handler registered"),
        ),
    }
}

fn auth_result(success: bool, error: Option<&str>) -> ServerFrame {
    ServerFrame::AuthResult {
        success,
        error: error.map(str::to_string),
    }
}

async fn send_frame(write: &mut WsSink, frame: &ServerFrame) -> Result<(), TransportError> {
    let json = serde_json::to_string(frame)?;
    write
        .send(Message::text(json))
        .await
        .map_err(|e| TransportError::Send {
            message: format!("Failed to send frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
