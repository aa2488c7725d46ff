use crate::error::TransportError;
use crate::transport::{ClientTransport, EventCallback, EventListeners, Subscription};

use common::ErrorLocation;
use models::{ClientFrame, RpcRequest, RpcResponse, ServerFrame};

use std::collections::HashMap;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::spawn as TokioSpawn;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const CONNECT_MAX_ELAPSED: Duration = Duration::from_secs(10);

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<RpcResponse>>>>;

/// Multiplexes concurrent calls over one authenticated socket.
///
/// Responses are matched to callers by request `id`, never by arrival order.
/// When the socket ends, every pending call fails with
/// [`TransportError::Closed`].
pub struct WsClientTransport {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: Pending,
    listeners: EventListeners,
    closed: Arc<AtomicBool>,
}

impl WsClientTransport {
    /// Connects with exponential backoff for up to ten seconds, then
    /// authenticates with `token`.
    pub async fn connect(url: &str, token: &str) -> Result<Self, TransportError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(CONNECT_MAX_ELAPSED),
            ..Default::default()
        };
        Self::connect_with_backoff(url, token, backoff).await
    }

    pub async fn connect_with_backoff(
        url: &str,
        token: &str,
        mut backoff: ExponentialBackoff,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(url)?;

        let mut ws_stream = loop {
            match connect_async(url.as_str()).await {
                Ok((stream, _)) => break stream,
                Err(e) => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("Connect to {url} failed ({e}), retrying after {duration:?}");
                        TokioSleep(duration).await;
                    }
                    None => {
                        return Err(TransportError::Connect {
                            message: format!("Could not connect to {url}: {e}"),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                },
            }
        };

        let auth = serde_json::to_string(&ClientFrame::Auth {
            token: token.to_string(),
        })?;
        ws_stream
            .send(Message::text(auth))
            .await
            .map_err(|e| TransportError::Send {
                message: format!("Failed to send auth handshake: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(text.as_str())? {
                ServerFrame::AuthResult { success: true, .. } => {
                    info!("Authenticated with RPC server at {url}");
                }
                ServerFrame::AuthResult { error, .. } => {
                    return Err(TransportError::Auth {
                        message: error.unwrap_or_else(|| String::from("Authentication rejected")),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                other => {
                    return Err(TransportError::Auth {
                        message: format!("Expected auth_result, got {other:?}"),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
            },
            Some(Ok(other)) => {
                return Err(TransportError::Auth {
                    message: format!("Expected text auth_result frame, got {other:?}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Some(Err(e)) => {
                return Err(TransportError::Read {
                    message: format!("Error reading auth result: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            None => {
                return Err(TransportError::Closed {
                    message: String::from("Server closed the connection during auth"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }

        let (mut write, mut read) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let listeners = EventListeners::new();
        let closed = Arc::new(AtomicBool::new(false));

        TokioSpawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if let Err(e) = write.send(message).await {
                    error!("WebSocket send failed: {e}");
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_listeners = listeners.clone();
        let reader_closed = Arc::clone(&closed);
        TokioSpawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(ServerFrame::Response(response)) => {
                                let waiter = reader_pending
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .remove(&response.id);
                                match waiter {
                                    Some(waiter) => {
                                        let _ = waiter.send(response);
                                    }
                                    None => warn!("Response for unknown request {}", response.id),
                                }
                            }
                            Ok(ServerFrame::Event(event)) => reader_listeners.dispatch(&event),
                            Ok(ServerFrame::AuthResult { .. }) => {
                                debug!("Ignoring late auth_result frame");
                            }
                            Err(e) => warn!("Undecodable frame from server: {e}"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket read failed: {e}");
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            // Dropping the senders wakes every waiter with a closed error.
            reader_pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            debug!("WebSocket reader finished");
        });

        Ok(Self {
            outgoing,
            pending,
            listeners,
            closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[track_caller]
    fn closed_error(message: &str) -> TransportError {
        TransportError::Closed {
            message: message.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

#[async_trait]
impl ClientTransport for WsClientTransport {
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        if self.is_closed() {
            return Err(Self::closed_error("WebSocket connection is closed"));
        }

        let id = request.id.clone();
        let frame = serde_json::to_string(&ClientFrame::Request(request))?;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), tx);

        // The reader may have finished between the check above and the insert.
        if self.is_closed() || self.outgoing.send(Message::text(frame)).is_err() {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            return Err(Self::closed_error("WebSocket writer has stopped"));
        }

        rx.await.map_err(|_| {
            Self::closed_error(&format!("Connection closed before response to {id}"))
        })
    }

    fn on_event(&self, callback: EventCallback) -> Option<Subscription> {
        Some(self.listeners.subscribe(callback))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.outgoing.send(Message::Close(None));
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("WebSocket client closed");
        Ok(())
    }
}
