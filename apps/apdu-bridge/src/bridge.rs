//! Wires a configured platform to the WebSocket server and, when
//! configured, to an HTTP endpoint sharing the same handles.

use crate::error::BridgeError;

use apdu_rpc::config::PlatformKind;
use apdu_rpc::transport::ServerTransport;
use apdu_rpc::{
    BridgeConfig, HttpServerConfig, HttpServerTransport, MockPlatform, RpcHandler,
    SmartCardPlatformAdapter, UnavailableHandler, WsServerConfig, WsServerTransport,
};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;

use log::{info, warn};

const PCSC_UNAVAILABLE: &str = "PC/SC readers are not supported by this build of the bridge";

enum Service {
    Adapter(SmartCardPlatformAdapter),
    /// Every request is answered with `NOT_AVAILABLE`.
    Unavailable,
}

/// A WebSocket server exposing the platform selected in [`BridgeConfig`].
pub struct Bridge {
    transport: Arc<WsServerTransport>,
    http: Option<Arc<HttpServerTransport>>,
    service: Service,
}

impl Bridge {
    pub fn from_config(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut ws_config =
            WsServerConfig::new(config.server.listen).with_allow_remote(config.server.allow_remote);
        match config.auth_token() {
            Some(token) => ws_config = ws_config.with_auth_token(token),
            None => warn!("No auth token configured, any client token is accepted"),
        }
        let transport = Arc::new(WsServerTransport::new(ws_config));

        let service = match config.platform.kind {
            PlatformKind::Mock => {
                let platform = MockPlatform::new(config.platform.mock_devices.iter())
                    .map_err(|e| BridgeError::Bridge {
                        message: format!("Failed to build mock platform: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    })?;
                info!(
                    "Serving mock platform with {} reader(s)",
                    config.platform.mock_devices.len()
                );
                Service::Adapter(SmartCardPlatformAdapter::new(
                    Arc::new(platform),
                    Arc::clone(&transport) as Arc<dyn ServerTransport>,
                ))
            }
            PlatformKind::Pcsc => {
                warn!("{PCSC_UNAVAILABLE}");
                transport.on_request(Arc::new(UnavailableHandler::new(PCSC_UNAVAILABLE)));
                Service::Unavailable
            }
        };

        let http = config.server.http_listen.map(|listen| {
            let http = Arc::new(HttpServerTransport::new(
                HttpServerConfig::new(listen).with_allow_remote(config.server.allow_remote),
            ));
            let handler: Arc<dyn RpcHandler> = match &service {
                Service::Adapter(adapter) => adapter.handler(),
                Service::Unavailable => Arc::new(UnavailableHandler::new(PCSC_UNAVAILABLE)),
            };
            http.on_request(handler);
            warn!("HTTP endpoint on {listen} has no auth handshake");
            http
        });

        Ok(Self {
            transport,
            http,
            service,
        })
    }

    pub async fn start(&self) -> Result<(), BridgeError> {
        match &self.service {
            Service::Adapter(adapter) => adapter.start().await?,
            Service::Unavailable => self.transport.start().await?,
        }
        if let Some(http) = &self.http
            && let Err(e) = http.start().await
        {
            self.stop_websocket().await?;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), BridgeError> {
        if let Some(http) = &self.http {
            http.stop().await?;
        }
        self.stop_websocket().await
    }

    async fn stop_websocket(&self) -> Result<(), BridgeError> {
        match &self.service {
            Service::Adapter(adapter) => adapter.stop().await?,
            Service::Unavailable => self.transport.stop().await?,
        }
        Ok(())
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn ws_url(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("ws://{addr}"))
    }

    /// `POST` endpoint once started, when HTTP is configured.
    pub fn http_url(&self) -> Option<String> {
        self.http.as_ref().and_then(|http| http.rpc_url())
    }
}
