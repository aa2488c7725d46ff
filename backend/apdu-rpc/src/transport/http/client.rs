use crate::error::TransportError;
use crate::transport::ClientTransport;
use crate::transport::http::DEFAULT_RPC_PATH;

use common::{ErrorLocation, HttpStatusCode};
use models::{RpcRequest, RpcResponse};

use std::panic::Location;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use url::Url;

#[derive(Clone)]
pub struct HttpClientTransport {
    endpoint: Url,
    client: Client,
}

impl HttpClientTransport {
    /// `endpoint` is the full URL requests are posted to.
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        Self::build(endpoint, None)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        Self::build(endpoint, Some(timeout))
    }

    /// `<base_url>/rpc`
    pub fn for_base_url(base_url: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(base_url)?.join(DEFAULT_RPC_PATH)?;
        Self::build(endpoint.as_str(), None)
    }

    fn build(endpoint: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ClientTransport for HttpClientTransport {
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        debug!("POST {} {} ({})", self.endpoint, request.method, request.id);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = HttpStatusCode(response.status().as_u16());
        let body = response.text().await?;

        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(decoded) => {
                if status.is_unavailable() {
                    warn!("RPC endpoint reports no smart-card platform ({status})");
                } else if !status.is_success() {
                    debug!("{status} carried an RPC body for {}", request.id);
                }
                Ok(decoded)
            }
            Err(e) => {
                warn!("{status} with undecodable body for {}: {e}", request.id);
                Err(TransportError::Http {
                    message: format!("{status} - {e}: {body}"),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }
}
