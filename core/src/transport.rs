//! Moving an encoded request over the network.
//!
//! # Design
//! `Transport` is the seam between the pure pipeline and real I/O: it takes
//! one `HttpRequest` and returns one fully buffered `HttpResponse`, or a
//! `GatewayError::Transport` when no answer came back. Non-2xx answers are
//! still answers and are returned as data. Nothing here retries.

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::{GatewayError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError>;
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Method::POST,
        }
    }
}

/// `reqwest`-backed transport. No timeout is set unless the supplied client
/// carries one.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, GatewayError> {
        let client = Client::builder().build().map_err(|e| GatewayError::Transport {
            kind: TransportErrorKind::Request,
            message: format!("failed to create HTTP client: {e}"),
        })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
        let mut builder = self.client.request(request.method.into(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}

/// Send `request` once and log the exchange.
pub async fn dispatch(transport: &dyn Transport, request: HttpRequest) -> Result<HttpResponse, GatewayError> {
    let method = request.method.as_str();
    let url = request.url.clone();
    tracing::debug!(
        method,
        %url,
        body_len = request.body.as_ref().map_or(0, Vec::len),
        "dispatching gateway request"
    );

    match transport.execute(request).await {
        Ok(response) => {
            if response.is_success() {
                tracing::debug!(%url, status = response.status, body_len = response.body.len(), "gateway responded");
            } else {
                tracing::warn!(%url, status = response.status, "gateway returned error status");
            }
            Ok(response)
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "gateway request failed");
            Err(e)
        }
    }
}
