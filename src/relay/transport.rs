//! Upstream transport
//!
//! The outbound call sits behind [`UpstreamTransport`] so the forwarding
//! handler can be driven without a network. [`ReqwestTransport`] is the
//! production implementation: one pooled client, the fixed endpoint and the
//! injected credential.

use async_trait::async_trait;
use bytes::Bytes;
use hyper::StatusCode;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ApiKey, RelayConfig};
use crate::utils::{display_target, is_https, parse_url};

/// A completed upstream exchange
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Reasons no usable upstream reply was obtained
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("No upstream transport is available")]
    TransportUnavailable,

    #[error("Invalid upstream credential: {0}")]
    Credential(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),

    #[error("{0}")]
    Transport(String),

    #[error("Upstream returned a non-JSON body: {0}")]
    InvalidUpstreamBody(String),
}

/// Outbound call mechanism used by the forwarding handler
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Issue exactly one POST carrying `body` and return whatever came back
    async fn send(&self, body: Bytes) -> Result<UpstreamReply, ForwardError>;

    /// Where requests go, for log lines
    fn target(&self) -> String;
}

/// reqwest-backed transport to the chat-completions endpoint
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<ApiKey>,
}

impl ReqwestTransport {
    pub fn from_config(config: &RelayConfig) -> crate::Result<Self> {
        let endpoint = parse_url(&config.upstream.url)?;

        info!("🚀 Initializing upstream client");
        info!("   Endpoint: {}", display_target(&endpoint));
        info!("   TLS: {}", is_https(&endpoint));
        info!("   Max idle connections per host: {}", config.upstream.max_idle_per_host);

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.upstream.max_idle_per_host)
            .user_agent(format!("chat-relay/{}", env!("CARGO_PKG_VERSION")));

        if let Some(secs) = config.upstream.request_timeout_secs {
            info!("   Request timeout: {}s", secs);
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.upstream.connect_timeout_secs {
            info!("   Connect timeout: {}s", secs);
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        if !config.upstream.use_system_proxy {
            info!("   System proxy: disabled");
            builder = builder.no_proxy();
        }

        if config.api_key.is_none() {
            warn!("⚠️  API_KEY is not set; upstream will reject relayed requests");
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    fn authorization(&self) -> Result<HeaderValue, ForwardError> {
        let token = self.api_key.as_ref().map(ApiKey::expose).unwrap_or_default();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ForwardError::Credential(e.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn send(&self, body: Bytes) -> Result<UpstreamReply, ForwardError> {
        let authorization = self.authorization()?;

        debug!("🔄 POST {} ({} bytes)", display_target(&self.endpoint), body.len());

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| ForwardError::Transport(error_chain(&e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Transport(error_chain(&e)))?;

        debug!("📨 Upstream answered {} ({} bytes)", status, body.len());

        Ok(UpstreamReply { status, body })
    }

    fn target(&self) -> String {
        display_target(&self.endpoint)
    }
}

/// Render an error with its sources, outermost first
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !description.contains(&cause_text) {
            description.push_str(": ");
            description.push_str(&cause_text);
        }
        source = cause.source();
    }
    description
}
