//! Server management CLI commands

use crate::config::settings::RelayConfig;
use crate::relay::server::RelayServer;
use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Relay listening address (overrides config and RELAY_LISTEN_ADDR)
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Upstream chat-completions URL
    #[arg(long)]
    pub upstream_url: Option<String>,

    /// Maximum inbound body size in bytes
    #[arg(long)]
    pub max_body_size: Option<usize>,

    /// Upstream request timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Hide transport failure details from callers
    #[arg(long)]
    pub redact_details: bool,
}

impl ServeArgs {
    /// Apply CLI arguments on top of a loaded RelayConfig
    pub fn apply_to(&self, config: &mut RelayConfig) -> Result<()> {
        debug!("Applying CLI arguments to RelayConfig");

        if let Some(listen_addr) = &self.listen_addr {
            let addr: SocketAddr = listen_addr
                .parse()
                .with_context(|| format!("Invalid listen address '{}'", listen_addr))?;
            config.listen_addr = addr;
        }

        if let Some(url) = &self.upstream_url {
            config.upstream.url = url.clone();
        }

        if let Some(max_body_size) = self.max_body_size {
            config.max_body_size = max_body_size;
        }

        if let Some(timeout) = self.request_timeout {
            config.upstream.request_timeout_secs = Some(timeout);
        }

        if self.redact_details {
            config.redact_transport_details = true;
        }

        config.validate()
    }

    /// Start the relay server with the final configuration
    pub async fn start_server(config: RelayConfig) -> Result<()> {
        info!("📋 Relay Configuration:");
        for line in describe_config(&config) {
            info!("   {}", line);
        }

        let server = RelayServer::with_config(config)?;
        server.start().await?;
        Ok(())
    }
}

/// Human-readable summary of the effective configuration; the credential is never printed
pub fn describe_config(config: &RelayConfig) -> Vec<String> {
    vec![
        format!("Listen address: {}", config.listen_addr),
        format!("Upstream: {}", config.upstream.url),
        format!(
            "Credential: {}",
            if config.api_key.is_some() { "set" } else { "NOT SET" }
        ),
        format!(
            "Request timeout: {}",
            config
                .upstream
                .request_timeout_secs
                .map(|secs| format!("{}s", secs))
                .unwrap_or_else(|| "client default".to_string())
        ),
        format!("Max body size: {} bytes", config.max_body_size),
        format!("Redact transport details: {}", config.redact_transport_details),
        format!(
            "CORS: origins {:?}, methods {:?}",
            config.cors.allowed_origins, config.cors.allowed_methods
        ),
        format!("Runtime: {:?}", config.runtime.mode),
        format!("Log level: {}", config.log_level),
    ]
}
