//! Relay server configuration settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

/// Chat-completions endpoint every relayed request is sent to
pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default listening address for the relay
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "relay.yml";

/// Environment variable holding the upstream credential
pub const API_KEY_ENV: &str = "API_KEY";

/// Upstream bearer credential.
///
/// Read once at startup and never mutated. `Debug` and `Display` never print
/// the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building the `Authorization` header only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Main configuration for the relay server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Server listening address
    pub listen_addr: SocketAddr,

    /// Log level configuration
    pub log_level: String,

    /// Upstream completions API configuration
    pub upstream: UpstreamConfig,

    /// Maximum inbound request body size in bytes
    pub max_body_size: usize,

    /// Replace transport failure details with a generic message in responses
    pub redact_transport_details: bool,

    /// Cross-origin policy
    pub cors: CorsConfig,

    /// Runtime configuration
    pub runtime: RuntimeConfig,

    /// Upstream credential, only ever sourced from the environment
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

/// Upstream completions API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream endpoint URL
    pub url: String,

    /// Whole-request timeout in seconds; `None` keeps the client default
    pub request_timeout_secs: Option<u64>,

    /// Connection timeout in seconds; `None` keeps the client default
    pub connect_timeout_secs: Option<u64>,

    /// Maximum idle pooled connections to the upstream host
    pub max_idle_per_host: usize,

    /// Honor HTTP(S)_PROXY / NO_PROXY from the environment
    pub use_system_proxy: bool,
}

/// Cross-origin policy applied to every response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin
    pub allowed_origins: Vec<String>,

    /// Methods allowed cross-origin
    pub allowed_methods: Vec<String>,
}

/// Tokio runtime flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    SingleThreaded,
    MultiThreaded,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime mode: "single_threaded" or "multi_threaded"
    pub mode: RuntimeMode,

    /// Number of worker threads for multi-threaded mode (0 or unset = auto-detect CPU cores)
    pub worker_threads: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.parse().expect("default listen address is valid"),
            log_level: "info".to_string(),
            upstream: UpstreamConfig::default(),
            max_body_size: 1024 * 1024, // 1MB
            redact_transport_details: false,
            cors: CorsConfig::default(),
            runtime: RuntimeConfig::default(),
            api_key: None,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            request_timeout_secs: None,
            connect_timeout_secs: None,
            max_idle_per_host: 50,
            use_system_proxy: true,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["POST".to_string(), "GET".to_string()],
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::MultiThreaded,
            worker_threads: None, // Auto-detect CPU cores
        }
    }
}

impl RelayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Parse configuration from YAML text; missing fields keep their defaults
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: RelayConfig = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Load configuration: defaults, then the YAML file, then environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `relay.yml` in the working
    /// directory is used when present.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_yaml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// A variable that is set but does not parse is an error naming the variable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Absence is not an error: upstream will reject the request instead
        if let Some(key) = lookup(API_KEY_ENV) {
            self.api_key = Some(ApiKey::new(key));
        }

        if let Some(addr) = lookup("RELAY_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid RELAY_LISTEN_ADDR '{}'", addr))?;
        }

        if let Some(url) = lookup("RELAY_UPSTREAM_URL") {
            self.upstream.url = url;
        }

        if let Some(max_size) = lookup("RELAY_MAX_BODY_SIZE") {
            self.max_body_size = max_size
                .parse::<usize>()
                .with_context(|| format!("Invalid RELAY_MAX_BODY_SIZE '{}'", max_size))?;
        }

        if let Some(timeout) = lookup("RELAY_REQUEST_TIMEOUT_SECS") {
            let secs = timeout
                .parse::<u64>()
                .with_context(|| format!("Invalid RELAY_REQUEST_TIMEOUT_SECS '{}'", timeout))?;
            self.upstream.request_timeout_secs = Some(secs);
        }

        // Kept verbatim: may be a full filter such as `info,hyper=warn`
        if let Some(log_level) = lookup("RUST_LOG") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Check the settings that would otherwise only fail on the first request
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.upstream.url)
            .with_context(|| format!("Invalid upstream url '{}'", self.upstream.url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("Upstream url must be http or https, got '{}'", url.scheme());
        }

        if self.max_body_size == 0 {
            anyhow::bail!("max_body_size must be greater than zero");
        }

        for method in &self.cors.allowed_methods {
            hyper::Method::from_bytes(method.as_bytes())
                .with_context(|| format!("Invalid CORS method '{}'", method))?;
        }

        Ok(())
    }
}
