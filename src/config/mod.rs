//! Configuration management

pub mod settings;

pub use settings::{ApiKey, CorsConfig, RelayConfig, RuntimeConfig, RuntimeMode, UpstreamConfig};
