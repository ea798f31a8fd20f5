//! Chat Relay - keeps an upstream completions credential off the client
//!
//! This library provides a small HTTP relay: `POST /api/chat` bodies are
//! forwarded to a chat-completions API with a server-held bearer credential,
//! and the upstream status and body are relayed back unchanged.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod relay;
pub mod utils;

// Re-export commonly used items
pub use config::settings::RelayConfig;
pub use error::{Error, Result};
pub use logging::init_logger_with_config;
pub use models::{OutcomeClass, RelayLog, RequestData, ResponseData};
pub use relay::{ChatForwarder, RelayServer};

/// Runtime utilities for creating single-threaded vs multi-threaded Tokio runtimes
pub mod runtime {
    use crate::config::settings::{RuntimeConfig, RuntimeMode};
    use anyhow::{Context, Result};
    use tokio::runtime::{Builder, Runtime};
    use tracing::info;

    /// Create a Tokio runtime based on the configuration
    pub fn create_runtime(config: &RuntimeConfig) -> Result<Runtime> {
        match config.mode {
            RuntimeMode::SingleThreaded => {
                info!("🧵 Initializing single-threaded runtime");
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create single-threaded runtime")
            }
            RuntimeMode::MultiThreaded => {
                let mut builder = Builder::new_multi_thread();
                builder.enable_all();

                match config.worker_threads {
                    Some(threads) if threads > 0 => {
                        info!("🧵 Initializing multi-threaded runtime with {} worker threads", threads);
                        builder.worker_threads(threads);
                    }
                    _ => {
                        info!("🧵 Initializing multi-threaded runtime with auto-detected CPU cores");
                    }
                }

                builder
                    .build()
                    .context("Failed to create multi-threaded runtime")
            }
        }
    }

    /// Execute an async function with the configured runtime
    pub fn run_with_runtime<F, T>(config: &RuntimeConfig, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let runtime = create_runtime(config)?;
        runtime.block_on(future)
    }

}
