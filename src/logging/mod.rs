use crate::models::RelayLog;
use crate::utils::format_timestamp;
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, LevelFilter};
use std::sync::Once;
use tracing::level_filters::LevelFilter as TracingLevelFilter;
use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Install the pretty subscriber and the `log` bridge; only the first call has any effect
fn install(filter: EnvFilter, log_level: LevelFilter) {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_level(true)
            .with_ansi(true)
            .pretty()
            .finish();

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Warning: Failed to install tracing subscriber: {}", e);
        }

        // log records (the log_* helpers) are re-emitted as tracing events
        if let Err(e) = LogTracer::init_with_filter(log_level) {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }
    });
}

/// Initialize the global logger from the configured level.
///
/// `log_level` is either a bare level (`debug`) or a full `RUST_LOG`-style
/// directive list (`info,hyper=warn`, `chat_relay=trace`).
pub fn init_logger_with_config(log_level: &str) {
    let filter = log_filter(log_level);
    let bridged = filter
        .max_level_hint()
        .map(log_level_for)
        .unwrap_or(LevelFilter::Trace);
    install(filter, bridged);
}

/// Build the event filter for a configured level, falling back to info when it does not parse
pub fn log_filter(log_level: &str) -> EnvFilter {
    let log_level = log_level.trim();
    if let Ok(level) = log_level.parse::<Level>() {
        return EnvFilter::default().add_directive(TracingLevelFilter::from_level(level).into());
    }

    EnvFilter::try_new(log_level).unwrap_or_else(|e| {
        eprintln!("Warning: Invalid log filter '{}' ({}), using info", log_level, e);
        EnvFilter::new("info")
    })
}

fn log_level_for(level: TracingLevelFilter) -> LevelFilter {
    match level.into_level() {
        None => LevelFilter::Off,
        Some(Level::ERROR) => LevelFilter::Error,
        Some(Level::WARN) => LevelFilter::Warn,
        Some(Level::INFO) => LevelFilter::Info,
        Some(Level::DEBUG) => LevelFilter::Debug,
        Some(Level::TRACE) => LevelFilter::Trace,
    }
}

/// Short process tag used as a prefix on per-request log lines
pub fn process_info() -> String {
    format!("PID {}", std::process::id())
}

/// Log a relayed request using log (bridged to tracing via tracing-log)
pub fn log_transaction(log_entry: &RelayLog) -> Result<()> {
    let timestamp = format_timestamp(Utc::now());
    let log_message = serde_json::to_string_pretty(log_entry)?;

    // Debug level so it only appears in debug mode
    debug!("[{}] TRANSACTION:\n{}", timestamp, log_message);

    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Convenience macro for logging relay transactions
#[macro_export]
macro_rules! log_relay_transaction {
    ($log_entry:expr) => {
        if let Err(e) = $crate::logging::log_transaction($log_entry) {
            eprintln!("Failed to log transaction: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_filter() {
        assert_eq!(
            log_filter("debug").max_level_hint(),
            Some(TracingLevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter(" WARN ").max_level_hint(),
            Some(TracingLevelFilter::WARN)
        );
    }

    #[test]
    fn test_directive_filter_keeps_target_level() {
        assert_eq!(
            log_filter("chat_relay=debug").max_level_hint(),
            Some(TracingLevelFilter::DEBUG)
        );
        assert_eq!(
            log_filter("info,hyper=warn").max_level_hint(),
            Some(TracingLevelFilter::INFO)
        );
    }

    #[test]
    fn test_bridged_log_level_mapping() {
        assert_eq!(log_level_for(TracingLevelFilter::ERROR), LevelFilter::Error);
        assert_eq!(log_level_for(TracingLevelFilter::TRACE), LevelFilter::Trace);
        assert_eq!(log_level_for(TracingLevelFilter::OFF), LevelFilter::Off);
    }
}
