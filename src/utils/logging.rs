//! Logging utility functions for relay operations

use crate::log_relay_transaction;
use crate::logging::process_info;
use crate::models::{OutcomeClass, RelayLog};
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Log incoming request information
pub fn log_incoming_request(method: &str, path: &str, remote_addr: &SocketAddr) {
    info!("{} 📥 {} {} from {}", process_info(), method, path, remote_addr.ip());
    debug!(
        "{} 🔍 REQUEST DETAILS:\n  Method: {}\n  Path: {}\n  Remote: {}",
        process_info(),
        method,
        path,
        remote_addr
    );
}

/// Log the completed request at a level matching its outcome, then the full transaction
pub fn log_relay_completion(log_entry: &RelayLog) {
    let request = &log_entry.request;
    let response = &log_entry.response;

    match log_entry.outcome {
        OutcomeClass::Success | OutcomeClass::Local => {
            info!(
                "✅ {} completed {} {} → {} ({}ms)",
                process_info(),
                request.method,
                request.path,
                response.status_code,
                response.response_time_ms
            );
        }
        OutcomeClass::UpstreamError => {
            warn!(
                "↩️  {} relayed upstream error {} {} → {} ({}ms)",
                process_info(),
                request.method,
                request.path,
                response.status_code,
                response.response_time_ms
            );
        }
        OutcomeClass::Rejected => {
            warn!(
                "🚫 {} rejected {} {} → {} ({}ms): {}",
                process_info(),
                request.method,
                request.path,
                response.status_code,
                response.response_time_ms,
                log_entry.error.as_deref().unwrap_or("-")
            );
        }
        OutcomeClass::TransportFailure | OutcomeClass::TransportUnavailable => {
            warn!(
                "❌ {} failed {} {} → {} ({}ms): {}",
                process_info(),
                request.method,
                request.path,
                response.status_code,
                response.response_time_ms,
                log_entry.error.as_deref().unwrap_or("-")
            );
        }
    }

    log_relay_transaction!(log_entry);
}
