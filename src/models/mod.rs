use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::utils::now;

// Core data extracted from an inbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestData {
    pub method: String,
    pub path: String,

    // Client information
    pub client_ip: std::net::IpAddr,
    pub client_port: u16,

    pub timestamp: DateTime<Utc>,

    pub content_type: Option<String>,
    pub content_length: u64,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestData {
    pub fn new(method: String, path: String, remote_addr: SocketAddr) -> Self {
        Self {
            method,
            path,
            client_ip: remote_addr.ip(),
            client_port: remote_addr.port(),
            timestamp: now(),
            content_type: None,
            content_length: 0,
            origin: None,
            user_agent: None,
        }
    }
}

// What we sent back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    pub status_code: u16,
    pub response_time_ms: u64,
    pub body_size: u64,
}

/// Failure class of one relayed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    Success,
    UpstreamError,
    TransportFailure,
    TransportUnavailable,
    /// Rejected locally before forwarding (oversized or unreadable body)
    Rejected,
    /// Served without touching upstream (health, not found)
    Local,
}

// Complete request-response pair for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayLog {
    pub request: RequestData,
    pub response: ResponseData,
    pub outcome: OutcomeClass,
    pub error: Option<String>,
}
