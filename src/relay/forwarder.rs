//! Forwarding handler
//!
//! One inbound payload becomes at most one upstream call, and every result of
//! that call maps onto exactly one [`RelayOutcome`]:
//!
//! - 2xx with a JSON body: relayed with status 200, body untouched
//! - any other status with a JSON body: relayed with the upstream status, body untouched
//! - no reply at all (or a reply that is not JSON): 500 with a fixed message and details

use bytes::Bytes;
use hyper::{Body, Response, StatusCode};
use serde::de::IgnoredAny;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::OutcomeClass;
use crate::relay::payload::InboundPayload;
use crate::relay::transport::{ForwardError, UpstreamTransport};
use crate::utils::{json_bytes_response, json_response};

/// Fixed message returned on every transport failure
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Internal server error while fetching chat completion.";

/// Details shown instead of the real cause when redaction is enabled
pub const REDACTED_DETAILS: &str = "Upstream request failed";

/// Result of one forwarding pass
#[derive(Debug)]
pub enum RelayOutcome {
    Success { body: Bytes },
    UpstreamError { status: StatusCode, body: Bytes },
    TransportFailure { error: ForwardError },
}

impl RelayOutcome {
    /// Status the caller will see
    pub fn status(&self) -> StatusCode {
        match self {
            RelayOutcome::Success { .. } => StatusCode::OK,
            RelayOutcome::UpstreamError { status, .. } => *status,
            RelayOutcome::TransportFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn class(&self) -> OutcomeClass {
        match self {
            RelayOutcome::Success { .. } => OutcomeClass::Success,
            RelayOutcome::UpstreamError { .. } => OutcomeClass::UpstreamError,
            RelayOutcome::TransportFailure {
                error: ForwardError::TransportUnavailable,
            } => OutcomeClass::TransportUnavailable,
            RelayOutcome::TransportFailure { .. } => OutcomeClass::TransportFailure,
        }
    }

    /// Failure description for logs; `None` on success
    pub fn error_description(&self) -> Option<String> {
        match self {
            RelayOutcome::Success { .. } => None,
            RelayOutcome::UpstreamError { status, body } => {
                Some(format!("upstream {}: {}", status, summarize_body(body, 200)))
            }
            RelayOutcome::TransportFailure { error } => Some(error.to_string()),
        }
    }

    /// Convert into the caller-facing response
    pub fn into_response(self, redact_details: bool) -> Response<Body> {
        let status = self.status();
        match self {
            RelayOutcome::Success { body } | RelayOutcome::UpstreamError { body, .. } => {
                json_bytes_response(status, body)
            }
            RelayOutcome::TransportFailure { error } => {
                let details = if redact_details {
                    REDACTED_DETAILS.to_string()
                } else {
                    error.to_string()
                };
                json_response(
                    status,
                    &json!({
                        "error": TRANSPORT_FAILURE_MESSAGE,
                        "details": details,
                    }),
                )
            }
        }
    }
}

/// Relays chat-completion requests through an [`UpstreamTransport`]
#[derive(Clone)]
pub struct ChatForwarder {
    transport: Option<Arc<dyn UpstreamTransport>>,
    redact_details: bool,
}

impl ChatForwarder {
    pub fn new(transport: Arc<dyn UpstreamTransport>) -> Self {
        Self {
            transport: Some(transport),
            redact_details: false,
        }
    }

    /// A forwarder with no outbound mechanism; every request is a transport failure
    pub fn without_transport() -> Self {
        Self {
            transport: None,
            redact_details: false,
        }
    }

    pub fn with_redacted_details(mut self, redact: bool) -> Self {
        self.redact_details = redact;
        self
    }

    pub fn redacts_details(&self) -> bool {
        self.redact_details
    }

    /// Forward one payload and classify the result. Never fails.
    pub async fn forward(&self, payload: InboundPayload) -> RelayOutcome {
        match self.call_upstream(payload).await {
            Ok(outcome) => outcome,
            Err(error) => {
                error!("Relay server error: {}", error);
                RelayOutcome::TransportFailure { error }
            }
        }
    }

    /// Forward and render the response in one step
    pub async fn respond(&self, payload: InboundPayload) -> Response<Body> {
        self.forward(payload).await.into_response(self.redact_details)
    }

    async fn call_upstream(&self, payload: InboundPayload) -> Result<RelayOutcome, ForwardError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(ForwardError::TransportUnavailable)?;

        let body = payload
            .into_body()
            .map_err(|e| ForwardError::Encode(e.to_string()))?;

        debug!("🔄 Forwarding {} bytes to {}", body.len(), transport.target());
        let reply = transport.send(body).await?;

        // Upstream bodies are relayed as-is but must at least be JSON
        serde_json::from_slice::<IgnoredAny>(&reply.body)
            .map_err(|e| ForwardError::InvalidUpstreamBody(e.to_string()))?;

        if reply.status.is_success() {
            debug!("✅ Upstream success {} ({} bytes)", reply.status, reply.body.len());
            Ok(RelayOutcome::Success { body: reply.body })
        } else {
            error!(
                "External API error: {} {}",
                reply.status,
                summarize_body(&reply.body, 400)
            );
            Ok(RelayOutcome::UpstreamError {
                status: reply.status,
                body: reply.body,
            })
        }
    }
}

/// Lossy, char-boundary-safe prefix of a body for log lines
fn summarize_body(body: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= max_bytes {
        return text.into_owned();
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
