//! Chat-completion relay

pub mod forwarder;
pub mod payload;
pub mod server;
pub mod transport;

// Re-exports
pub use forwarder::{ChatForwarder, RelayOutcome, TRANSPORT_FAILURE_MESSAGE};
pub use payload::{BodyError, InboundPayload};
pub use server::{RelayServer, CHAT_PATH, HEALTH_PATH};
pub use transport::{ForwardError, ReqwestTransport, UpstreamReply, UpstreamTransport};
