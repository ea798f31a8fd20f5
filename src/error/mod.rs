//! Error handling module for the relay server

use thiserror::Error;

/// Setup-time error type for the relay server.
///
/// Request-path failures never surface as this type; they are folded into an
/// HTTP response by the forwarding handler (see [`crate::relay::ForwardError`]).
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream client error: {0}")]
    UpstreamClient(String),
}

/// Result type for the relay server
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::UpstreamClient(err.to_string())
    }
}
