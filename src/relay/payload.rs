//! Inbound body parsing
//!
//! The body is read up to a size limit and decoded as JSON before the
//! forwarding handler runs. Bodies that are not JSON are kept as raw bytes and
//! forwarded untouched; nothing here looks at the payload's shape.

use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::Body;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors while reading the inbound body
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    Read(String),
}

/// Caller-supplied payload, held only for the duration of one request
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPayload {
    /// Body decoded as JSON; re-serialized on the way out
    Json(Value),
    /// Empty or malformed body, forwarded byte-for-byte
    Raw(Bytes),
}

impl InboundPayload {
    pub fn from_bytes(bytes: Bytes) -> Self {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => InboundPayload::Json(value),
            Err(e) => {
                debug!("Inbound body is not JSON ({}), forwarding {} raw bytes", e, bytes.len());
                InboundPayload::Raw(bytes)
            }
        }
    }

    /// Outbound body bytes
    pub fn into_body(self) -> Result<Bytes, serde_json::Error> {
        match self {
            InboundPayload::Json(value) => serde_json::to_vec(&value).map(Bytes::from),
            InboundPayload::Raw(bytes) => Ok(bytes),
        }
    }
}

/// Read a request body, refusing anything larger than `limit` bytes.
///
/// A declared `Content-Length` over the limit is refused before any data is read.
pub async fn read_body(
    mut body: Body,
    declared_length: Option<u64>,
    limit: usize,
) -> Result<Bytes, BodyError> {
    if let Some(declared) = declared_length {
        if declared > limit as u64 {
            return Err(BodyError::TooLarge { limit });
        }
    }

    let mut buf = BytesMut::with_capacity(declared_length.unwrap_or(0) as usize);
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| BodyError::Read(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_body_is_decoded() {
        let payload = InboundPayload::from_bytes(Bytes::from_static(
            br#"{"model":"openai/gpt-4o","messages":[{"role":"user","content":"hi"}]}"#,
        ));
        assert!(matches!(payload, InboundPayload::Json(_)));

        let out = payload.into_body().unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            value,
            json!({"model":"openai/gpt-4o","messages":[{"role":"user","content":"hi"}]})
        );
    }

    #[test]
    fn test_malformed_body_is_kept_verbatim() {
        let raw = Bytes::from_static(b"{\"model\": ");
        let payload = InboundPayload::from_bytes(raw.clone());
        assert_eq!(payload, InboundPayload::Raw(raw.clone()));
        assert_eq!(payload.into_body().unwrap(), raw);
    }

    #[test]
    fn test_empty_body_is_kept_verbatim() {
        let payload = InboundPayload::from_bytes(Bytes::new());
        assert!(matches!(payload, InboundPayload::Raw(_)));
        assert!(payload.into_body().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body(Body::from("{\"a\":1}"), Some(7), 16).await.unwrap();
        assert_eq!(&bytes[..], b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_read_body_declared_too_large() {
        let err = read_body(Body::from("{}"), Some(1024), 16).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn test_read_body_streamed_too_large() {
        let body = Body::from(vec![b'x'; 64]);
        let err = read_body(body, None, 16).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge { limit: 16 }));
    }
}
