//! Blob storage boundary.
//!
//! The gallery never stores image bytes itself. A [`BlobSink`] takes the raw
//! file and hands back a URL that can be put into an entry. The only
//! implementation shipped here talks HTTP: it POSTs the bytes and expects
//! `{"url": ...}` or `{"error": ...}` back.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::UploadKey;

/// Default bound on a single blob write.
pub const DEFAULT_BLOB_TIMEOUT: Duration = Duration::from_secs(60);

/// Reasons a blob write can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The sink answered with a failure reason.
    #[error("{0}")]
    Rejected(String),

    /// The sink could not be reached or answered garbage.
    #[error("blob store unreachable: {0}")]
    Transport(String),

    #[error("blob store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Raw image bytes on their way to the sink.
#[derive(Debug, Clone)]
pub struct BlobPayload {
    pub bytes: Bytes,

    /// MIME type detected from the bytes.
    pub content_type: String,

    /// Original file name, if the operator supplied one.
    pub filename: Option<String>,
}

impl BlobPayload {
    /// Build a payload from image bytes, detecting the format.
    ///
    /// Returns `None` when the bytes are not a recognizable image.
    pub fn from_image_bytes(bytes: impl Into<Bytes>, filename: Option<String>) -> Option<Self> {
        let bytes = bytes.into();
        let content_type = sniff_image_type(&bytes)?;
        Some(Self {
            bytes,
            content_type: content_type.to_string(),
            filename,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// MIME type of an image payload, from its magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}

/// External capability that stores bytes and returns a retrievable URL.
pub trait BlobSink: Send + Sync {
    fn store(&self, payload: BlobPayload) -> impl Future<Output = Result<String, BlobError>> + Send;
}

/// Sink reply body.
#[derive(Debug, Deserialize)]
struct BlobReply {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Blob sink reached over HTTP.
#[derive(Clone)]
pub struct HttpBlobSink {
    client: Client,
    endpoint: String,
    key: Option<UploadKey>,
}

impl HttpBlobSink {
    /// Sink at `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>, key: Option<UploadKey>) -> reqwest::Result<Self> {
        Self::with_timeout(endpoint, key, DEFAULT_BLOB_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        key: Option<UploadKey>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpBlobSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlobSink")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key.as_ref().map(|k| k.public_key()))
            .finish()
    }
}

impl BlobSink for HttpBlobSink {
    async fn store(&self, payload: BlobPayload) -> Result<String, BlobError> {
        let size = payload.len();

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, &payload.content_type);

        if let Some(name) = &payload.filename {
            request = request.header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name.replace('"', "")),
            );
        }

        if let Some(key) = &self.key {
            request = key.credentials().apply(request);
        } else {
            debug!("No upload key configured, sending unsigned blob write");
        }

        let response = request.body(payload.bytes).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(endpoint = %self.endpoint, "Blob write timed out");
                BlobError::Transport(format!("timed out: {e}"))
            } else {
                BlobError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BlobError::Transport(e.to_string()))?;

        let reply = serde_json::from_str::<BlobReply>(&body).ok();

        if !status.is_success() {
            let reason = reply
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("blob store returned {status}: {}", body.trim()));
            warn!(status = %status, reason = %reason, "Blob write rejected");
            return Err(BlobError::Rejected(reason));
        }

        match reply {
            Some(BlobReply { url: Some(url), .. }) if !url.trim().is_empty() => {
                info!(url = %url, size = size, "Stored blob");
                Ok(url)
            }
            Some(BlobReply { error: Some(reason), .. }) => Err(BlobError::Rejected(reason)),
            _ => Err(BlobError::Transport(format!(
                "unexpected blob store reply: {}",
                body.trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(sniff_image_type(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_image_type(JPEG_MAGIC), Some("image/jpeg"));
    }

    #[test]
    fn test_non_image_payload_is_refused() {
        assert_eq!(sniff_image_type(b"hello, world"), None);
        assert!(BlobPayload::from_image_bytes(b"hello".to_vec(), None).is_none());
    }

    #[test]
    fn test_payload_keeps_name_and_type() {
        let payload =
            BlobPayload::from_image_bytes(PNG_MAGIC.to_vec(), Some("cat.png".to_string())).unwrap();
        assert_eq!(payload.content_type, "image/png");
        assert_eq!(payload.filename.as_deref(), Some("cat.png"));
        assert_eq!(payload.len(), PNG_MAGIC.len());
    }

    #[test]
    fn test_reply_parsing() {
        let ok: BlobReply = serde_json::from_str(r#"{"url":"https://cdn/x.png"}"#).unwrap();
        assert_eq!(ok.url.as_deref(), Some("https://cdn/x.png"));

        let err: BlobReply = serde_json::from_str(r#"{"error":"quota exceeded"}"#).unwrap();
        assert_eq!(err.error.as_deref(), Some("quota exceeded"));
    }
}
