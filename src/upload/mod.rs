//! Two-step image submission: blob write, then metadata append.
//!
//! ```text
//! UploadRequest ──► File(bytes) ──► BlobSink::store ──► url ─┐
//!               └─► Url(url) ────────────────────────────────┴─► EntryWriter::append_entry ──► Entry
//! ```
//!
//! There is no rollback of the blob write. When the blob lands but the
//! append fails, the caller gets [`UploadError::MetadataCommitFailedAfterUpload`]
//! with the URL and can retry only the second step through
//! [`UploadPipeline::commit`].
//!
//! An upload is not cancellable once the blob write has started. Callers that
//! may be dropped mid-flight (HTTP handlers, the TUI) go through
//! [`UploadPipeline::submit`], which runs the work on its own task.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::blob::{BlobError, BlobPayload, BlobSink, DEFAULT_BLOB_TIMEOUT};
use crate::model::Entry;
use crate::store::{SharedStore, StoreError};

/// Metadata side of the pipeline.
///
/// Implemented by the local store on the server and by the HTTP client
/// everywhere else.
pub trait EntryWriter: Send + Sync {
    fn append_entry(
        &self,
        image_ref: &str,
        caption: Option<&str>,
    ) -> impl Future<Output = Result<Entry, StoreError>> + Send;
}

impl EntryWriter for SharedStore {
    async fn append_entry(&self, image_ref: &str, caption: Option<&str>) -> Result<Entry, StoreError> {
        self.append(image_ref, caption).await
    }
}

/// Where the image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw bytes that must go through the blob sink first.
    File(BlobPayload),
    /// An already-hosted image, used as the reference directly.
    Url(String),
}

/// One submission: an image source and an optional caption.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: ImageSource,
    pub caption: Option<String>,
}

impl UploadRequest {
    pub fn file(payload: BlobPayload, caption: Option<String>) -> Self {
        Self {
            source: ImageSource::File(payload),
            caption,
        }
    }

    pub fn url(url: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            source: ImageSource::Url(url.into()),
            caption,
        }
    }

    /// Build a request from loose form inputs.
    ///
    /// Exactly one of `file` and `url` must be present. A blank URL counts
    /// as absent. File bytes must be a recognizable image.
    pub fn from_parts(
        file: Option<(Vec<u8>, Option<String>)>,
        url: Option<String>,
        caption: Option<String>,
    ) -> Result<Self, UploadError> {
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        match (file, url) {
            (None, None) => Err(UploadError::Input("no image source".to_string())),
            (Some(_), Some(_)) => Err(UploadError::Input(
                "provide either a file or a URL, not both".to_string(),
            )),
            (None, Some(url)) => Ok(Self::url(url, caption)),
            (Some((bytes, filename)), None) => {
                if bytes.is_empty() {
                    return Err(UploadError::Input("file is empty".to_string()));
                }
                let payload = BlobPayload::from_image_bytes(bytes, filename).ok_or_else(|| {
                    UploadError::Input("file is not a recognized image format".to_string())
                })?;
                Ok(Self::file(payload, caption))
            }
        }
    }

    /// Build a request from a single operator-typed source.
    ///
    /// An absolute `http`/`https` URL is used as the image reference. Anything
    /// else must name an existing local file, which is read and goes through
    /// the blob sink.
    pub async fn from_operator_input(input: &str, caption: Option<String>) -> Result<Self, UploadError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(UploadError::Input("no image source".to_string()));
        }

        if let Ok(url) = reqwest::Url::parse(input) {
            match url.scheme() {
                "http" | "https" => return Self::from_parts(None, Some(input.to_string()), caption),
                // Windows drive letters parse as one-letter schemes.
                scheme if scheme.len() > 1 => {
                    return Err(UploadError::Input(format!("unsupported URL scheme: {scheme}")));
                }
                _ => {}
            }
        }

        let path = Path::new(input);
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(UploadError::Input(format!("no such file: {}", path.display())));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::Input(format!("cannot read {}: {e}", path.display())))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self::from_parts(Some((bytes, filename)), None, caption)
    }

    /// Trimmed caption, `None` when blank.
    pub fn normalized_caption(&self) -> Option<String> {
        normalize_caption(self.caption.as_deref())
    }
}

fn normalize_caption(caption: Option<&str>) -> Option<String> {
    caption
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Everything that can go wrong in a submission.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Input(String),

    /// The blob write failed; no entry was appended.
    #[error("upload failed: {0}")]
    Upload(#[from] BlobError),

    #[error("invalid entry: {0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The blob is stored at `url` but no entry references it.
    #[error("image uploaded to {url} but saving the entry failed: {source}")]
    MetadataCommitFailedAfterUpload {
        url: String,
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for UploadError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => UploadError::Validation(msg),
            StoreError::Unavailable(msg) => UploadError::StorageUnavailable(msg),
        }
    }
}

impl UploadError {
    /// URL of a blob that was written but never referenced.
    pub fn orphaned_url(&self) -> Option<&str> {
        match self {
            UploadError::MetadataCommitFailedAfterUpload { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Pipeline timeouts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blob_timeout: Duration,
    pub commit_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blob_timeout: DEFAULT_BLOB_TIMEOUT,
            commit_timeout: Duration::from_secs(10),
        }
    }
}

/// Orchestrates blob write and metadata append.
///
/// The sink is optional: a pipeline without one still accepts URL sources.
pub struct UploadPipeline<S, W> {
    sink: Option<S>,
    writer: W,
    config: PipelineConfig,
}

impl<S: BlobSink, W: EntryWriter> UploadPipeline<S, W> {
    pub fn new(sink: Option<S>, writer: W, config: PipelineConfig) -> Self {
        Self {
            sink,
            writer,
            config,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Run a submission to completion on the current task.
    pub async fn run(&self, request: UploadRequest) -> Result<Entry, UploadError> {
        let caption = request.normalized_caption();

        let (image_ref, uploaded) = match request.source {
            ImageSource::Url(url) => {
                let url = url.trim().to_string();
                if url.is_empty() {
                    return Err(UploadError::Input("no image source".to_string()));
                }
                (url, false)
            }
            ImageSource::File(payload) => (self.store_blob(payload).await?, true),
        };

        match self.append(&image_ref, caption.as_deref()).await {
            Ok(entry) => {
                info!(id = %entry.id, image_ref = %entry.image_ref, uploaded, "Entry created");
                Ok(entry)
            }
            Err(e) if uploaded => {
                error!(url = %image_ref, error = %e, "Blob stored but entry append failed");
                Err(UploadError::MetadataCommitFailedAfterUpload {
                    url: image_ref,
                    source: e,
                })
            }
            Err(e) => {
                warn!(error = %e, "Entry append failed");
                Err(e.into())
            }
        }
    }

    /// Run only the metadata step for an image that is already hosted.
    ///
    /// This is the retry path after `MetadataCommitFailedAfterUpload`.
    pub async fn commit(&self, url: &str, caption: Option<&str>) -> Result<Entry, UploadError> {
        let caption = normalize_caption(caption);
        let entry = self.append(url, caption.as_deref()).await?;
        info!(id = %entry.id, "Entry committed");
        Ok(entry)
    }

    async fn store_blob(&self, payload: BlobPayload) -> Result<String, UploadError> {
        let Some(sink) = &self.sink else {
            return Err(UploadError::Upload(BlobError::Rejected(
                "no blob store configured".to_string(),
            )));
        };

        debug!(
            bytes = payload.len(),
            content_type = %payload.content_type,
            "Writing blob"
        );

        let limit = self.config.blob_timeout;
        match timeout(limit, sink.store(payload)).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(e)) => {
                warn!(error = %e, "Blob write failed");
                Err(UploadError::Upload(e))
            }
            Err(_) => {
                warn!(timeout = ?limit, "Blob write timed out");
                Err(UploadError::Upload(BlobError::Timeout(limit)))
            }
        }
    }

    async fn append(&self, image_ref: &str, caption: Option<&str>) -> Result<Entry, StoreError> {
        let limit = self.config.commit_timeout;
        timeout(limit, self.writer.append_entry(image_ref, caption))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Unavailable(format!(
                    "entry append did not finish within {limit:?}"
                )))
            })
    }
}

impl<S, W> UploadPipeline<S, W>
where
    S: BlobSink + 'static,
    W: EntryWriter + 'static,
{
    /// Run a submission on its own task.
    ///
    /// Dropping the returned handle does not cancel the upload.
    pub fn submit(self: &Arc<Self>, request: UploadRequest) -> JoinHandle<Result<Entry, UploadError>> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(request).await })
    }
}
