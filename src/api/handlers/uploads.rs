//! File upload handler.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::{ApiError, ApiState};
use crate::model::Entry;
use crate::upload::UploadRequest;

#[derive(Debug, Deserialize, Default)]
pub struct UploadParams {
    pub caption: Option<String>,
}

/// Store a raw image body in the blob sink, then append an entry for it.
///
/// The pipeline runs on its own task so a client disconnect does not leave
/// a half-finished upload.
pub async fn upload_entry(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<Entry>, ApiError> {
    if !state.pipeline.has_sink() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "no blob store configured",
        ));
    }

    let request = UploadRequest::from_parts(Some((body.to_vec(), None)), None, params.caption)?;

    let entry = state.pipeline.submit(request).await.map_err(|e| {
        tracing::error!(error = %e, "Upload task failed");
        ApiError::internal("upload task failed")
    })??;

    Ok(Json(entry))
}
