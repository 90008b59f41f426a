//! Status and health check handlers.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::{ApiError, ApiState};

/// Health response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status.
    pub status: String,

    /// Number of stored entries.
    pub entries: usize,

    /// Whether `POST /entries/upload` can accept files.
    pub blob_sink: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<ApiState>>) -> Result<Json<HealthResponse>, ApiError> {
    let entries = state.store.count().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        entries,
        blob_sink: state.pipeline.has_sink(),
    }))
}
