//! Entry list and append handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::api::{ApiError, ApiState};
use crate::model::{Entry, EntryList, NewEntry};

/// List all entries, newest first.
pub async fn list_entries(State(state): State<Arc<ApiState>>) -> Result<Json<EntryList>, ApiError> {
    let entries = state.store.list().await?;
    Ok(Json(EntryList { entries }))
}

/// Append an entry for an already-hosted image.
///
/// An empty caption is stored as absent.
pub async fn create_entry(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<NewEntry>, JsonRejection>,
) -> Result<Json<Entry>, ApiError> {
    let Json(request) = body?;

    let image_ref = request.image_ref.unwrap_or_default();
    let caption = request.caption.filter(|c| !c.is_empty());

    let entry = state.store.append(&image_ref, caption.as_deref()).await?;

    tracing::debug!(entry_id = %entry.id, "Entry appended");
    Ok(Json(entry))
}
