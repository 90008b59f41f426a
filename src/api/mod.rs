//! REST API for the gallery daemon.
//!
//! Endpoints:
//! - `GET  /entries`         newest-first entry list
//! - `POST /entries`         append an entry for an already-hosted image
//! - `POST /entries/upload`  raw image body, stored in the blob sink then appended
//! - `GET  /status`          health and counts

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::blob::HttpBlobSink;
use crate::store::SharedStore;
use crate::upload::{PipelineConfig, UploadPipeline};

pub use error::ApiError;

/// Largest image body accepted by `POST /entries/upload`.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Pipeline used by the server: blob sink over HTTP, metadata into the local store.
pub type ServerPipeline = UploadPipeline<HttpBlobSink, SharedStore>;

/// Shared state for API handlers.
pub struct ApiState {
    /// The entry store.
    pub store: SharedStore,

    /// Upload pipeline; its sink is absent when no blob store is configured.
    pub pipeline: Arc<ServerPipeline>,
}

impl ApiState {
    pub fn new(store: SharedStore, blob_sink: Option<HttpBlobSink>, config: PipelineConfig) -> Self {
        let pipeline = UploadPipeline::new(blob_sink, store.clone(), config);
        Self {
            store,
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    // Browser front ends are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(handlers::status::health))
        .route(
            "/entries",
            get(handlers::entries::list_entries).post(handlers::entries::create_entry),
        )
        .route(
            "/entries/upload",
            post(handlers::uploads::upload_entry).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                // Only failed responses are logged
                .on_request(())
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    let status = response.status();
                    if !status.is_success() {
                        tracing::warn!(
                            status = %status,
                            latency_ms = latency.as_millis(),
                            "request failed"
                        );
                    }
                }),
        )
        .with_state(state)
}

/// Start the API server.
pub async fn serve(state: Arc<ApiState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!(addr = %listener.local_addr()?, "Gallery API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
