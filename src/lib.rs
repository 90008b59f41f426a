//! ZarVault - append-only photo gallery.
//!
//! A small daemon keeps an ordered, append-only list of gallery entries
//! (image URL + optional caption + timestamp). Clients keep a local copy
//! fresh by polling and browse it in a terminal viewer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── zarvault serve ─────────────────────────────┐
//! │  api (axum)  ──►  UploadPipeline ──► BlobSink (HTTP blob store)          │
//! │      │                  │                                               │
//! │      └──────────────────┴──► EntryStore (SQLite, newest first)          │
//! └──────────────────────────────────┬──────────────────────────────────────┘
//!                                    │ GET/POST /entries
//! ┌──────────────────────────── zarvault view ──────────────────────────────┐
//! │  GalleryClient ◄── SyncCache (poll every 3 s) ──► ClientSnapshot        │
//! │                                                       │                 │
//! │                         App + Viewer (ratatui) ◄──────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Properties
//!
//! - **Append-only**: entries are never edited or deleted
//! - **Ordered**: newest first, ties broken by reverse insertion order
//! - **Stale-but-available**: a failed poll keeps the last good snapshot
//! - **No rollback**: a stored blob with a failed append is reported, not hidden

// === Core Modules ===

/// Entry record and wire types.
pub mod model;

/// Durable entry store.
pub mod store;

/// Blob storage boundary.
pub mod blob;

/// Upload signing key.
pub mod auth;

/// Blob write + metadata append.
pub mod upload;

/// REST API.
pub mod api;

// === Client Side ===

/// HTTP client for the API.
pub mod client;

/// Polling snapshot cache.
pub mod sync;

/// Viewer cursor state machine.
pub mod viewer;

// === TUI Modules ===

/// Application state.
pub mod app;

/// Event handling.
pub mod event;

/// Terminal UI.
pub mod tui;

/// UI rendering.
pub mod ui;

/// Input handling and state updates.
pub mod update;

// === Re-exports ===

pub use blob::{BlobError, BlobPayload, BlobSink, HttpBlobSink};
pub use client::{ClientConfig, GalleryClient};
pub use model::{Entry, EntryId, EntryList, NewEntry};
pub use store::{EntryStore, SharedStore, StoreConfig, StoreError};
pub use sync::{ClientSnapshot, EntrySource, SnapshotReader, SyncCache, SyncConfig};
pub use upload::{EntryWriter, PipelineConfig, UploadError, UploadPipeline, UploadRequest};
pub use viewer::{SwipeConfig, Transition, Viewer, ViewerInput, ViewerKey, ViewerState};
