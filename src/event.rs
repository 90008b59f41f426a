//! Terminal and background events for the viewer.
//!
//! Terminal input is read on a dedicated thread (crossterm's `poll` blocks)
//! and forwarded over a tokio channel together with events produced by
//! background tasks: new snapshots and finished uploads.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use tokio::sync::mpsc;

use crate::model::Entry;
use crate::sync::ClientSnapshot;

/// Application events.
#[derive(Debug, Clone)]
pub enum Event {
    /// Periodic tick, used to expire notices.
    Tick,
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// The sync cache published a new snapshot.
    Snapshot(ClientSnapshot),
    /// An upload finished, with the created entry or a readable reason.
    UploadFinished(std::result::Result<Entry, String>),
}

/// Merges terminal input and background notifications into one stream.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Start the input thread with the given tick rate in milliseconds.
    pub fn new(tick_rate_ms: u64) -> Self {
        let tick_rate = Duration::from_millis(tick_rate_ms);
        let (tx, rx) = mpsc::unbounded_channel();

        let event_tx = tx.clone();
        thread::spawn(move || loop {
            let event = match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    // Windows reports both press and release
                    Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
                    Ok(CrosstermEvent::Mouse(mouse)) => Event::Mouse(mouse),
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!(error = %e, "Terminal read failed");
                        break;
                    }
                },
                Ok(false) => Event::Tick,
                Err(e) => {
                    tracing::error!(error = %e, "Terminal poll failed");
                    break;
                }
            };

            if event_tx.send(event).is_err() {
                break;
            }
        });

        Self { rx, tx }
    }

    /// Handle for background tasks to push events.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Get the next event.
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Event channel closed"))
    }
}
