//! Viewer application state.

use std::time::{Duration, Instant};

use ratatui::layout::Rect;

use crate::model::Entry;
use crate::sync::ClientSnapshot;
use crate::viewer::{SwipeConfig, Transition, Viewer};

/// How long a success notice stays up.
pub const NOTICE_SUCCESS_TTL: Duration = Duration::from_secs(3);

/// How long a failure notice stays up.
pub const NOTICE_FAILURE_TTL: Duration = Duration::from_secs(5);

/// Pixels represented by one terminal column for swipe detection.
pub const PIXELS_PER_CELL: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
}

/// Transient, auto-dismissing operator message.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    pub expires_at: Instant,
}

impl Notice {
    pub fn success(text: impl Into<String>, now: Instant) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Success,
            expires_at: now + NOTICE_SUCCESS_TTL,
        }
    }

    pub fn failure(text: impl Into<String>, now: Instant) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Failure,
            expires_at: now + NOTICE_FAILURE_TTL,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Which field of the add prompt has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptField {
    Source,
    Caption,
}

/// The "add image" form.
#[derive(Debug, Clone)]
pub struct AddPrompt {
    pub field: PromptField,
    /// URL or local file path.
    pub source: String,
    pub caption: String,
}

impl AddPrompt {
    fn new() -> Self {
        Self {
            field: PromptField::Source,
            source: String::new(),
            caption: String::new(),
        }
    }

    pub fn active_text_mut(&mut self) -> &mut String {
        match self.field {
            PromptField::Source => &mut self.source,
            PromptField::Caption => &mut self.caption,
        }
    }
}

/// Application state.
pub struct App {
    /// Is the application running?
    pub running: bool,

    /// Latest snapshot from the sync cache.
    pub snapshot: ClientSnapshot,

    /// Highlighted row in the gallery list.
    pub selected: usize,

    /// Full-screen viewer cursor.
    pub viewer: Viewer,

    pub notice: Option<Notice>,

    pub prompt: Option<AddPrompt>,

    /// Uploads submitted but not yet finished.
    pub uploads_in_flight: usize,

    /// Where the viewer overlay was last drawn; clicks outside it dismiss.
    pub viewer_area: Rect,

    /// Something visible changed since the last frame.
    dirty: bool,
}

impl App {
    pub fn new(snapshot: ClientSnapshot) -> Self {
        Self::with_swipe(snapshot, SwipeConfig::default())
    }

    pub fn with_swipe(snapshot: ClientSnapshot, swipe: SwipeConfig) -> Self {
        let viewer = Viewer::with_swipe(snapshot.len(), swipe);
        Self {
            running: true,
            snapshot,
            selected: 0,
            viewer,
            notice: None,
            prompt: None,
            uploads_in_flight: 0,
            viewer_area: Rect::default(),
            dirty: true,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a redraw is due. Clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Record a viewer transition, flagging a redraw if it moved the cursor.
    pub fn note(&mut self, transition: Transition) -> Transition {
        if transition.is_change() {
            self.dirty = true;
        }
        transition
    }

    pub fn entries(&self) -> &[Entry] {
        &self.snapshot.entries
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.loading
    }

    /// Entry under the viewer cursor.
    pub fn viewed_entry(&self) -> Option<&Entry> {
        self.viewer.current(self.entries())
    }

    /// Swap in a new snapshot, keeping the list selection and viewer cursor valid.
    pub fn apply_snapshot(&mut self, snapshot: ClientSnapshot) -> Transition {
        self.snapshot = snapshot;
        let len = self.snapshot.len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.viewer.sync_len(len)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.snapshot.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn open_prompt(&mut self) {
        self.prompt = Some(AddPrompt::new());
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notice = Some(notice);
        self.dirty = true;
    }

    /// Expire the notice if its time is up. Returns whether it was removed.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        if self.notice.as_ref().is_some_and(|n| n.is_expired(now)) {
            self.notice = None;
            self.dirty = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryId;
    use chrono::DateTime;
    use std::sync::Arc;

    fn snapshot_of(n: usize) -> ClientSnapshot {
        let entries = (0..n)
            .map(|i| Entry {
                id: EntryId::generate(),
                image_ref: format!("https://img.example/{i}.jpg"),
                caption: None,
                created_at: DateTime::from_timestamp(1_700_000_000 - i as i64, 0).unwrap(),
            })
            .collect();
        ClientSnapshot {
            entries: Arc::new(entries),
            revision: 1,
            fetched_at: None,
            loading: false,
        }
    }

    #[test]
    fn test_notice_lifetimes() {
        let now = Instant::now();
        let mut app = App::new(snapshot_of(0));

        app.notify(Notice::success("Added", now));
        assert!(!app.on_tick(now + Duration::from_millis(2900)));
        assert!(app.notice.is_some());
        assert!(app.on_tick(now + NOTICE_SUCCESS_TTL));
        assert!(app.notice.is_none());

        app.notify(Notice::failure("Upload failed", now));
        app.on_tick(now + Duration::from_secs(4));
        assert!(app.notice.is_some());
        app.on_tick(now + NOTICE_FAILURE_TTL);
        assert!(app.notice.is_none());
    }

    #[test]
    fn test_dirty_flag_follows_visible_changes() {
        let now = Instant::now();
        let mut app = App::new(snapshot_of(3));
        assert!(app.take_dirty(), "first frame is always drawn");
        assert!(!app.take_dirty());

        assert!(!app.on_tick(now));
        assert!(!app.take_dirty());

        let moved = app.viewer.previous();
        app.note(moved);
        assert!(!app.take_dirty(), "closed viewer ignores navigation");

        let opened = app.viewer.select(0);
        app.note(opened);
        assert!(app.take_dirty());

        app.notify(Notice::failure("Upload failed", now));
        assert!(app.take_dirty());
        app.on_tick(now + NOTICE_FAILURE_TTL);
        assert!(app.take_dirty());
    }

    #[test]
    fn test_shrinking_snapshot_clamps_selection_and_viewer() {
        let mut app = App::new(snapshot_of(5));
        app.selected = 4;
        app.viewer.select(4);

        let transition = app.apply_snapshot(snapshot_of(2));

        assert_eq!(app.selected, 1);
        assert_eq!(transition, Transition::Moved { from: 4, to: 1 });
        assert_eq!(app.viewed_entry().unwrap().image_ref, "https://img.example/1.jpg");
    }

    #[test]
    fn test_list_selection_bounds() {
        let mut app = App::new(snapshot_of(2));
        app.select_previous();
        assert_eq!(app.selected, 0);
        app.select_next();
        app.select_next();
        assert_eq!(app.selected, 1);
    }
}
