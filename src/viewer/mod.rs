//! Full-screen viewer cursor.
//!
//! A two-state machine over the current snapshot:
//!
//! ```text
//!            Select(i), i < len
//!   Closed ─────────────────────► Open(i)
//!     ▲                            │  ▲
//!     │  Esc / Dismiss / Close     │  │ previous / next (clamped at the ends)
//!     └────────────────────────────┘  └──┘
//! ```
//!
//! While open, the index always points at a valid element. When a poll
//! shrinks the sequence the index is clamped to the new last element, and
//! the viewer closes if nothing is left.

use tracing::trace;

use crate::model::Entry;

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerState {
    #[default]
    Closed,
    Open(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    Left,
    Right,
    Escape,
}

/// Everything the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerInput {
    /// Open at an index.
    Select(usize),
    Key(ViewerKey),
    /// A finished horizontal gesture, in pixels.
    Swipe { start_x: f64, end_x: f64 },
    /// Backdrop click.
    Dismiss,
    /// Explicit close control.
    Close,
}

/// What an input did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened(usize),
    Moved { from: usize, to: usize },
    Unchanged,
    Closed,
    /// Selection outside the sequence.
    Rejected,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Transition::Opened(_) | Transition::Moved { .. } | Transition::Closed
        )
    }
}

/// Swipe detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeConfig {
    /// Horizontal displacement a gesture must exceed to navigate.
    pub min_distance: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self { min_distance: 50.0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    start_x: f64,
    end_x: Option<f64>,
}

/// Viewer cursor bound to the length of the current snapshot.
#[derive(Debug, Clone)]
pub struct Viewer {
    state: ViewerState,
    len: usize,
    swipe: SwipeConfig,
    gesture: Option<Gesture>,
}

impl Viewer {
    pub fn new(len: usize) -> Self {
        Self::with_swipe(len, SwipeConfig::default())
    }

    pub fn with_swipe(len: usize, swipe: SwipeConfig) -> Self {
        Self {
            state: ViewerState::Closed,
            len,
            swipe,
            gesture: None,
        }
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ViewerState::Open(_))
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            ViewerState::Open(i) => Some(i),
            ViewerState::Closed => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `(i + 1, len)` for the "i of n" label.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.index().map(|i| (i + 1, self.len))
    }

    /// The open entry, if any.
    pub fn current<'a>(&self, entries: &'a [Entry]) -> Option<&'a Entry> {
        self.index().and_then(|i| entries.get(i))
    }

    pub fn handle(&mut self, input: ViewerInput) -> Transition {
        let transition = match input {
            ViewerInput::Select(i) => self.select(i),
            ViewerInput::Key(ViewerKey::Left) => self.previous(),
            ViewerInput::Key(ViewerKey::Right) => self.next(),
            ViewerInput::Key(ViewerKey::Escape) | ViewerInput::Dismiss | ViewerInput::Close => {
                self.close()
            }
            ViewerInput::Swipe { start_x, end_x } => self.swipe(start_x, end_x),
        };
        trace!(?input, ?transition, "Viewer input");
        transition
    }

    pub fn select(&mut self, index: usize) -> Transition {
        if index >= self.len {
            return Transition::Rejected;
        }
        self.state = ViewerState::Open(index);
        self.gesture = None;
        Transition::Opened(index)
    }

    pub fn previous(&mut self) -> Transition {
        match self.state {
            ViewerState::Open(i) if i > 0 => self.move_to(i, i - 1),
            _ => Transition::Unchanged,
        }
    }

    pub fn next(&mut self) -> Transition {
        match self.state {
            ViewerState::Open(i) if i + 1 < self.len => self.move_to(i, i + 1),
            _ => Transition::Unchanged,
        }
    }

    pub fn close(&mut self) -> Transition {
        self.gesture = None;
        match self.state {
            ViewerState::Open(_) => {
                self.state = ViewerState::Closed;
                Transition::Closed
            }
            ViewerState::Closed => Transition::Unchanged,
        }
    }

    /// Right-to-left goes to the previous entry, left-to-right to the next.
    /// Displacements up to the threshold are taps.
    pub fn swipe(&mut self, start_x: f64, end_x: f64) -> Transition {
        let dx = end_x - start_x;
        if !dx.is_finite() || dx.abs() <= self.swipe.min_distance {
            return Transition::Unchanged;
        }
        if dx < 0.0 {
            self.previous()
        } else {
            self.next()
        }
    }

    pub fn pointer_down(&mut self, x: f64) {
        if self.is_open() {
            self.gesture = Some(Gesture {
                start_x: x,
                end_x: None,
            });
        }
    }

    pub fn pointer_move(&mut self, x: f64) {
        if let Some(gesture) = &mut self.gesture {
            gesture.end_x = Some(x);
        }
    }

    /// Finish a gesture. Without any move in between it is a tap.
    pub fn pointer_up(&mut self) -> Transition {
        match self.gesture.take() {
            Some(Gesture {
                start_x,
                end_x: Some(end_x),
            }) => self.swipe(start_x, end_x),
            _ => Transition::Unchanged,
        }
    }

    /// Re-bind to a new snapshot length.
    pub fn sync_len(&mut self, len: usize) -> Transition {
        self.len = len;
        match self.state {
            ViewerState::Open(_) if len == 0 => self.close(),
            ViewerState::Open(i) if i >= len => self.move_to(i, len - 1),
            _ => Transition::Unchanged,
        }
    }

    fn move_to(&mut self, from: usize, to: usize) -> Transition {
        self.state = ViewerState::Open(to);
        Transition::Moved { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryId;
    use chrono::DateTime;

    fn open_at(len: usize, i: usize) -> Viewer {
        let mut viewer = Viewer::new(len);
        assert_eq!(viewer.select(i), Transition::Opened(i));
        viewer
    }

    #[test]
    fn test_previous_previous_next() {
        let mut viewer = open_at(5, 2);

        viewer.handle(ViewerInput::Key(ViewerKey::Left));
        viewer.handle(ViewerInput::Key(ViewerKey::Left));
        viewer.handle(ViewerInput::Key(ViewerKey::Right));

        assert_eq!(viewer.state(), ViewerState::Open(1));
    }

    #[test]
    fn test_bounds_are_no_ops() {
        let mut viewer = open_at(5, 0);
        assert_eq!(viewer.previous(), Transition::Unchanged);
        assert_eq!(viewer.state(), ViewerState::Open(0));

        let mut viewer = open_at(5, 4);
        assert_eq!(viewer.next(), Transition::Unchanged);
        assert_eq!(viewer.state(), ViewerState::Open(4));
    }

    #[test]
    fn test_select_out_of_range_rejected() {
        let mut viewer = Viewer::new(3);
        assert_eq!(viewer.select(3), Transition::Rejected);
        assert_eq!(viewer.state(), ViewerState::Closed);

        let mut empty = Viewer::new(0);
        assert_eq!(empty.select(0), Transition::Rejected);
    }

    #[test]
    fn test_navigation_while_closed_does_nothing() {
        let mut viewer = Viewer::new(3);
        assert_eq!(viewer.next(), Transition::Unchanged);
        assert_eq!(viewer.swipe(0.0, 200.0), Transition::Unchanged);
        assert_eq!(viewer.close(), Transition::Unchanged);
    }

    #[test]
    fn test_short_swipe_is_tap() {
        let mut viewer = open_at(5, 2);
        let t = viewer.handle(ViewerInput::Swipe {
            start_x: 100.0,
            end_x: 130.0,
        });
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(viewer.state(), ViewerState::Open(2));

        // Exactly at the threshold does not count.
        assert_eq!(viewer.swipe(100.0, 150.0), Transition::Unchanged);
    }

    #[test]
    fn test_non_finite_swipe_is_ignored() {
        let mut viewer = open_at(5, 2);
        assert_eq!(viewer.swipe(f64::NAN, 300.0), Transition::Unchanged);
        assert_eq!(viewer.swipe(0.0, f64::NAN), Transition::Unchanged);
        assert_eq!(viewer.swipe(0.0, f64::INFINITY), Transition::Unchanged);
        assert_eq!(viewer.swipe(f64::INFINITY, 0.0), Transition::Unchanged);
        assert_eq!(viewer.state(), ViewerState::Open(2));
    }

    #[test]
    fn test_long_swipe_moves_one_step() {
        let mut viewer = open_at(5, 2);

        assert_eq!(viewer.swipe(100.0, 180.0), Transition::Moved { from: 2, to: 3 });
        assert_eq!(viewer.swipe(180.0, 100.0), Transition::Moved { from: 3, to: 2 });
    }

    #[test]
    fn test_pointer_without_move_is_tap() {
        let mut viewer = open_at(5, 2);
        viewer.pointer_down(300.0);
        assert_eq!(viewer.pointer_up(), Transition::Unchanged);

        viewer.pointer_down(300.0);
        viewer.pointer_move(250.0);
        viewer.pointer_move(200.0);
        assert_eq!(viewer.pointer_up(), Transition::Moved { from: 2, to: 1 });
    }

    #[test]
    fn test_close_inputs() {
        for input in [
            ViewerInput::Key(ViewerKey::Escape),
            ViewerInput::Dismiss,
            ViewerInput::Close,
        ] {
            let mut viewer = open_at(2, 1);
            assert_eq!(viewer.handle(input), Transition::Closed);
            assert!(!viewer.is_open());
        }
    }

    #[test]
    fn test_shrink_clamps_then_closes() {
        let mut viewer = open_at(5, 4);

        assert_eq!(viewer.sync_len(3), Transition::Moved { from: 4, to: 2 });
        assert_eq!(viewer.position(), Some((3, 3)));

        assert_eq!(viewer.sync_len(10), Transition::Unchanged);
        assert_eq!(viewer.state(), ViewerState::Open(2));

        assert_eq!(viewer.sync_len(0), Transition::Closed);
        assert_eq!(viewer.state(), ViewerState::Closed);
    }

    #[test]
    fn test_current_entry_lookup() {
        let entries: Vec<Entry> = (0..2)
            .map(|i| Entry {
                id: EntryId::generate(),
                image_ref: format!("https://img.example/{i}.jpg"),
                caption: None,
                created_at: DateTime::from_timestamp(1_700_000_000 - i, 0).unwrap(),
            })
            .collect();

        let mut viewer = Viewer::new(entries.len());
        assert!(viewer.current(&entries).is_none());

        viewer.select(1);
        assert_eq!(viewer.current(&entries).unwrap().image_ref, "https://img.example/1.jpg");
        assert_eq!(viewer.current(&entries[..1]), None);
    }
}
