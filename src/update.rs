//! Event handling for the viewer: turns events into state changes and
//! commands for the main loop.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{App, Notice, PromptField, PIXELS_PER_CELL};
use crate::event::Event;
use crate::viewer::{ViewerInput, ViewerKey};

/// Side effects the main loop has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the upload pipeline for a URL or local file path.
    Upload { source: String, caption: String },
}

/// Apply one event to the app.
///
/// Changes that need a new frame set the app's dirty flag; ticks and pointer
/// motion that leave the screen as it was do not.
pub fn update(app: &mut App, event: Event) -> Option<Command> {
    match event {
        Event::Tick => {
            app.on_tick(Instant::now());
            None
        }
        Event::Key(key) => handle_key(app, key),
        Event::Mouse(mouse) => {
            handle_mouse(app, mouse);
            None
        }
        Event::Resize(_, _) => {
            app.mark_dirty();
            None
        }
        Event::Snapshot(snapshot) => {
            app.apply_snapshot(snapshot);
            app.mark_dirty();
            None
        }
        Event::UploadFinished(result) => {
            app.uploads_in_flight = app.uploads_in_flight.saturating_sub(1);
            let now = Instant::now();
            match result {
                Ok(entry) => app.notify(Notice::success(format!("Added {}", entry.image_ref), now)),
                Err(reason) => app.notify(Notice::failure(reason, now)),
            }
            None
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return None;
    }

    if app.prompt.is_some() {
        return handle_prompt_key(app, key);
    }

    if app.viewer.is_open() {
        match key.code {
            KeyCode::Left => drive_viewer(app, ViewerInput::Key(ViewerKey::Left)),
            KeyCode::Right => drive_viewer(app, ViewerInput::Key(ViewerKey::Right)),
            KeyCode::Esc => drive_viewer(app, ViewerInput::Key(ViewerKey::Escape)),
            KeyCode::Char('q') => app.quit(),
            _ => {}
        }
        return None;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Down | KeyCode::Char('j') => {
            let before = app.selected;
            app.select_next();
            if app.selected != before {
                app.mark_dirty();
            }
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let before = app.selected;
            app.select_previous();
            if app.selected != before {
                app.mark_dirty();
            }
        }
        KeyCode::Enter => drive_viewer(app, ViewerInput::Select(app.selected)),
        KeyCode::Char('a') => {
            app.open_prompt();
            app.mark_dirty();
        }
        _ => {}
    }
    None
}

/// Feed one input to the viewer and keep the list selection on its cursor.
fn drive_viewer(app: &mut App, input: ViewerInput) {
    let transition = app.viewer.handle(input);
    app.note(transition);
    if let Some(i) = app.viewer.index() {
        app.selected = i;
    }
}

fn handle_prompt_key(app: &mut App, key: KeyEvent) -> Option<Command> {
    app.mark_dirty();
    let prompt = app.prompt.as_mut()?;

    match key.code {
        KeyCode::Esc => {
            app.prompt = None;
        }
        KeyCode::Enter => match prompt.field {
            PromptField::Source => prompt.field = PromptField::Caption,
            PromptField::Caption => {
                let source = prompt.source.trim().to_string();
                let caption = prompt.caption.clone();
                app.prompt = None;

                if source.is_empty() {
                    app.notify(Notice::failure("no image source", Instant::now()));
                    return None;
                }
                app.uploads_in_flight += 1;
                return Some(Command::Upload { source, caption });
            }
        },
        KeyCode::Tab | KeyCode::BackTab => {
            prompt.field = match prompt.field {
                PromptField::Source => PromptField::Caption,
                PromptField::Caption => PromptField::Source,
            };
        }
        KeyCode::Backspace => {
            prompt.active_text_mut().pop();
        }
        KeyCode::Char(c) => prompt.active_text_mut().push(c),
        _ => {}
    }
    None
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if !app.viewer.is_open() {
        return;
    }

    let x = f64::from(mouse.column) * PIXELS_PER_CELL;
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let inside = app.viewer_area.contains(Position::new(mouse.column, mouse.row));
            if inside {
                app.viewer.pointer_down(x);
            } else {
                drive_viewer(app, ViewerInput::Dismiss);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => app.viewer.pointer_move(x),
        MouseEventKind::Up(MouseButton::Left) => {
            let transition = app.viewer.pointer_up();
            app.note(transition);
            if let Some(i) = app.viewer.index() {
                app.selected = i;
            }
        }
        _ => {}
    }
}
