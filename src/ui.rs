//! Rendering for the gallery viewer.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, NoticeKind, PromptField};
use crate::model::Entry;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Gallery
            Constraint::Length(1), // Notice / shortcuts
        ])
        .split(area);

    render_header(frame, app, chunks[0]);

    if app.is_loading() {
        render_centered(frame, chunks[1], "Loading gallery...", Style::default().fg(Color::DarkGray));
    } else if app.entries().is_empty() {
        render_centered(
            frame,
            chunks[1],
            "No photos yet. Press 'a' to add one.",
            Style::default().fg(Color::DarkGray),
        );
    } else {
        render_gallery(frame, app, chunks[1]);
    }

    render_footer(frame, app, chunks[2]);

    if app.viewer.is_open() {
        app.viewer_area = viewer_area(area);
        render_viewer(frame, app, app.viewer_area);
    }

    if app.prompt.is_some() {
        render_prompt(frame, app, area);
    }
}

/// Rectangle the full-screen viewer occupies for a given terminal size.
pub fn viewer_area(area: Rect) -> Rect {
    centered_rect(80, 70, area)
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        " ZarVault",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    if !app.is_loading() {
        spans.push(Span::styled(
            format!("  {} photos", app.entries().len()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(fetched_at) = app.snapshot.fetched_at {
        spans.push(Span::styled(
            format!("  synced {}", fetched_at.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if app.uploads_in_flight > 0 {
        spans.push(Span::styled(
            format!("  uploading ({})", app.uploads_in_flight),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_centered(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(1),
            Constraint::Percentage(45),
        ])
        .split(area);

    frame.render_widget(
        Paragraph::new(text).style(style).alignment(Alignment::Center),
        rows[1],
    );
}

fn render_gallery(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app.entries().iter().map(gallery_item).collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Gallery "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn gallery_item(entry: &Entry) -> ListItem<'static> {
    let caption = match entry.display_caption() {
        Some(caption) => Span::raw(caption.to_string()),
        None => Span::styled("(no caption)", Style::default().fg(Color::DarkGray)),
    };

    ListItem::new(vec![
        Line::from(vec![
            caption,
            Span::styled(
                format!("  {}", entry.display_date()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(Span::styled(
            format!("  {}", entry.image_ref),
            Style::default().fg(Color::Blue),
        )),
    ])
}

fn render_viewer(frame: &mut Frame, app: &App, area: Rect) {
    let Some(entry) = app.viewed_entry() else {
        return;
    };

    let title = match app.viewer.position() {
        Some((i, n)) => format!(" {i} of {n} "),
        None => String::new(),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            entry.image_ref.clone(),
            Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        )),
        Line::from(""),
    ];
    if let Some(caption) = entry.display_caption() {
        lines.push(Line::from(Span::styled(
            caption.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(Span::styled(
        entry.display_date(),
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "<- / -> or drag to browse, Esc or click outside to close",
        Style::default().fg(Color::DarkGray),
    )));

    let viewer = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .title(title)
                .title_alignment(Alignment::Center),
        );

    frame.render_widget(Clear, area);
    frame.render_widget(viewer, area);
}

fn render_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = &app.prompt else {
        return;
    };

    let field = |label: &str, value: &str, focused: bool| {
        let style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let cursor = if focused { "_" } else { "" };
        Line::from(vec![
            Span::styled(format!("{label:>9}: "), style),
            Span::raw(format!("{value}{cursor}")),
        ])
    };

    let lines = vec![
        field("URL/path", &prompt.source, prompt.field == PromptField::Source),
        field("Caption", &prompt.caption, prompt.field == PromptField::Caption),
        Line::from(""),
        Line::from(Span::styled(
            "Enter: next/submit  Tab: switch field  Esc: cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let popup = centered_rect(60, 20, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Add image "),
        ),
        popup,
    );
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.notice {
        Some(notice) => {
            let color = match notice.kind {
                NoticeKind::Success => Color::Green,
                NoticeKind::Failure => Color::Red,
            };
            Line::from(Span::styled(format!(" {}", notice.text), Style::default().fg(color)))
        }
        None => Line::from(Span::styled(
            " Up/Down select  Enter view  a add  q quit",
            Style::default().fg(Color::DarkGray),
        )),
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(rows[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ClientSnapshot;
    use chrono::DateTime;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    fn snapshot(entries: Vec<Entry>, loading: bool) -> ClientSnapshot {
        ClientSnapshot {
            entries: Arc::new(entries),
            revision: 0,
            fetched_at: None,
            loading,
        }
    }

    #[test]
    fn test_loading_and_empty_states() {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();

        let mut app = App::new(snapshot(Vec::new(), true));
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("Loading gallery"));

        app.apply_snapshot(snapshot(Vec::new(), false));
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(buffer_text(&terminal).contains("No photos yet"));
    }

    #[test]
    fn test_viewer_overlay_shows_position() {
        let entries = vec![
            Entry {
                id: crate::model::EntryId::generate(),
                image_ref: "https://x/a.jpg".to_string(),
                caption: Some("hi".to_string()),
                created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            },
            Entry {
                id: crate::model::EntryId::generate(),
                image_ref: "https://x/b.jpg".to_string(),
                caption: None,
                created_at: DateTime::from_timestamp(1_699_999_000, 0).unwrap(),
            },
        ];
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut app = App::new(snapshot(entries, false));
        app.viewer.select(1);

        terminal.draw(|f| draw(f, &mut app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("2 of 2"));
        assert!(text.contains("https://x/b.jpg"));
        assert_eq!(app.viewer_area, viewer_area(Rect::new(0, 0, 80, 24)));
    }
}
