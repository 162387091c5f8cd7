//! View rendering dispatch.

pub mod detail;
pub mod editor;
pub mod grid;
pub mod modal;
pub mod status;

use crate::nav::Pane;
use crate::notifications::NotificationLevel;
use crate::state::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Span,
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::time::Instant;

pub fn render_view(f: &mut Frame<'_>, app: &App, now: Instant) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Min(0),
            Constraint::Length(2),
            Constraint::Length(3),
        ])
        .split(f.size());

    render_header(f, app, layout[0]);
    editor::render(f, app, layout[1]);

    if app.engine.selection().detail_rows().is_empty() {
        grid::render(f, app, layout[2], now);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(layout[2]);
        grid::render(f, app, body[0], now);
        detail::render(f, app, body[1]);
    }

    status::render(f, app, layout[3]);
    render_footer(f, app, layout[4]);
    modal::render(f, app);
}

fn render_header(f: &mut Frame<'_>, app: &App, area: Rect) {
    let activity = match (app.query_running, app.engine.in_flight()) {
        (true, _) => "Query running".to_string(),
        (false, 0) => "Idle".to_string(),
        (false, n) => format!("Resolving ({n})"),
    };
    let title = format!(
        "Sightline | Scope: {} | {} | {}",
        app.scope,
        app.pane.title(),
        activity
    );
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        title,
        Style::default().fg(app.theme.primary),
    ));
    f.render_widget(block, area);
}

fn render_footer(f: &mut Frame<'_>, app: &App, area: Rect) {
    let help = match app.pane {
        Pane::Editor => "Ctrl-r run • Tab/Esc grid • Ctrl-c quit",
        Pane::Grid => {
            "h/j/k/l move • space select • d detail • s sort • </> move col • r/R/c resolve • e export • q quit"
        }
    };
    let (text, style) = if let Some(note) = app.notifications.last() {
        let color = match note.level {
            NotificationLevel::Info => app.theme.info,
            NotificationLevel::Warning => app.theme.warning,
            NotificationLevel::Error => app.theme.error,
            NotificationLevel::Success => app.theme.success,
        };
        (format!("{}: {}", note.level.label(), note.message), Style::default().fg(color))
    } else {
        (help.to_string(), Style::default().fg(app.theme.text_dim))
    };
    let footer = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(footer, area);
}

/// A rectangle of `width` x `height` centered in `area`, clipped to it.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
