//! Result status bar.

use crate::state::App;
use crate::widgets::StatusBar;
use ratatui::{layout::Rect, style::Style, Frame};

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect) {
    status_bar(app).render(f, area);
}

pub fn status_bar(app: &App) -> StatusBar {
    let model = app.engine.model();
    let text = Style::default().fg(app.theme.text);
    let dim = Style::default().fg(app.theme.text_dim);

    let mut segments = Vec::new();
    if model.column_count() == 0 {
        segments.push(("No results".to_string(), dim));
    } else {
        segments.push((format!("{} records", model.total_records()), text));
        segments.push((model.timestamp().format("%Y-%m-%d %H:%M:%S UTC").to_string(), dim));
        segments.push((format!("{} ms", model.execution_time_ms()), dim));
        segments.push((
            format!("Cell {},{}", app.cursor.row + 1, app.cursor.col + 1),
            dim,
        ));
    }
    let selected = app.engine.selection().cell_count();
    if selected > 0 {
        segments.push((format!("{selected} selected"), Style::default().fg(app.theme.accent)));
    }
    if let Some(table) = &app.last_export {
        segments.push((
            format!("Export {}x{}", table.rows.len(), table.headers.len()),
            dim,
        ));
    }
    StatusBar {
        segments,
        separator_style: Style::default().fg(app.theme.text_muted),
    }
}
