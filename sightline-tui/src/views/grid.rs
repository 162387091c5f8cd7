//! Result grid view.

use crate::nav::Pane;
use crate::state::App;
use crate::theme;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell as TableCell, Row, Table, TableState},
    Frame,
};
use sightline_core::CellRef;
use std::ops::Range;
use std::time::Instant;

const MAX_COLUMN_WIDTH: usize = 32;
const MIN_COLUMN_WIDTH: usize = 4;

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect, now: Instant) {
    let focused = app.pane == Pane::Grid;
    let block = Block::default()
        .title(Pane::Grid.title())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            app.theme.border_focus
        } else {
            app.theme.border
        }));

    let model = app.engine.model();
    if model.column_count() == 0 {
        let empty = ratatui::widgets::Paragraph::new("Run a query to see results")
            .style(Style::default().fg(app.theme.text_dim))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let widths = column_widths(app);
    let inner_width = block.inner(area).width as usize;
    let visible = visible_columns(&widths, app.cursor.col, inner_width);

    let header = Row::new(visible.clone().map(|col| {
        let name = model.column(col).map(|c| c.name.as_str()).unwrap_or_default();
        let label = match app.sort_indicator(col) {
            Some(arrow) => format!("{name} {arrow}"),
            None => name.to_string(),
        };
        let mut style = Style::default().fg(app.theme.primary).add_modifier(Modifier::BOLD);
        if app.engine.link_for_resolved(col).is_some() {
            style = style.fg(app.theme.accent);
        } else if app.engine.offers_resolution(col) {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        TableCell::from(Span::styled(label, style))
    }));

    let detail_rows = app.engine.selection().detail_rows();
    let rows = model.rows().iter().enumerate().map(|(r, cells)| {
        let row_cells = visible.clone().map(|col| {
            let cell = &cells[col];
            let at = CellRef::new(r, col);
            let mut style = theme::animated_style(
                cell,
                &app.engine.animation(at),
                now,
                app.engine.timings(),
                &app.theme,
            );
            if app.engine.selection().is_cell_selected(at) {
                style = style.bg(app.theme.bg_selected);
            }
            if focused && at == app.cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            TableCell::from(Span::styled(cell.display_text().into_owned(), style))
        });
        let row = Row::new(row_cells);
        if detail_rows.contains(&r) {
            row.style(Style::default().bg(app.theme.bg_highlight))
        } else {
            row
        }
    });

    let constraints: Vec<Constraint> = visible
        .clone()
        .map(|col| Constraint::Length(widths[col] as u16))
        .collect();
    let table = Table::new(rows, constraints)
        .header(header)
        .block(block)
        .column_spacing(1);

    let mut state = TableState::default();
    if model.row_count() > 0 {
        state.select(Some(app.cursor.row.min(model.row_count() - 1)));
    }
    f.render_stateful_widget(table, area, &mut state);
}

/// Display width of each column: widest of header and cells, clamped.
pub fn column_widths(app: &App) -> Vec<usize> {
    let model = app.engine.model();
    (0..model.column_count())
        .map(|col| {
            let header = model.column(col).map(|c| c.name.chars().count() + 2).unwrap_or(0);
            let widest = model
                .rows()
                .iter()
                .map(|row| row[col].display_text().chars().count())
                .max()
                .unwrap_or(0);
            header.max(widest).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Contiguous run of columns that fits in `available` and contains `cursor`.
pub fn visible_columns(widths: &[usize], cursor: usize, available: usize) -> Range<usize> {
    if widths.is_empty() {
        return 0..0;
    }
    let cursor = cursor.min(widths.len() - 1);
    let span = |range: Range<usize>| widths[range.clone()].iter().sum::<usize>() + range.len().saturating_sub(1);

    let mut start = 0;
    while start < cursor && span(start..cursor + 1) > available {
        start += 1;
    }
    let mut end = cursor + 1;
    while end < widths.len() && span(start..end + 1) <= available {
        end += 1;
    }
    start..end
}
