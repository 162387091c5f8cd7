//! Detail panel: one row's fields, or a comparison of several rows.

use crate::state::App;
use crate::theme;
use crate::widgets::{DetailLine, DetailPanel};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell as TableCell, Paragraph, Row, Table},
    Frame,
};
use sightline_core::{Cell, ComparisonView, DetailView};

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect) {
    match app.engine.detail_view() {
        Ok(DetailView::Closed) => {}
        Ok(DetailView::Single { row, fields }) => {
            let title = format!("Row {}", row + 1);
            let panel = DetailPanel {
                title: &title,
                lines: fields
                    .into_iter()
                    .map(|field| DetailLine {
                        value_style: Style::default().fg(theme::cell_color(&field.value, &app.theme)),
                        value: field.value.display_text().into_owned(),
                        notes: badge_notes(&field.value),
                        label: field.name,
                    })
                    .collect(),
                label_style: Style::default().fg(app.theme.primary_dim),
                note_style: Style::default().fg(app.theme.text_dim),
            };
            panel.render(f, area);
        }
        Ok(DetailView::Comparison(view)) => render_comparison(f, app, area, &view),
        Err(err) => {
            let message = Paragraph::new(err.to_string())
                .style(Style::default().fg(app.theme.error))
                .block(Block::default().title("Details").borders(Borders::ALL));
            f.render_widget(message, area);
        }
    }
}

/// Supplementary badge detail, one entry per line.
fn badge_notes(cell: &Cell) -> Vec<String> {
    match cell {
        Cell::Resolved(badge) | Cell::Failed(badge) => {
            badge.detail.lines().map(str::to_string).collect()
        }
        _ => Vec::new(),
    }
}

fn render_comparison(f: &mut Frame<'_>, app: &App, area: Rect, view: &ComparisonView) {
    let header = Row::new(
        std::iter::once("Property".to_string())
            .chain(view.rows.iter().map(|r| format!("Row {}", r + 1)))
            .map(|label| TableCell::from(Span::styled(label, Style::default().fg(app.theme.primary)))),
    );

    let rows = view.properties.iter().map(|property| {
        let name_style = if property.all_match {
            Style::default().fg(app.theme.text_dim)
        } else {
            Style::default().fg(app.theme.mismatch).add_modifier(Modifier::BOLD)
        };
        let cells = std::iter::once(TableCell::from(Span::styled(property.name.clone(), name_style)))
            .chain(property.values.iter().map(|value| {
                let mut style = Style::default().fg(theme::cell_color(value, &app.theme));
                if !property.all_match {
                    style = style.bg(app.theme.bg_highlight);
                }
                TableCell::from(Span::styled(value.display_text().into_owned(), style))
            }));
        Row::new(cells)
    });

    let value_width = (100 / view.rows.len().max(1) as u16).max(10);
    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(18))
        .chain(view.rows.iter().map(|_| Constraint::Percentage(value_width)))
        .collect();

    let title = format!(
        "Compare {} rows | {} differing",
        view.rows.len(),
        view.mismatch_count()
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .column_spacing(1);
    f.render_widget(table, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::Badge;

    #[test]
    fn test_badge_notes_split_detail() {
        let cell = Cell::Failed(Badge {
            text: "Not found".to_string(),
            detail: "user: missing\ngroup: denied".to_string(),
        });
        assert_eq!(badge_notes(&cell), vec!["user: missing", "group: denied"]);
        assert!(badge_notes(&Cell::Loading).is_empty());
    }
}
