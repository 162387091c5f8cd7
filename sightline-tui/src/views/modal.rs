//! Confirmation and error modals drawn over the main layout.

use super::centered;
use crate::api_client::QueryFailure;
use crate::state::App;
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub fn render(f: &mut Frame<'_>, app: &App) {
    let (title, text, color) = if let Some(pending) = &app.pending_confirmation {
        let text = Text::from(vec![
            Line::from(pending.message()),
            Line::from(""),
            Line::from(Span::styled(
                "[y] resolve   [n] cancel",
                Style::default().fg(app.theme.text_dim),
            )),
        ]);
        ("Confirm resolution".to_string(), text, app.theme.warning)
    } else if let Some(failure) = &app.query_error {
        ("Query failed".to_string(), failure_text(failure, app), app.theme.error)
    } else if let Some(modal) = &app.modal {
        (modal.title.clone(), Text::from(modal.message.clone()), app.theme.info)
    } else {
        return;
    };

    let area = centered(f.size(), 70, 14);
    f.render_widget(Clear, area);
    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(color)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(paragraph, area);
}

/// Headline followed by one section per failure detail.
pub fn failure_text<'a>(failure: &'a QueryFailure, app: &App) -> Text<'a> {
    let mut lines = vec![Line::from(Span::styled(
        failure.message.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for detail in &failure.details {
        lines.push(Line::from(""));
        let location = detail
            .position
            .map(|p| format!(" at line {}, column {}", p.line, p.column))
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("{}{}", detail.code, location),
            Style::default().fg(app.theme.warning),
        )));
        lines.push(Line::from(detail.message.as_str()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "[Esc] dismiss",
        Style::default().fg(app.theme.text_dim),
    )));
    Text::from(lines)
}
