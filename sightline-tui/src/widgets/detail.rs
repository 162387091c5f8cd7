//! Field/value panel for a single row.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// One field: headline value plus optional indented supplementary lines.
pub struct DetailLine {
    pub label: String,
    pub value: String,
    pub value_style: Style,
    pub notes: Vec<String>,
}

pub struct DetailPanel<'a> {
    pub title: &'a str,
    pub lines: Vec<DetailLine>,
    pub label_style: Style,
    pub note_style: Style,
}

impl<'a> DetailPanel<'a> {
    pub fn text(&self) -> Text<'_> {
        let width = self
            .lines
            .iter()
            .map(|l| l.label.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = Vec::new();
        for line in &self.lines {
            out.push(Line::from(vec![
                Span::styled(format!("{:<width$}  ", line.label), self.label_style),
                Span::styled(line.value.as_str(), line.value_style),
            ]));
            for note in &line.notes {
                out.push(Line::from(Span::styled(
                    format!("{:<width$}    {}", "", note),
                    self.note_style,
                )));
            }
        }
        Text::from(out)
    }

    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let widget = Paragraph::new(self.text())
            .block(Block::default().title(self.title).borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        f.render_widget(widget, area);
    }
}
