//! One-line status bar built from styled segments.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub struct StatusBar {
    pub segments: Vec<(String, Style)>,
    pub separator_style: Style,
}

impl StatusBar {
    pub fn line(&self) -> Line<'_> {
        let mut spans = Vec::with_capacity(self.segments.len() * 2);
        for (i, (text, style)) in self.segments.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" | ", self.separator_style));
            }
            spans.push(Span::styled(text.as_str(), *style));
        }
        Line::from(spans)
    }

    pub fn render(&self, f: &mut Frame<'_>, area: Rect) {
        let paragraph = Paragraph::new(self.line()).block(Block::default().borders(Borders::TOP));
        f.render_widget(paragraph, area);
    }
}
