//! Query editor pane.

use crate::nav::Pane;
use crate::state::App;
use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

pub fn render(f: &mut Frame<'_>, app: &App, area: Rect) {
    let focused = app.pane == Pane::Editor;
    let border = if focused {
        app.theme.border_focus
    } else {
        app.theme.border
    };
    let block = Block::default()
        .title(Pane::Editor.title())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));

    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(&app.editor, inner);
}
