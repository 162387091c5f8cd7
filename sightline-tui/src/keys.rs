//! Keybinding definitions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    RunQuery,
    NextPane,
    PrevPane,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    ToggleCell,
    ToggleDetailRow,
    CloseDetail,
    SortColumn,
    MoveColumnLeft,
    MoveColumnRight,
    ResolveCell,
    ResolveSelected,
    ResolveColumn,
    Export,
    Confirm,
    Decline,
    Cancel,
}

/// Bindings while the grid has focus.
pub fn map_key(event: KeyEvent) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return control_action(code);
    }

    match code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Tab => Some(Action::NextPane),
        KeyCode::BackTab => Some(Action::PrevPane),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::MoveLeft),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::MoveRight),
        KeyCode::Char(' ') => Some(Action::ToggleCell),
        KeyCode::Char('d') => Some(Action::ToggleDetailRow),
        KeyCode::Char('x') => Some(Action::CloseDetail),
        KeyCode::Char('s') => Some(Action::SortColumn),
        KeyCode::Char('<') | KeyCode::Char('H') => Some(Action::MoveColumnLeft),
        KeyCode::Char('>') | KeyCode::Char('L') => Some(Action::MoveColumnRight),
        KeyCode::Char('r') => Some(Action::ResolveCell),
        KeyCode::Char('R') => Some(Action::ResolveSelected),
        KeyCode::Char('c') => Some(Action::ResolveColumn),
        KeyCode::Char('e') => Some(Action::Export),
        KeyCode::Char('y') | KeyCode::Enter => Some(Action::Confirm),
        KeyCode::Char('n') => Some(Action::Decline),
        KeyCode::Esc => Some(Action::Cancel),
        _ => None,
    }
}

/// Bindings while the query editor has focus. Anything unmapped is text input.
pub fn map_editor_key(event: KeyEvent) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return control_action(code);
    }

    match code {
        KeyCode::Tab => Some(Action::NextPane),
        KeyCode::BackTab => Some(Action::PrevPane),
        KeyCode::Esc => Some(Action::Cancel),
        _ => None,
    }
}

fn control_action(code: KeyCode) -> Option<Action> {
    match code {
        KeyCode::Char('c') => Some(Action::Quit),
        KeyCode::Char('r') => Some(Action::RunQuery),
        _ => None,
    }
}
