//! Focus handling between the query editor and the result grid.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pane {
    Editor,
    Grid,
}

impl Pane {
    pub fn title(&self) -> &'static str {
        match self {
            Pane::Editor => "Query",
            Pane::Grid => "Results",
        }
    }

    pub fn all() -> &'static [Pane] {
        &[Pane::Editor, Pane::Grid]
    }

    pub fn index(&self) -> usize {
        Self::all().iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Pane {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> Pane {
        let all = Self::all();
        all[(self.index() + all.len() - 1) % all.len()]
    }
}
