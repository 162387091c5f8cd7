//! Selected cells and selected detail rows.

use crate::cell::Cell;
use crate::model::{ColumnRemap, Permutation, ResultModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Position of a cell in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// What the secondary view is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailMode {
    Closed,
    Single(usize),
    Comparison(Vec<usize>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    cells: BTreeSet<CellRef>,
    detail_rows: Vec<usize>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------------

    pub fn selected_cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        self.cells.iter().copied()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_cell_selected(&self, cell: CellRef) -> bool {
        self.cells.contains(&cell)
    }

    /// Returns whether the cell is selected afterwards.
    pub fn toggle_cell(&mut self, cell: CellRef) -> bool {
        if self.cells.remove(&cell) {
            false
        } else {
            self.cells.insert(cell);
            true
        }
    }

    pub fn select_cell(&mut self, cell: CellRef) {
        self.cells.insert(cell);
    }

    pub fn clear_cells(&mut self) {
        self.cells.clear();
    }

    /// The shared column if every selected cell sits in the same one.
    pub fn single_column(&self) -> Option<usize> {
        let mut cols = self.cells.iter().map(|c| c.col);
        let first = cols.next()?;
        cols.all(|c| c == first).then_some(first)
    }

    pub fn remap_cell_rows(&mut self, permutation: &Permutation) {
        self.cells = self
            .cells
            .iter()
            .map(|c| CellRef::new(permutation.apply(c.row), c.col))
            .collect();
    }

    pub fn remap_cell_columns(&mut self, remap: &ColumnRemap) {
        self.cells = self
            .cells
            .iter()
            .map(|c| CellRef::new(c.row, remap.apply(c.col)))
            .collect();
    }

    // ------------------------------------------------------------------------
    // Detail rows
    // ------------------------------------------------------------------------

    pub fn detail_rows(&self) -> &[usize] {
        &self.detail_rows
    }

    pub fn detail_mode(&self) -> DetailMode {
        match self.detail_rows.as_slice() {
            [] => DetailMode::Closed,
            [row] => DetailMode::Single(*row),
            rows => DetailMode::Comparison(rows.to_vec()),
        }
    }

    /// Add or remove a row from the detail view, keeping selection order.
    pub fn toggle_detail_row(&mut self, row: usize) -> bool {
        if let Some(pos) = self.detail_rows.iter().position(|&r| r == row) {
            self.detail_rows.remove(pos);
            false
        } else {
            self.detail_rows.push(row);
            true
        }
    }

    pub fn set_detail_rows(&mut self, rows: impl IntoIterator<Item = usize>) {
        self.detail_rows.clear();
        for row in rows {
            if !self.detail_rows.contains(&row) {
                self.detail_rows.push(row);
            }
        }
    }

    pub fn close_detail(&mut self) {
        self.detail_rows.clear();
    }

    /// Full content of every detail row, in selection order.
    pub fn snapshot_detail_rows(&self, model: &ResultModel) -> Vec<Vec<Cell>> {
        self.detail_rows
            .iter()
            .filter_map(|&row| model.row(row).map(<[Cell]>::to_vec))
            .collect()
    }

    /// Re-find each snapshot row in `model` by exact content equality.
    ///
    /// Duplicate rows claim distinct positions in order; snapshots that match
    /// nothing are dropped.
    pub fn remap_detail_rows(&mut self, snapshot: &[Vec<Cell>], model: &ResultModel) {
        let mut claimed = BTreeSet::new();
        let mut remapped = Vec::with_capacity(snapshot.len());
        for content in snapshot {
            let found = model
                .rows()
                .iter()
                .enumerate()
                .find(|(idx, row)| !claimed.contains(idx) && row.as_slice() == content.as_slice())
                .map(|(idx, _)| idx);
            if let Some(idx) = found {
                claimed.insert(idx);
                remapped.push(idx);
            }
        }
        self.detail_rows = remapped;
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.detail_rows.clear();
    }
}
