//! The canonical result grid: columns, rows, sort state and column order.

use crate::cell::Cell;
use crate::error::{GridError, GridResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default)]
    pub width: Option<u16>,
}

impl Column {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            width: None,
        }
    }
}

/// A completed query as returned by the query-execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    pub total_records: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub execution_time_ms: u64,
}

// ============================================================================
// INDEX TRANSLATION
// ============================================================================

/// A bijection from old positions to new positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    new_of_old: Vec<usize>,
}

impl Permutation {
    /// Build from a sorted order where `order[new] == old`.
    pub fn from_order(order: &[usize]) -> Self {
        let mut new_of_old = vec![0; order.len()];
        for (new, &old) in order.iter().enumerate() {
            new_of_old[old] = new;
        }
        Self { new_of_old }
    }

    /// The permutation produced by removing `from` and reinserting it at `to`.
    pub fn move_one(len: usize, from: usize, to: usize) -> Self {
        let new_of_old = (0..len)
            .map(|old| {
                if old == from {
                    to
                } else if from < to && old > from && old <= to {
                    old - 1
                } else if to < from && old >= to && old < from {
                    old + 1
                } else {
                    old
                }
            })
            .collect();
        Self { new_of_old }
    }

    pub fn len(&self) -> usize {
        self.new_of_old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_of_old.is_empty()
    }

    /// New position of `old`. Out-of-range indices map to themselves.
    pub fn apply(&self, old: usize) -> usize {
        self.new_of_old.get(old).copied().unwrap_or(old)
    }

    /// Reorder `items` so that `items[old]` ends up at `apply(old)`.
    pub fn permute<T>(&self, items: Vec<T>) -> Vec<T> {
        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(items.len()).collect();
        for (old, item) in items.into_iter().enumerate() {
            slots[self.apply(old)] = Some(item);
        }
        slots.into_iter().flatten().collect()
    }
}

/// How stored column indices change after a structural column edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRemap {
    Permute(Permutation),
    /// A column was inserted at this index; everything at or after it shifts right.
    Insert(usize),
}

impl ColumnRemap {
    pub fn apply(&self, old: usize) -> usize {
        match self {
            ColumnRemap::Permute(permutation) => permutation.apply(old),
            ColumnRemap::Insert(at) if old >= *at => old + 1,
            ColumnRemap::Insert(_) => old,
        }
    }
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    pub column: Option<usize>,
    pub direction: SortDirection,
}

enum SortKey {
    Null,
    Value { number: Option<f64>, text: String },
}

fn sort_key(cell: &Cell) -> SortKey {
    match cell {
        Cell::Raw(Value::Null) | Cell::Empty | Cell::Loading => SortKey::Null,
        Cell::Raw(Value::Number(n)) => SortKey::Value {
            number: n.as_f64(),
            text: n.to_string(),
        },
        other => {
            let text = other.display_text();
            SortKey::Value {
                number: text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                text: text.to_lowercase(),
            }
        }
    }
}

/// Ascending order: numerically when both sides parse as numbers, otherwise
/// case-insensitive text. A number sorts before text it is compared with so the
/// order stays total. Nulls sort after everything, so a descending sort puts
/// them first.
pub fn compare_cells(a: &Cell, b: &Cell) -> Ordering {
    match (sort_key(a), sort_key(b)) {
        (SortKey::Null, SortKey::Null) => Ordering::Equal,
        (SortKey::Null, _) => Ordering::Greater,
        (_, SortKey::Null) => Ordering::Less,
        (
            SortKey::Value {
                number: Some(x), ..
            },
            SortKey::Value {
                number: Some(y), ..
            },
        ) => x.total_cmp(&y),
        (SortKey::Value { number: Some(_), .. }, SortKey::Value { number: None, .. }) => {
            Ordering::Less
        }
        (SortKey::Value { number: None, .. }, SortKey::Value { number: Some(_), .. }) => {
            Ordering::Greater
        }
        (SortKey::Value { text: x, .. }, SortKey::Value { text: y, .. }) => x.cmp(&y),
    }
}

// ============================================================================
// RESULT MODEL
// ============================================================================

/// Flat row/column structure handed to exporters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultModel {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
    sort: SortState,
    total_records: u64,
    timestamp: DateTime<Utc>,
    execution_time_ms: u64,
}

impl Default for ResultModel {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            sort: SortState::default(),
            total_records: 0,
            timestamp: DateTime::<Utc>::default(),
            execution_time_ms: 0,
        }
    }
}

impl ResultModel {
    /// Build a model from a query result, rejecting ragged rows.
    pub fn from_query(result: QueryResult) -> GridResult<Self> {
        let width = result.columns.len();
        if let Some((row, cells)) = result
            .rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != width)
        {
            return Err(GridError::ShapeMismatch {
                row,
                expected: width,
                found: cells.len(),
            });
        }
        let rows = result
            .rows
            .into_iter()
            .map(|cells| cells.into_iter().map(Cell::Raw).collect())
            .collect();
        Ok(Self {
            columns: result.columns,
            rows,
            sort: SortState::default(),
            total_records: result.total_records,
            timestamp: result.timestamp,
            execution_time_ms: result.execution_time_ms,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Raw values of one column; non-raw cells read as null.
    pub fn column_values(&self, col: usize) -> Vec<&Value> {
        const NULL: &Value = &Value::Null;
        self.rows
            .iter()
            .map(|cells| cells.get(col).and_then(Cell::raw).unwrap_or(NULL))
            .collect()
    }

    pub fn position_of_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn check_column(&self, col: usize) -> GridResult<()> {
        if col < self.columns.len() {
            Ok(())
        } else {
            Err(GridError::ColumnOutOfBounds {
                index: col,
                count: self.columns.len(),
            })
        }
    }

    pub fn check_row(&self, row: usize) -> GridResult<()> {
        if row < self.rows.len() {
            Ok(())
        } else {
            Err(GridError::RowOutOfBounds {
                index: row,
                count: self.rows.len(),
            })
        }
    }

    /// Only the cell updater writes cell content.
    pub(crate) fn set_cell(&mut self, row: usize, col: usize, value: Cell) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(col)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Sort by `col` in the given direction. Returns the row permutation.
    pub fn sort_by(&mut self, col: usize, direction: SortDirection) -> GridResult<Permutation> {
        self.check_column(col)?;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            let ordering = compare_cells(&self.rows[a][col], &self.rows[b][col]);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        let permutation = Permutation::from_order(&order);
        let rows = std::mem::take(&mut self.rows);
        self.rows = permutation.permute(rows);
        self.sort = SortState {
            column: Some(col),
            direction,
        };
        debug!(column = col, ?direction, "Sorted result rows");
        Ok(permutation)
    }

    /// Sort by `col`, flipping direction when it is already the sort column.
    pub fn toggle_sort(&mut self, col: usize) -> GridResult<Permutation> {
        let direction = match self.sort.column {
            Some(current) if current == col => self.sort.direction.toggled(),
            _ => SortDirection::Ascending,
        };
        self.sort_by(col, direction)
    }

    /// Move column `from` to position `to`, carrying every row's cell along.
    pub fn reorder_column(&mut self, from: usize, to: usize) -> GridResult<Permutation> {
        self.check_column(from)?;
        self.check_column(to)?;
        let permutation = Permutation::move_one(self.columns.len(), from, to);
        let columns = std::mem::take(&mut self.columns);
        self.columns = permutation.permute(columns);
        for cells in &mut self.rows {
            let taken = std::mem::take(cells);
            *cells = permutation.permute(taken);
        }
        self.sort.column = self.sort.column.map(|c| permutation.apply(c));
        debug!(from, to, "Reordered column");
        Ok(permutation)
    }

    /// Insert a column at `at` with every row's new cell set to `fill`.
    pub(crate) fn insert_column(&mut self, at: usize, column: Column, fill: Cell) -> ColumnRemap {
        let at = at.min(self.columns.len());
        self.columns.insert(at, column);
        for cells in &mut self.rows {
            cells.insert(at, fill.clone());
        }
        let remap = ColumnRemap::Insert(at);
        self.sort.column = self.sort.column.map(|c| remap.apply(c));
        remap
    }

    pub fn export_table(&self) -> ExportTable {
        ExportTable {
            headers: self.columns.iter().map(|c| c.name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|cells| cells.iter().map(|c| c.display_text().into_owned()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(rows: Vec<Vec<Value>>) -> ResultModel {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        ResultModel::from_query(QueryResult {
            columns: (0..width).map(|i| Column::new(format!("c{i}"), "string")).collect(),
            rows,
            total_records: 0,
            timestamp: Utc::now(),
            execution_time_ms: 0,
        })
        .unwrap()
    }

    fn column_text(model: &ResultModel, col: usize) -> Vec<String> {
        model
            .rows()
            .iter()
            .map(|r| r[col].display_text().into_owned())
            .collect()
    }

    #[test]
    fn test_from_query_rejects_ragged_rows() {
        let err = ResultModel::from_query(QueryResult {
            columns: vec![Column::new("a", "string"), Column::new("b", "string")],
            rows: vec![vec![json!(1), json!(2)], vec![json!(1)]],
            total_records: 2,
            timestamp: Utc::now(),
            execution_time_ms: 0,
        })
        .unwrap_err();
        assert_eq!(
            err,
            GridError::ShapeMismatch {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_sort_numeric_strings_numerically() {
        let mut m = model(vec![vec![json!("10")], vec![json!("9")], vec![json!(100)]]);
        m.sort_by(0, SortDirection::Ascending).unwrap();
        assert_eq!(column_text(&m, 0), vec!["9", "10", "100"]);
    }

    #[test]
    fn test_sort_text_case_insensitive() {
        let mut m = model(vec![vec![json!("beta")], vec![json!("Alpha")], vec![json!("gamma")]]);
        m.sort_by(0, SortDirection::Ascending).unwrap();
        assert_eq!(column_text(&m, 0), vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_sort_mixed_numbers_before_text() {
        let mut m = model(vec![vec![json!("b")], vec![json!(10)], vec![json!("9")], vec![json!("A")]]);
        m.sort_by(0, SortDirection::Ascending).unwrap();
        assert_eq!(column_text(&m, 0), vec!["9", "10", "A", "b"]);
    }

    #[test]
    fn test_sort_nulls_follow_direction() {
        let mut m = model(vec![vec![Value::Null], vec![json!(2)], vec![json!(1)]]);
        m.sort_by(0, SortDirection::Ascending).unwrap();
        assert_eq!(column_text(&m, 0), vec!["1", "2", ""]);
        m.sort_by(0, SortDirection::Descending).unwrap();
        assert_eq!(column_text(&m, 0), vec!["", "2", "1"]);
    }

    #[test]
    fn test_toggle_sort_alternates_direction() {
        let mut m = model(vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);
        m.toggle_sort(0).unwrap();
        assert_eq!(m.sort_state().direction, SortDirection::Ascending);
        m.toggle_sort(0).unwrap();
        assert_eq!(m.sort_state().direction, SortDirection::Descending);
        m.toggle_sort(0).unwrap();
        assert_eq!(m.sort_state().direction, SortDirection::Ascending);
        m.toggle_sort(1).unwrap();
        assert_eq!(m.sort_state().column, Some(1));
        assert_eq!(m.sort_state().direction, SortDirection::Ascending);
    }

    #[test]
    fn test_sort_out_of_bounds() {
        let mut m = model(vec![vec![json!(1)]]);
        assert!(matches!(
            m.sort_by(3, SortDirection::Ascending),
            Err(GridError::ColumnOutOfBounds { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_reorder_moves_cells_and_sort_column() {
        let mut m = model(vec![vec![json!("a"), json!("b"), json!("c")]]);
        m.sort_by(0, SortDirection::Ascending).unwrap();
        m.reorder_column(0, 2).unwrap();
        let names: Vec<_> = m.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2", "c0"]);
        assert_eq!(column_text(&m, 2), vec!["a"]);
        assert_eq!(m.sort_state().column, Some(2));
    }

    #[test]
    fn test_insert_column_shifts_sort_column() {
        let mut m = model(vec![vec![json!("a"), json!("b")]]);
        m.sort_by(1, SortDirection::Ascending).unwrap();
        let remap = m.insert_column(1, Column::new("new", "string"), Cell::Empty);
        assert_eq!(remap, ColumnRemap::Insert(1));
        assert_eq!(m.sort_state().column, Some(2));
        assert_eq!(m.row(0).unwrap()[1], Cell::Empty);
    }

    #[test]
    fn test_move_one_matches_vec_semantics() {
        for len in 1..6 {
            for from in 0..len {
                for to in 0..len {
                    let mut expected: Vec<usize> = (0..len).collect();
                    let item = expected.remove(from);
                    expected.insert(to, item);
                    let permuted = Permutation::move_one(len, from, to).permute((0..len).collect());
                    assert_eq!(permuted, expected, "len={len} from={from} to={to}");
                }
            }
        }
    }

    #[test]
    fn test_export_table_uses_display_text() {
        let mut m = model(vec![vec![json!("a"), Value::Null]]);
        m.set_cell(0, 1, Cell::Loading);
        let table = m.export_table();
        assert_eq!(table.headers, vec!["c0", "c1"]);
        assert_eq!(table.rows, vec![vec!["a".to_string(), "Resolving…".to_string()]]);
    }
}
