//! Error types for grid engine operations

use thiserror::Error;

/// Errors raised by grid mutations and resolution requests.
///
/// Per-identifier lookup failures are not errors at this level; they travel
/// as [`crate::ResolutionError`] values and end up as error badges.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("Column index {index} out of bounds ({count} columns)")]
    ColumnOutOfBounds { index: usize, count: usize },

    #[error("Row index {index} out of bounds ({count} rows)")]
    RowOutOfBounds { index: usize, count: usize },

    #[error("Cell ({row}, {col}) does not hold an identifier")]
    NotAnIdentifier { row: usize, col: usize },

    #[error("Selected cells span more than one column (expected {expected}, found {found})")]
    MixedColumns { expected: usize, found: usize },

    #[error("No cells selected")]
    EmptySelection,

    #[error("Row {row} has {found} cells but the result has {expected} columns")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Confirmation belongs to result generation {pending}, current is {current}")]
    StaleConfirmation { pending: u64, current: u64 },

    #[error("Column '{name}' is no longer present")]
    ColumnMissing { name: String },

    #[error("Resolution operation {operation} is not in flight")]
    UnknownOperation { operation: u64 },
}

/// Result alias used throughout the engine.
pub type GridResult<T> = Result<T, GridError>;
