//! Event types for the terminal event loop.

use crate::api_client::QueryFailure;
use crossterm::event::KeyEvent;
use sightline_core::{IdentityBatch, OperationId, QueryResult};

#[derive(Debug, Clone)]
pub enum TuiEvent {
    Input(KeyEvent),
    Resize { width: u16, height: u16 },
    QueryCompleted(Result<QueryResult, QueryFailure>),
    ResolutionBatch {
        operation: OperationId,
        generation: u64,
        batch: IdentityBatch,
    },
    /// The resolution stream for `operation` broke before its final batch.
    ResolutionFailed {
        operation: OperationId,
        message: String,
    },
}
