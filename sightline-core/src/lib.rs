//! Sightline Core - Result Grid State Engine
//!
//! Holds a tabular query result and keeps every view derived from it
//! consistent: sorting, column order, cell and detail-row selection,
//! identity resolution of identifier columns, and per-cell transitions.
//!
//! The engine does no I/O. Hosts feed it user actions, timer ticks and
//! resolution batches, and drain [`Effect`]s telling them what to request
//! and what to redraw.

pub mod animation;
pub mod cell;
pub mod comparison;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod model;
pub mod resolution;
pub mod selection;
pub mod updater;

pub use animation::{AnimationTimings, CellAnimation, Transition, TransitionKind, TransitionPhase};
pub use cell::{Badge, Cell, Placeholder, ResolutionEntry, ResolutionError, ResolvedIdentity, TypeAttempt};
pub use comparison::{build_comparison, ComparisonView, PropertyComparison};
pub use engine::{DetailField, DetailView, Effect, EngineSettings, GridEngine, RenderInstruction};
pub use error::{GridError, GridResult};
pub use heuristics::{is_identifier, is_identifier_column, should_offer_resolution};
pub use model::{Column, ExportTable, QueryResult, ResultModel, SortDirection, SortState};
pub use resolution::{
    BatchReport, ColumnResolution, IdentityBatch, OperationId, PendingColumnResolution,
    ResolutionRequest, ResolutionSettings, ResolveType, ResolvedColumnLink,
};
pub use selection::{CellRef, DetailMode, SelectionState};
pub use updater::{ApplyOutcome, CellUpdater, WriteGuard};
