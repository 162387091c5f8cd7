//! The grid session: one object owning every piece of mutable grid state.
//!
//! All mutation happens in reaction to discrete events (user actions, timer
//! ticks, resolution batches). Work for the host comes back through the
//! effects outbox: resolution requests to send and regions to redraw.

use crate::animation::{AnimationTimings, CellAnimation};
use crate::cell::Cell;
use crate::comparison::{build_comparison, ComparisonView};
use crate::error::{GridError, GridResult};
use crate::model::{Column, ColumnRemap, ExportTable, Permutation, QueryResult, ResultModel, SortDirection};
use crate::resolution::{
    BatchReport, ColumnResolution, IdentityBatch, OperationId, PendingColumnResolution,
    ResolutionCoordinator, ResolutionRequest, ResolutionSettings, ResolvedColumnLink,
};
use crate::selection::{CellRef, DetailMode, SelectionState};
use crate::updater::{CellUpdater, WriteGuard};
use std::time::Instant;
use tracing::{debug, info};

// ============================================================================
// EFFECTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderInstruction {
    Cell { row: usize, col: usize },
    Table,
    DetailView,
}

/// Work handed back to the host after an engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fire-and-forget request for the identity-lookup collaborator.
    Resolve(ResolutionRequest),
    Render(RenderInstruction),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub resolution: ResolutionSettings,
    pub animation: AnimationTimings,
}

// ============================================================================
// DETAIL VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DetailField {
    pub name: String,
    pub column: usize,
    pub value: Cell,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    Closed,
    Single { row: usize, fields: Vec<DetailField> },
    Comparison(ComparisonView),
}

// ============================================================================
// MUTATION CONTEXT
// ============================================================================

/// Borrowed view of the session handed to the resolution coordinator.
pub(crate) struct GridContext<'a> {
    pub(crate) model: &'a mut ResultModel,
    pub(crate) selection: &'a mut SelectionState,
    pub(crate) updater: &'a mut CellUpdater,
    pub(crate) effects: &'a mut Vec<Effect>,
    pub(crate) generation: u64,
    pub(crate) now: Instant,
}

impl GridContext<'_> {
    pub(crate) fn write(&mut self, cell: CellRef, value: Cell, guard: WriteGuard) {
        let outcome = self
            .updater
            .apply_guarded(&mut *self.model, cell, value, guard, self.now);
        if outcome.changed() {
            self.render_cell(cell);
        }
    }

    pub(crate) fn write_staggered(&mut self, writes: Vec<(CellRef, Cell, WriteGuard)>) {
        for cell in self.updater.apply_staggered(&mut *self.model, writes, self.now) {
            self.render_cell(cell);
        }
    }

    pub(crate) fn insert_column(&mut self, at: usize, column: Column, fill: Cell) -> ColumnRemap {
        let remap = self.model.insert_column(at, column, fill);
        self.selection.remap_cell_columns(&remap);
        self.updater.remap_columns(&remap);
        push_render(&mut *self.effects, RenderInstruction::Table);
        if !self.selection.detail_rows().is_empty() {
            push_render(&mut *self.effects, RenderInstruction::DetailView);
        }
        remap
    }

    fn render_cell(&mut self, cell: CellRef) {
        push_cell_render(&mut *self.effects, &*self.selection, cell);
    }
}

fn push_render(effects: &mut Vec<Effect>, instruction: RenderInstruction) {
    let effect = Effect::Render(instruction);
    if !effects.contains(&effect) {
        effects.push(effect);
    }
}

fn push_cell_render(effects: &mut Vec<Effect>, selection: &SelectionState, cell: CellRef) {
    push_render(
        effects,
        RenderInstruction::Cell {
            row: cell.row,
            col: cell.col,
        },
    );
    if selection.detail_rows().contains(&cell.row) {
        push_render(effects, RenderInstruction::DetailView);
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct GridEngine {
    model: ResultModel,
    selection: SelectionState,
    coordinator: ResolutionCoordinator,
    updater: CellUpdater,
    effects: Vec<Effect>,
    generation: u64,
}

impl GridEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            coordinator: ResolutionCoordinator::new(settings.resolution),
            updater: CellUpdater::new(settings.animation),
            ..Self::default()
        }
    }

    fn split(&mut self, now: Instant) -> (&mut ResolutionCoordinator, GridContext<'_>) {
        (
            &mut self.coordinator,
            GridContext {
                model: &mut self.model,
                selection: &mut self.selection,
                updater: &mut self.updater,
                effects: &mut self.effects,
                generation: self.generation,
                now,
            },
        )
    }

    pub fn model(&self) -> &ResultModel {
        &self.model
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn links(&self) -> &[ResolvedColumnLink] {
        self.coordinator.links()
    }

    pub fn link_for_source(&self, col: usize) -> Option<&ResolvedColumnLink> {
        self.coordinator.link_for_source(col)
    }

    pub fn link_for_resolved(&self, col: usize) -> Option<&ResolvedColumnLink> {
        self.coordinator.link_for_resolved(col)
    }

    /// Result generation; bumps on every `load_result`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> usize {
        self.coordinator.in_flight()
    }

    pub fn offers_resolution(&self, col: usize) -> bool {
        self.coordinator.offers_resolution(&self.model, col)
    }

    pub fn animation(&self, cell: CellRef) -> CellAnimation<'_> {
        self.updater.animation(cell)
    }

    pub fn timings(&self) -> &AnimationTimings {
        self.updater.timings()
    }

    /// Transitions running or staggered writes queued; the host should keep ticking.
    pub fn is_animating(&self) -> bool {
        self.updater.is_active()
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn export_table(&self) -> ExportTable {
        self.model.export_table()
    }

    // ------------------------------------------------------------------------
    // Result lifecycle
    // ------------------------------------------------------------------------

    /// Replace the result wholesale. Everything keyed to the old rows is dropped.
    pub fn load_result(&mut self, result: QueryResult) -> GridResult<()> {
        let model = ResultModel::from_query(result)?;
        self.generation += 1;
        self.model = model;
        self.selection.clear();
        self.coordinator.reset();
        self.updater.reset();
        self.effects.clear();
        push_render(&mut self.effects, RenderInstruction::Table);
        push_render(&mut self.effects, RenderInstruction::DetailView);
        info!(
            generation = self.generation,
            rows = self.model.row_count(),
            columns = self.model.column_count(),
            "Loaded query result"
        );
        Ok(())
    }

    /// Client-side re-render of the current result.
    pub fn rerender(&mut self, preserve_detail: bool) {
        self.selection.clear_cells();
        if !preserve_detail {
            self.selection.close_detail();
        }
        push_render(&mut self.effects, RenderInstruction::Table);
        push_render(&mut self.effects, RenderInstruction::DetailView);
    }

    // ------------------------------------------------------------------------
    // Sorting and column order
    // ------------------------------------------------------------------------

    pub fn sort_by(&mut self, col: usize, direction: SortDirection) -> GridResult<()> {
        let snapshot = self.selection.snapshot_detail_rows(&self.model);
        let permutation = self.model.sort_by(col, direction)?;
        self.apply_row_permutation(&permutation, &snapshot);
        Ok(())
    }

    /// Sort by `col`, flipping direction if it already is the sort column.
    pub fn toggle_sort(&mut self, col: usize) -> GridResult<()> {
        let snapshot = self.selection.snapshot_detail_rows(&self.model);
        let permutation = self.model.toggle_sort(col)?;
        self.apply_row_permutation(&permutation, &snapshot);
        Ok(())
    }

    fn apply_row_permutation(&mut self, permutation: &Permutation, snapshot: &[Vec<Cell>]) {
        self.selection.remap_cell_rows(permutation);
        self.selection.remap_detail_rows(snapshot, &self.model);
        self.updater.remap_rows(permutation);
        self.coordinator.remap_rows(permutation);
        push_render(&mut self.effects, RenderInstruction::Table);
        if !snapshot.is_empty() {
            push_render(&mut self.effects, RenderInstruction::DetailView);
        }
    }

    /// Move a column. Cell selection is cleared; detail rows survive.
    pub fn reorder_column(&mut self, from: usize, to: usize) -> GridResult<()> {
        let permutation = self.model.reorder_column(from, to)?;
        let remap = ColumnRemap::Permute(permutation);
        self.selection.clear_cells();
        self.updater.remap_columns(&remap);
        self.coordinator.remap_columns(&remap);
        push_render(&mut self.effects, RenderInstruction::Table);
        if !self.selection.detail_rows().is_empty() {
            push_render(&mut self.effects, RenderInstruction::DetailView);
        }
        debug!(from, to, "Column moved");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn toggle_cell(&mut self, row: usize, col: usize) -> GridResult<bool> {
        self.model.check_row(row)?;
        self.model.check_column(col)?;
        let selected = self.selection.toggle_cell(CellRef::new(row, col));
        push_render(&mut self.effects, RenderInstruction::Cell { row, col });
        Ok(selected)
    }

    pub fn clear_cell_selection(&mut self) {
        if self.selection.cell_count() > 0 {
            self.selection.clear_cells();
            push_render(&mut self.effects, RenderInstruction::Table);
        }
    }

    pub fn toggle_detail_row(&mut self, row: usize) -> GridResult<bool> {
        self.model.check_row(row)?;
        let selected = self.selection.toggle_detail_row(row);
        push_render(&mut self.effects, RenderInstruction::DetailView);
        Ok(selected)
    }

    pub fn set_detail_rows(&mut self, rows: &[usize]) -> GridResult<()> {
        for &row in rows {
            self.model.check_row(row)?;
        }
        self.selection.set_detail_rows(rows.iter().copied());
        push_render(&mut self.effects, RenderInstruction::DetailView);
        Ok(())
    }

    pub fn close_detail(&mut self) {
        self.selection.close_detail();
        push_render(&mut self.effects, RenderInstruction::DetailView);
    }

    /// Content of the secondary view for the current detail rows.
    pub fn detail_view(&self) -> GridResult<DetailView> {
        match self.selection.detail_mode() {
            DetailMode::Closed => Ok(DetailView::Closed),
            DetailMode::Single(row) => {
                self.model.check_row(row)?;
                let fields = self
                    .model
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(col, column)| DetailField {
                        name: column.name.clone(),
                        column: col,
                        value: self.model.cell(row, col).cloned().unwrap_or(Cell::Empty),
                    })
                    .collect();
                Ok(DetailView::Single { row, fields })
            }
            DetailMode::Comparison(rows) => {
                Ok(DetailView::Comparison(build_comparison(&self.model, &rows)?))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    pub fn resolve_single_cell(
        &mut self,
        row: usize,
        col: usize,
        now: Instant,
    ) -> GridResult<Option<OperationId>> {
        let (coordinator, mut ctx) = self.split(now);
        coordinator.resolve_single_cell(&mut ctx, row, col)
    }

    /// Resolve the identifiers in the current cell selection.
    pub fn resolve_selected_cells(&mut self, now: Instant) -> GridResult<Option<OperationId>> {
        let cells: Vec<CellRef> = self.selection.selected_cells().collect();
        let col = cells.first().map(|c| c.col).ok_or(GridError::EmptySelection)?;
        let (coordinator, mut ctx) = self.split(now);
        coordinator.resolve_selected_cells(&mut ctx, &cells, col)
    }

    pub fn resolve_column(&mut self, col: usize, now: Instant) -> GridResult<ColumnResolution> {
        self.model.check_column(col)?;
        let name = self
            .model
            .column(col)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let (coordinator, mut ctx) = self.split(now);
        coordinator.resolve_column(&mut ctx, col, &name)
    }

    pub fn confirm_column(
        &mut self,
        pending: PendingColumnResolution,
        now: Instant,
    ) -> GridResult<ColumnResolution> {
        let (coordinator, mut ctx) = self.split(now);
        coordinator.confirm_column(&mut ctx, pending)
    }

    pub fn decline_column(&mut self, pending: PendingColumnResolution) {
        self.coordinator.decline_column(pending);
    }

    /// Fold one response batch into the grid.
    pub fn on_resolution_batch(
        &mut self,
        operation: OperationId,
        generation: u64,
        batch: IdentityBatch,
        now: Instant,
    ) -> BatchReport {
        if generation != self.generation {
            debug!(%operation, generation, current = self.generation, "Batch from an older result ignored");
            return BatchReport {
                stale: true,
                ..BatchReport::default()
            };
        }
        let (coordinator, mut ctx) = self.split(now);
        coordinator.on_resolution_batch(&mut ctx, operation, batch)
    }

    /// Finish an operation whose response stream broke off.
    ///
    /// Behaves like an empty final batch: cells still waiting show "not resolved".
    pub fn abandon_operation(&mut self, operation: OperationId, now: Instant) -> GridResult<BatchReport> {
        if !self.coordinator.is_in_flight(operation) {
            return Err(GridError::UnknownOperation {
                operation: operation.as_u64(),
            });
        }
        let generation = self.generation;
        Ok(self.on_resolution_batch(operation, generation, IdentityBatch::last(Vec::new()), now))
    }

    /// Timer callback. Returns whether anything visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let changed = self.updater.tick(&mut self.model, now);
        for &cell in &changed {
            push_cell_render(&mut self.effects, &self.selection, cell);
        }
        !changed.is_empty()
    }
}
