//! Identity resolution coordinator.
//!
//! Turns resolve actions into fire-and-forget requests for the identity
//! collaborator, keeps one synthetic resolved column per source column, and
//! folds partial and final response batches back into the grid.
//!
//! Batches can arrive late, out of order, or after a newer request for the
//! same cells. The coordinator copes by merging (never replacing) the
//! accumulated outcomes of a link, only failing cells on a final batch, and
//! writing failures with [`WriteGuard::PreserveResolved`] so a stale answer
//! cannot knock out a resolved badge.

use crate::cell::{Cell, Placeholder, ResolutionEntry};
use crate::engine::{Effect, GridContext};
use crate::error::{GridError, GridResult};
use crate::heuristics::{is_identifier, should_offer_resolution_with, DEFAULT_IDENTIFIER_RATIO};
use crate::model::{Column, ColumnRemap, Permutation, ResultModel};
use crate::selection::CellRef;
use crate::updater::WriteGuard;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Column resolutions above this many identifiers need confirmation.
pub const DEFAULT_CONFIRM_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSettings {
    pub confirm_threshold: usize,
    pub identifier_ratio: f64,
}

impl Default for ResolutionSettings {
    fn default() -> Self {
        Self {
            confirm_threshold: DEFAULT_CONFIRM_THRESHOLD,
            identifier_ratio: DEFAULT_IDENTIFIER_RATIO,
        }
    }
}

// ============================================================================
// IDENTIFIERS AND WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(u64);

impl OperationId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LinkId(u32);

/// Request handed to the host for the identity-lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionRequest {
    pub operation: OperationId,
    pub generation: u64,
    pub column: String,
    pub identifiers: Vec<String>,
}

/// One response batch from the identity-lookup collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBatch {
    #[serde(default)]
    pub entries: Vec<ResolutionEntry>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

impl IdentityBatch {
    pub fn partial(entries: Vec<ResolutionEntry>) -> Self {
        Self {
            entries,
            is_final: false,
        }
    }

    pub fn last(entries: Vec<ResolutionEntry>) -> Self {
        Self {
            entries,
            is_final: true,
        }
    }
}

// ============================================================================
// LINKS AND OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveType {
    SingleCell,
    SelectedCells,
    Column,
}

/// Ties a source column to the synthetic column holding its resolutions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumnLink {
    id: LinkId,
    pub resolved_column_index: usize,
    pub original_column_index: usize,
    pub resolve_type: ResolveType,
    pub is_loading: bool,
    pub is_single_cell_resolution: bool,
    accumulated: HashMap<String, ResolutionEntry>,
    answered_by: HashMap<String, OperationId>,
}

impl ResolvedColumnLink {
    /// Every outcome received so far, keyed by lowercased identifier.
    pub fn accumulated_resolutions(&self) -> &HashMap<String, ResolutionEntry> {
        &self.accumulated
    }

    pub fn outcome(&self, identifier: &str) -> Option<&ResolutionEntry> {
        self.accumulated.get(&identifier.to_ascii_lowercase())
    }

    pub fn is_resolved(&self, identifier: &str) -> bool {
        self.outcome(identifier).is_some_and(ResolutionEntry::is_resolved)
    }

    fn resolved_entry(&self, identifier: &str) -> Option<&ResolutionEntry> {
        self.outcome(identifier).filter(|e| e.is_resolved())
    }

    /// A later operation than `operation` already resolved `identifier`.
    fn resolved_after(&self, identifier: &str, operation: OperationId) -> bool {
        let key = identifier.to_ascii_lowercase();
        self.resolved_entry(&key).is_some()
            && self.answered_by.get(&key).is_some_and(|&later| later > operation)
    }

    /// Merge one outcome. A resolved entry is never replaced by a failure or
    /// by an answer from an older operation.
    fn record(&mut self, key: String, entry: ResolutionEntry, operation: OperationId) {
        let keep_existing = self.accumulated.get(&key).is_some_and(|existing| {
            existing.is_resolved()
                && (!entry.is_resolved() || self.resolved_after(&key, operation))
        });
        if keep_existing {
            debug!(%operation, id = %key, "Older outcome ignored");
            return;
        }
        self.answered_by.insert(key.clone(), operation);
        self.accumulated.insert(key, entry);
    }

    /// Rows whose identifier already resolved, paired with the badge they should show.
    fn known_rows(&self, model: &ResultModel) -> Vec<(CellRef, Cell)> {
        model
            .rows()
            .iter()
            .enumerate()
            .filter_map(|(row, cells)| {
                let id = cells.get(self.original_column_index)?.identifier()?;
                let value = self.resolved_entry(&id)?.to_cell();
                let target = CellRef::new(row, self.resolved_column_index);
                (model.cell(target.row, target.col) != Some(&value)).then_some((target, value))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Targets {
    AllRows,
    Rows(BTreeSet<usize>),
}

impl Targets {
    fn contains(&self, row: usize) -> bool {
        match self {
            Targets::AllRows => true,
            Targets::Rows(rows) => rows.contains(&row),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Operation {
    link: LinkId,
    targets: Targets,
}

/// A column resolution waiting for the host's go-ahead.
///
/// Owns everything needed to resume. Pass it to `confirm_column` to proceed;
/// dropping it (or `decline_column`) abandons the operation without any request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending column resolution does nothing unless confirmed"]
pub struct PendingColumnResolution {
    column: usize,
    column_name: String,
    identifier_count: usize,
    generation: u64,
}

impl PendingColumnResolution {
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn identifier_count(&self) -> usize {
        self.identifier_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Prompt text for the confirmation request.
    pub fn message(&self) -> String {
        format!(
            "Resolve {} identities in column '{}'? Each one may need several lookups.",
            self.identifier_count, self.column_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnResolution {
    Started(OperationId),
    NeedsConfirmation(PendingColumnResolution),
    NothingToResolve,
}

/// What one batch did to the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub resolved: usize,
    pub failed: usize,
    pub not_resolved: usize,
    pub completed: bool,
    /// The operation was unknown (finished, or from a replaced result).
    pub stale: bool,
}

// ============================================================================
// COORDINATOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResolutionCoordinator {
    settings: ResolutionSettings,
    links: Vec<ResolvedColumnLink>,
    operations: HashMap<OperationId, Operation>,
    next_operation: u64,
    next_link: u32,
}

impl ResolutionCoordinator {
    pub fn new(settings: ResolutionSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &ResolutionSettings {
        &self.settings
    }

    pub fn links(&self) -> &[ResolvedColumnLink] {
        &self.links
    }

    pub fn link_for_source(&self, col: usize) -> Option<&ResolvedColumnLink> {
        self.links.iter().find(|l| l.original_column_index == col)
    }

    pub fn link_for_resolved(&self, col: usize) -> Option<&ResolvedColumnLink> {
        self.links.iter().find(|l| l.resolved_column_index == col)
    }

    pub fn in_flight(&self) -> usize {
        self.operations.len()
    }

    pub fn is_in_flight(&self, operation: OperationId) -> bool {
        self.operations.contains_key(&operation)
    }

    /// Whether the column is worth offering resolution for.
    pub fn offers_resolution(&self, model: &ResultModel, col: usize) -> bool {
        if self.link_for_resolved(col).is_some() {
            return false;
        }
        match model.column(col) {
            Some(column) => should_offer_resolution_with(
                &column.name,
                model.column_values(col),
                self.settings.identifier_ratio,
            ),
            None => false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.links.clear();
        self.operations.clear();
    }

    pub(crate) fn remap_rows(&mut self, permutation: &Permutation) {
        for operation in self.operations.values_mut() {
            if let Targets::Rows(rows) = &mut operation.targets {
                *rows = rows.iter().map(|&r| permutation.apply(r)).collect();
            }
        }
    }

    pub(crate) fn remap_columns(&mut self, remap: &ColumnRemap) {
        for link in &mut self.links {
            link.resolved_column_index = remap.apply(link.resolved_column_index);
            link.original_column_index = remap.apply(link.original_column_index);
        }
    }

    // ------------------------------------------------------------------------
    // Resolve actions
    // ------------------------------------------------------------------------

    pub(crate) fn resolve_single_cell(
        &mut self,
        ctx: &mut GridContext<'_>,
        row: usize,
        col: usize,
    ) -> GridResult<Option<OperationId>> {
        ctx.model.check_row(row)?;
        ctx.model.check_column(col)?;
        let identifier = ctx
            .model
            .cell(row, col)
            .and_then(Cell::identifier)
            .ok_or(GridError::NotAnIdentifier { row, col })?;

        let link_idx = self.ensure_link(ctx, col, ResolveType::SingleCell);
        let link = &self.links[link_idx];
        let target = CellRef::new(row, link.resolved_column_index);

        if let Some(entry) = link.resolved_entry(&identifier) {
            let value = entry.to_cell();
            if ctx.model.cell(target.row, target.col) != Some(&value) {
                ctx.write(target, value, WriteGuard::Any);
            }
            debug!(row, col, "Identifier already resolved, no request");
            return Ok(None);
        }

        ctx.write(target, Cell::Loading, WriteGuard::Any);
        let targets = Targets::Rows(BTreeSet::from([row]));
        Ok(Some(self.begin_operation(ctx, link_idx, targets, vec![identifier])))
    }

    pub(crate) fn resolve_selected_cells(
        &mut self,
        ctx: &mut GridContext<'_>,
        cells: &[CellRef],
        col: usize,
    ) -> GridResult<Option<OperationId>> {
        if cells.is_empty() {
            return Err(GridError::EmptySelection);
        }
        if let Some(stray) = cells.iter().find(|c| c.col != col) {
            return Err(GridError::MixedColumns {
                expected: col,
                found: stray.col,
            });
        }
        ctx.model.check_column(col)?;
        for cell in cells {
            ctx.model.check_row(cell.row)?;
        }

        let existing = self.links.iter().position(|l| l.original_column_index == col);
        let mut rows = BTreeSet::new();
        let mut identifiers = Vec::new();
        let mut seen = HashSet::new();
        let mut already = Vec::new();
        for cell in cells {
            let Some(identifier) = ctx.model.cell(cell.row, col).and_then(Cell::identifier) else {
                continue;
            };
            if let Some(entry) = existing.and_then(|i| self.links[i].resolved_entry(&identifier)) {
                already.push((cell.row, entry.to_cell()));
                continue;
            }
            rows.insert(cell.row);
            if seen.insert(identifier.clone()) {
                identifiers.push(identifier);
            }
        }
        if rows.is_empty() && already.is_empty() {
            debug!(col, selected = cells.len(), "No identifiers in selection");
            return Ok(None);
        }

        let link_idx = self.ensure_link(ctx, col, ResolveType::SelectedCells);
        let resolved_col = self.links[link_idx].resolved_column_index;
        for (row, value) in already {
            if ctx.model.cell(row, resolved_col) != Some(&value) {
                ctx.write(CellRef::new(row, resolved_col), value, WriteGuard::Any);
            }
        }
        if rows.is_empty() {
            return Ok(None);
        }
        for &row in &rows {
            ctx.write(CellRef::new(row, resolved_col), Cell::Loading, WriteGuard::Any);
        }
        Ok(Some(self.begin_operation(
            ctx,
            link_idx,
            Targets::Rows(rows),
            identifiers,
        )))
    }

    pub(crate) fn resolve_column(
        &mut self,
        ctx: &mut GridContext<'_>,
        col: usize,
        name: &str,
    ) -> GridResult<ColumnResolution> {
        ctx.model.check_column(col)?;
        let column_name = ctx
            .model
            .column(col)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        if column_name != name {
            return Err(GridError::ColumnMissing {
                name: name.to_string(),
            });
        }

        self.fill_known_rows(ctx, col);
        let identifiers = self.unresolved_identifiers(ctx.model, col);
        if identifiers.is_empty() {
            return Ok(ColumnResolution::NothingToResolve);
        }
        if identifiers.len() > self.settings.confirm_threshold {
            info!(
                column = %column_name,
                identifiers = identifiers.len(),
                "Column resolution needs confirmation"
            );
            return Ok(ColumnResolution::NeedsConfirmation(PendingColumnResolution {
                column: col,
                column_name,
                identifier_count: identifiers.len(),
                generation: ctx.generation,
            }));
        }
        Ok(ColumnResolution::Started(
            self.start_column(ctx, col, identifiers),
        ))
    }

    pub(crate) fn confirm_column(
        &mut self,
        ctx: &mut GridContext<'_>,
        pending: PendingColumnResolution,
    ) -> GridResult<ColumnResolution> {
        if pending.generation != ctx.generation {
            return Err(GridError::StaleConfirmation {
                pending: pending.generation,
                current: ctx.generation,
            });
        }
        let still_there = ctx
            .model
            .column(pending.column)
            .is_some_and(|c| c.name == pending.column_name);
        let col = if still_there {
            pending.column
        } else {
            ctx.model
                .position_of_column(&pending.column_name)
                .ok_or_else(|| GridError::ColumnMissing {
                    name: pending.column_name.clone(),
                })?
        };

        self.fill_known_rows(ctx, col);
        let identifiers = self.unresolved_identifiers(ctx.model, col);
        if identifiers.is_empty() {
            return Ok(ColumnResolution::NothingToResolve);
        }
        info!(column = %pending.column_name, identifiers = identifiers.len(), "Column resolution confirmed");
        Ok(ColumnResolution::Started(
            self.start_column(ctx, col, identifiers),
        ))
    }

    pub(crate) fn decline_column(&mut self, pending: PendingColumnResolution) {
        info!(
            column = %pending.column_name,
            identifiers = pending.identifier_count,
            "Column resolution declined"
        );
    }

    fn start_column(
        &mut self,
        ctx: &mut GridContext<'_>,
        col: usize,
        identifiers: Vec<String>,
    ) -> OperationId {
        let link_idx = self.ensure_link(ctx, col, ResolveType::Column);
        let link = &self.links[link_idx];
        let resolved_col = link.resolved_column_index;
        let mut loading = Vec::new();
        for (row, cells) in ctx.model.rows().iter().enumerate() {
            let source = &cells[col];
            if source.is_blank() {
                continue;
            }
            if source.identifier().is_some_and(|id| link.is_resolved(&id)) {
                continue;
            }
            loading.push(CellRef::new(row, resolved_col));
        }
        for target in loading {
            ctx.write(target, Cell::Loading, WriteGuard::Any);
        }
        self.begin_operation(ctx, link_idx, Targets::AllRows, identifiers)
    }

    /// Show the link's resolved outcomes in every row of `col` that lacks them.
    fn fill_known_rows(&self, ctx: &mut GridContext<'_>, col: usize) {
        let Some(link) = self.link_for_source(col) else {
            return;
        };
        let rows = link.known_rows(ctx.model);
        if !rows.is_empty() {
            debug!(col, rows = rows.len(), "Filling rows from earlier outcomes");
        }
        for (target, value) in rows {
            ctx.write(target, value, WriteGuard::Any);
        }
    }

    /// Distinct identifiers in the column that have no successful outcome yet.
    fn unresolved_identifiers(&self, model: &ResultModel, col: usize) -> Vec<String> {
        let link = self.link_for_source(col);
        let mut seen = HashSet::new();
        model
            .rows()
            .iter()
            .filter_map(|cells| cells.get(col).and_then(Cell::identifier))
            .filter(|id| !link.is_some_and(|l| l.is_resolved(id)))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    fn ensure_link(
        &mut self,
        ctx: &mut GridContext<'_>,
        col: usize,
        resolve_type: ResolveType,
    ) -> usize {
        if let Some(idx) = self.links.iter().position(|l| l.original_column_index == col) {
            let link = &mut self.links[idx];
            link.resolve_type = resolve_type;
            if resolve_type == ResolveType::Column {
                link.is_single_cell_resolution = false;
            }
            return idx;
        }

        let (name, width) = ctx
            .model
            .column(col)
            .map(|c| (c.name.clone(), c.width))
            .unwrap_or_default();
        let column = Column {
            name: format!("{name} (resolved)"),
            declared_type: "string".to_string(),
            width,
        };
        let at = col + 1;
        let remap = ctx.insert_column(at, column, Cell::Empty);
        self.remap_columns(&remap);

        let id = LinkId(self.next_link);
        self.next_link += 1;
        self.links.push(ResolvedColumnLink {
            id,
            resolved_column_index: at,
            original_column_index: col,
            resolve_type,
            is_loading: false,
            is_single_cell_resolution: resolve_type != ResolveType::Column,
            accumulated: HashMap::new(),
            answered_by: HashMap::new(),
        });
        info!(column = %name, resolved_column = at, ?resolve_type, "Created resolved column");
        self.links.len() - 1
    }

    fn begin_operation(
        &mut self,
        ctx: &mut GridContext<'_>,
        link_idx: usize,
        targets: Targets,
        identifiers: Vec<String>,
    ) -> OperationId {
        let operation = OperationId(self.next_operation);
        self.next_operation += 1;

        let link = &mut self.links[link_idx];
        link.is_loading = true;
        let column = ctx
            .model
            .column(link.original_column_index)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        self.operations.insert(
            operation,
            Operation {
                link: link.id,
                targets,
            },
        );
        info!(
            %operation,
            column = %column,
            identifiers = identifiers.len(),
            generation = ctx.generation,
            "Issuing identity resolution request"
        );
        ctx.effects.push(Effect::Resolve(ResolutionRequest {
            operation,
            generation: ctx.generation,
            column,
            identifiers,
        }));
        operation
    }

    // ------------------------------------------------------------------------
    // Responses
    // ------------------------------------------------------------------------

    pub(crate) fn on_resolution_batch(
        &mut self,
        ctx: &mut GridContext<'_>,
        operation: OperationId,
        batch: IdentityBatch,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let Some(op) = self.operations.get(&operation).cloned() else {
            debug!(%operation, "Batch for unknown operation ignored");
            report.stale = true;
            return report;
        };
        let Some(link_idx) = self.links.iter().position(|l| l.id == op.link) else {
            debug!(%operation, "Batch for removed link ignored");
            self.operations.remove(&operation);
            report.stale = true;
            return report;
        };

        let mut in_batch: HashMap<String, ResolutionEntry> = HashMap::new();
        for entry in batch.entries {
            if let ResolutionEntry::Resolved(identity) = &entry {
                if identity.display_name.trim().is_empty() {
                    warn!(%operation, id = %identity.id, "Discarding resolution without a display name");
                    continue;
                }
            }
            let key = entry.id().to_ascii_lowercase();
            if !is_identifier(&key) {
                warn!(%operation, id = %entry.id(), "Discarding resolution for a non-identifier");
                continue;
            }
            in_batch.insert(key, entry);
        }

        // rows another in-flight operation on this link is still waiting for
        let others: Vec<&Targets> = self
            .operations
            .iter()
            .filter(|(id, o)| **id != operation && o.link == op.link)
            .map(|(_, o)| &o.targets)
            .collect();
        let claimed_elsewhere = |row: usize| others.iter().any(|t| t.contains(row));

        let link = &self.links[link_idx];
        let source_col = link.original_column_index;
        let resolved_col = link.resolved_column_index;
        let mut writes = Vec::new();

        for row in 0..ctx.model.row_count() {
            if !op.targets.contains(row) {
                continue;
            }
            let target = CellRef::new(row, resolved_col);
            let current = ctx.model.cell(row, resolved_col);
            let source = ctx.model.cell(row, source_col);
            match source.and_then(Cell::identifier) {
                Some(id) => {
                    if let Some(entry) = in_batch.get(&id) {
                        let value = entry.to_cell();
                        if current == Some(&value) {
                            continue;
                        }
                        if entry.is_resolved() {
                            if link.resolved_after(&id, operation) {
                                debug!(%operation, row, "Newer resolution already shown");
                                continue;
                            }
                            report.resolved += 1;
                            writes.push((target, value, WriteGuard::Any));
                        } else if batch.is_final && !current.is_some_and(Cell::is_resolved) {
                            report.failed += 1;
                            writes.push((target, value, WriteGuard::PreserveResolved));
                        }
                    } else if batch.is_final
                        && !claimed_elsewhere(row)
                        && !ctx.updater.is_busy(target)
                        && current.is_some_and(|c| c.is_loading() || c.is_blank())
                    {
                        // an earlier batch may have answered for this identifier
                        let value = match link.outcome(&id) {
                            Some(entry) => entry.to_cell(),
                            None => Cell::Placeholder(Placeholder::NotResolved),
                        };
                        match &value {
                            Cell::Resolved(_) => report.resolved += 1,
                            Cell::Failed(_) => report.failed += 1,
                            _ => report.not_resolved += 1,
                        }
                        writes.push((target, value, WriteGuard::PreserveResolved));
                    }
                }
                None => {
                    if batch.is_final
                        && !claimed_elsewhere(row)
                        && current.is_some_and(|c| c.is_loading() || c.is_blank())
                    {
                        writes.push((
                            target,
                            Cell::Placeholder(Placeholder::NotApplicable),
                            WriteGuard::PreserveResolved,
                        ));
                    }
                }
            }
        }

        let link = &mut self.links[link_idx];
        for (key, entry) in in_batch {
            link.record(key, entry, operation);
        }
        if batch.is_final {
            self.operations.remove(&operation);
            let link_id = op.link;
            let still_loading = self.operations.values().any(|o| o.link == link_id);
            self.links[link_idx].is_loading = still_loading;
            report.completed = true;
        }

        debug!(
            %operation,
            is_final = batch.is_final,
            resolved = report.resolved,
            failed = report.failed,
            not_resolved = report.not_resolved,
            "Applied resolution batch"
        );
        ctx.write_staggered(writes);
        report
    }
}
