//! The single write path for cell content.
//!
//! Every content change goes through [`CellUpdater`], which consults the
//! animation registry first and picks an immediate write, a fade, or a
//! pulse-to-error transition.
//!
//! A write aimed at a transitioning cell never touches it. The latest such
//! write is held and replayed once the transition finishes, so an answer
//! that arrives during an animation is not lost.

use crate::animation::{
    AnimationRegistry, AnimationTimings, CellAnimation, TransitionKind, TransitionStep,
};
use crate::cell::Cell;
use crate::model::{ColumnRemap, Permutation, ResultModel};
use crate::selection::CellRef;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

/// Extra condition checked against the cell's current content at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    Any,
    /// Skip the write if the cell already shows a resolved badge.
    PreserveResolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Transitioning(TransitionKind),
    /// Cell is mid-transition; the write replays when it finishes.
    Deferred,
    /// Guard declined to overwrite current content.
    Guarded,
    OutOfBounds,
}

impl ApplyOutcome {
    /// Whether the cell's visible state changed.
    pub fn changed(self) -> bool {
        matches!(self, ApplyOutcome::Applied | ApplyOutcome::Transitioning(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct HeldWrite {
    value: Cell,
    guard: WriteGuard,
}

#[derive(Debug, Clone, PartialEq)]
struct ScheduledWrite {
    due: Instant,
    cell: CellRef,
    value: Cell,
    guard: WriteGuard,
}

#[derive(Debug, Clone, Default)]
pub struct CellUpdater {
    registry: AnimationRegistry,
    schedule: Vec<ScheduledWrite>,
    held: HashMap<CellRef, HeldWrite>,
    timings: AnimationTimings,
}

impl CellUpdater {
    pub fn new(timings: AnimationTimings) -> Self {
        Self {
            registry: AnimationRegistry::new(),
            schedule: Vec::new(),
            held: HashMap::new(),
            timings,
        }
    }

    pub fn timings(&self) -> &AnimationTimings {
        &self.timings
    }

    pub fn registry(&self) -> &AnimationRegistry {
        &self.registry
    }

    pub fn animation(&self, cell: CellRef) -> CellAnimation<'_> {
        self.registry.state(cell)
    }

    /// A write is waiting in the stagger queue or a transition is running.
    pub fn is_busy(&self, cell: CellRef) -> bool {
        self.registry.is_animating(cell)
            || self.held.contains_key(&cell)
            || self.schedule.iter().any(|w| w.cell == cell)
    }

    /// The write waiting for `cell`'s transition to finish, if any.
    pub fn held_write(&self, cell: CellRef) -> Option<&Cell> {
        self.held.get(&cell).map(|w| &w.value)
    }

    pub fn pending_writes(&self) -> usize {
        self.schedule.len()
    }

    /// Write `value` into `cell` under the transition rules.
    pub fn apply_cell_value(
        &mut self,
        model: &mut ResultModel,
        cell: CellRef,
        value: Cell,
        now: Instant,
    ) -> ApplyOutcome {
        self.apply_guarded(model, cell, value, WriteGuard::Any, now)
    }

    pub fn apply_guarded(
        &mut self,
        model: &mut ResultModel,
        cell: CellRef,
        value: Cell,
        guard: WriteGuard,
        now: Instant,
    ) -> ApplyOutcome {
        if self.registry.is_animating(cell) {
            trace!(row = cell.row, col = cell.col, "Cell mid-transition, write held");
            // a newer write replaces an older one still waiting
            self.held.insert(cell, HeldWrite { value, guard });
            return ApplyOutcome::Deferred;
        }
        let Some(current) = model.cell(cell.row, cell.col) else {
            return ApplyOutcome::OutOfBounds;
        };
        if guard == WriteGuard::PreserveResolved && current.is_resolved() {
            return ApplyOutcome::Guarded;
        }
        let kind = match (current.is_loading(), &value) {
            (true, Cell::Resolved(_)) => Some(TransitionKind::Fade),
            (true, Cell::Failed(_)) => Some(TransitionKind::PulseToError),
            _ => None,
        };
        match kind {
            Some(kind) => {
                self.registry.begin(cell, kind, value, now);
                ApplyOutcome::Transitioning(kind)
            }
            None => {
                model.set_cell(cell.row, cell.col, value);
                ApplyOutcome::Applied
            }
        }
    }

    /// Queue a group of writes, one stagger step apart. The first is applied now.
    ///
    /// Returns the cells whose content changed immediately.
    pub fn apply_staggered(
        &mut self,
        model: &mut ResultModel,
        writes: Vec<(CellRef, Cell, WriteGuard)>,
        now: Instant,
    ) -> Vec<CellRef> {
        let mut changed = Vec::new();
        for (index, (cell, value, guard)) in writes.into_iter().enumerate() {
            let due = now + self.timings.stagger * index as u32;
            if due <= now {
                if self.apply_guarded(model, cell, value, guard, now).changed() {
                    changed.push(cell);
                }
            } else {
                self.schedule.push(ScheduledWrite {
                    due,
                    cell,
                    value,
                    guard,
                });
            }
        }
        changed
    }

    /// Timer callback: advance transitions, then run due staggered writes.
    ///
    /// Returns every cell whose visible state changed.
    pub fn tick(&mut self, model: &mut ResultModel, now: Instant) -> Vec<CellRef> {
        let mut changed = Vec::new();
        for step in self.registry.advance(now, &self.timings) {
            match step {
                // The transition owns the cell, so it writes directly.
                TransitionStep::Swap { cell, value } => {
                    model.set_cell(cell.row, cell.col, value);
                    changed.push(cell);
                }
                TransitionStep::Finished { cell } => {
                    debug!(row = cell.row, col = cell.col, "Transition finished");
                    changed.push(cell);
                    if let Some(write) = self.held.remove(&cell) {
                        let outcome = self.apply_guarded(model, cell, write.value, write.guard, now);
                        debug!(row = cell.row, col = cell.col, ?outcome, "Replayed held write");
                    }
                }
            }
        }

        if self.schedule.iter().any(|w| w.due <= now) {
            let (due, waiting): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.schedule).into_iter().partition(|w| w.due <= now);
            self.schedule = waiting;
            let mut due = due;
            due.sort_by_key(|w| w.due);
            for write in due {
                if self
                    .apply_guarded(model, write.cell, write.value, write.guard, now)
                    .changed()
                {
                    changed.push(write.cell);
                }
            }
        }
        changed
    }

    /// Anything still moving or queued.
    pub fn is_active(&self) -> bool {
        !self.registry.is_empty() || !self.schedule.is_empty() || !self.held.is_empty()
    }

    pub fn remap_rows(&mut self, permutation: &Permutation) {
        self.registry.remap_rows(permutation);
        for write in &mut self.schedule {
            write.cell.row = permutation.apply(write.cell.row);
        }
        self.held = self
            .held
            .drain()
            .map(|(c, w)| (CellRef::new(permutation.apply(c.row), c.col), w))
            .collect();
    }

    pub fn remap_columns(&mut self, remap: &ColumnRemap) {
        self.registry.remap_columns(remap);
        for write in &mut self.schedule {
            write.cell.col = remap.apply(write.cell.col);
        }
        self.held = self
            .held
            .drain()
            .map(|(c, w)| (CellRef::new(c.row, remap.apply(c.col)), w))
            .collect();
    }

    /// Abandon every transition and queued write.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.schedule.clear();
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Badge, Placeholder};
    use crate::model::{Column, QueryResult};
    use serde_json::json;
    use std::time::Duration;

    fn timings() -> AnimationTimings {
        AnimationTimings {
            fade: Duration::from_millis(100),
            pulse: Duration::from_millis(100),
            hold: Duration::from_millis(100),
            stagger: Duration::from_millis(20),
        }
    }

    fn model(rows: usize) -> ResultModel {
        ResultModel::from_query(QueryResult {
            columns: vec![Column::new("id", "string"), Column::new("resolved", "string")],
            rows: (0..rows).map(|i| vec![json!(i), json!(null)]).collect(),
            total_records: rows as u64,
            timestamp: chrono::Utc::now(),
            execution_time_ms: 0,
        })
        .unwrap()
    }

    fn resolved(name: &str) -> Cell {
        Cell::Resolved(Badge {
            text: name.to_string(),
            detail: String::new(),
        })
    }

    fn failed() -> Cell {
        Cell::Failed(Badge {
            text: "Not found".to_string(),
            detail: String::new(),
        })
    }

    #[test]
    fn test_non_loading_cell_applies_immediately() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let outcome = updater.apply_cell_value(&mut m, cell, resolved("A"), Instant::now());
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(m.cell(0, 1), Some(&resolved("A")));
        assert!(!updater.registry().is_animating(cell));
    }

    #[test]
    fn test_loading_to_resolved_fades() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let now = Instant::now();
        updater.apply_cell_value(&mut m, cell, Cell::Loading, now);

        let outcome = updater.apply_cell_value(&mut m, cell, resolved("A"), now);
        assert_eq!(outcome, ApplyOutcome::Transitioning(TransitionKind::Fade));
        // content swaps only once the fade-out is done
        assert_eq!(m.cell(0, 1), Some(&Cell::Loading));

        updater.tick(&mut m, now + Duration::from_millis(100));
        assert_eq!(m.cell(0, 1), Some(&resolved("A")));
        assert!(updater.registry().is_animating(cell));

        updater.tick(&mut m, now + Duration::from_millis(200));
        assert!(!updater.registry().is_animating(cell));
    }

    #[test]
    fn test_loading_to_error_pulses() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let now = Instant::now();
        updater.apply_cell_value(&mut m, cell, Cell::Loading, now);
        let outcome = updater.apply_cell_value(&mut m, cell, failed(), now);
        assert_eq!(outcome, ApplyOutcome::Transitioning(TransitionKind::PulseToError));
        updater.tick(&mut m, now + Duration::from_millis(300));
        assert_eq!(m.cell(0, 1), Some(&failed()));
    }

    #[test]
    fn test_guarded_write_during_transition_never_lands() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let now = Instant::now();
        updater.apply_cell_value(&mut m, cell, Cell::Loading, now);
        updater.apply_cell_value(&mut m, cell, resolved("A"), now);

        let outcome =
            updater.apply_guarded(&mut m, cell, failed(), WriteGuard::PreserveResolved, now);
        assert_eq!(outcome, ApplyOutcome::Deferred);
        // the transition still owns the cell
        assert_eq!(m.cell(0, 1), Some(&Cell::Loading));

        updater.tick(&mut m, now + Duration::from_secs(1));
        assert_eq!(m.cell(0, 1), Some(&resolved("A")));
        assert!(!updater.is_active());
    }

    #[test]
    fn test_held_write_replays_after_pulse() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let now = Instant::now();
        updater.apply_cell_value(&mut m, cell, Cell::Loading, now);
        updater.apply_cell_value(&mut m, cell, failed(), now);

        let later = now + Duration::from_millis(50);
        updater.apply_cell_value(&mut m, cell, Cell::Loading, later);
        let outcome = updater.apply_cell_value(&mut m, cell, resolved("A"), later);
        assert_eq!(outcome, ApplyOutcome::Deferred);
        assert_eq!(updater.held_write(cell), Some(&resolved("A")));
        assert!(updater.is_busy(cell));

        updater.tick(&mut m, now + Duration::from_secs(1));
        assert_eq!(m.cell(0, 1), Some(&resolved("A")));
        assert_eq!(updater.held_write(cell), None);
    }

    #[test]
    fn test_preserve_resolved_guard() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let cell = CellRef::new(0, 1);
        let now = Instant::now();
        updater.apply_cell_value(&mut m, cell, resolved("A"), now);
        let outcome = updater.apply_guarded(
            &mut m,
            cell,
            Cell::Placeholder(Placeholder::NotResolved),
            WriteGuard::PreserveResolved,
            now,
        );
        assert_eq!(outcome, ApplyOutcome::Guarded);
        assert_eq!(m.cell(0, 1), Some(&resolved("A")));
    }

    #[test]
    fn test_staggered_writes_land_one_step_apart() {
        let mut m = model(3);
        let mut updater = CellUpdater::new(timings());
        let now = Instant::now();
        let writes = (0..3)
            .map(|row| (CellRef::new(row, 1), resolved("x"), WriteGuard::Any))
            .collect();

        let changed = updater.apply_staggered(&mut m, writes, now);
        assert_eq!(changed, vec![CellRef::new(0, 1)]);
        assert_eq!(updater.pending_writes(), 2);
        assert!(updater.is_busy(CellRef::new(2, 1)));

        let changed = updater.tick(&mut m, now + Duration::from_millis(20));
        assert_eq!(changed, vec![CellRef::new(1, 1)]);

        updater.tick(&mut m, now + Duration::from_millis(40));
        assert_eq!(updater.pending_writes(), 0);
        assert_eq!(m.cell(2, 1), Some(&resolved("x")));
    }

    #[test]
    fn test_out_of_bounds_write() {
        let mut m = model(1);
        let mut updater = CellUpdater::new(timings());
        let outcome = updater.apply_cell_value(&mut m, CellRef::new(9, 9), Cell::Loading, Instant::now());
        assert_eq!(outcome, ApplyOutcome::OutOfBounds);
    }

    #[test]
    fn test_remap_rows_moves_queued_writes() {
        let mut m = model(2);
        let mut updater = CellUpdater::new(timings());
        let now = Instant::now();
        let writes = vec![
            (CellRef::new(1, 1), resolved("first"), WriteGuard::Any),
            (CellRef::new(0, 1), resolved("second"), WriteGuard::Any),
        ];
        updater.apply_staggered(&mut m, writes, now);
        updater.remap_rows(&Permutation::from_order(&[1, 0]));
        updater.tick(&mut m, now + Duration::from_millis(20));
        assert_eq!(m.cell(1, 1), Some(&resolved("second")));
    }
}
