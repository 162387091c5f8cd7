//! Per-cell transition state machine.
//!
//! A cell is either idle or mid-transition. While a transition is running the
//! cell's content belongs to the transition: the replacement value is held in
//! the transition and swapped in when the fade-out phase ends. Nothing else may
//! write the cell until the transition finishes or is abandoned.

use crate::cell::Cell;
use crate::model::{ColumnRemap, Permutation};
use crate::selection::CellRef;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationTimings {
    pub fade: Duration,
    pub pulse: Duration,
    pub hold: Duration,
    /// Delay between consecutive cells of one batch.
    pub stagger: Duration,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            fade: Duration::from_millis(150),
            pulse: Duration::from_millis(300),
            hold: Duration::from_millis(400),
            stagger: Duration::from_millis(40),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Loading indicator fades out, resolved badge fades in.
    Fade,
    /// Loading indicator shifts color and pulses, holds, then fades to the error badge.
    PulseToError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Pulse,
    Hold,
    FadeOut,
    FadeIn,
}

impl TransitionPhase {
    fn duration(self, timings: &AnimationTimings) -> Duration {
        match self {
            TransitionPhase::Pulse => timings.pulse,
            TransitionPhase::Hold => timings.hold,
            TransitionPhase::FadeOut | TransitionPhase::FadeIn => timings.fade,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            TransitionPhase::Pulse => Some(TransitionPhase::Hold),
            TransitionPhase::Hold => Some(TransitionPhase::FadeOut),
            TransitionPhase::FadeOut => Some(TransitionPhase::FadeIn),
            TransitionPhase::FadeIn => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub phase: TransitionPhase,
    pub started_at: Instant,
    pub phase_started_at: Instant,
    /// Content waiting to be swapped in; `None` once swapped.
    pending: Option<Cell>,
}

impl Transition {
    fn new(kind: TransitionKind, pending: Cell, now: Instant) -> Self {
        let phase = match kind {
            TransitionKind::Fade => TransitionPhase::FadeOut,
            TransitionKind::PulseToError => TransitionPhase::Pulse,
        };
        Self {
            kind,
            phase,
            started_at: now,
            phase_started_at: now,
            pending: Some(pending),
        }
    }

    pub fn pending(&self) -> Option<&Cell> {
        self.pending.as_ref()
    }

    /// Fraction of the current phase that has elapsed, clamped to `0.0..=1.0`.
    pub fn progress(&self, now: Instant, timings: &AnimationTimings) -> f32 {
        let total = self.phase.duration(timings);
        if total.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.phase_started_at);
        (elapsed.as_secs_f32() / total.as_secs_f32()).clamp(0.0, 1.0)
    }
}

/// Animation state a renderer reads for one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAnimation<'a> {
    Idle,
    Transitioning(&'a Transition),
}

/// Something the registry needs the grid to do after advancing.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionStep {
    /// Fade-out finished: write this value into the cell.
    Swap { cell: CellRef, value: Cell },
    /// Transition done; the cell is idle again.
    Finished { cell: CellRef },
}

#[derive(Debug, Clone, Default)]
pub struct AnimationRegistry {
    active: HashMap<CellRef, Transition>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_animating(&self, cell: CellRef) -> bool {
        self.active.contains_key(&cell)
    }

    pub fn state(&self, cell: CellRef) -> CellAnimation<'_> {
        match self.active.get(&cell) {
            Some(transition) => CellAnimation::Transitioning(transition),
            None => CellAnimation::Idle,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Register a transition. Returns false if the cell is already transitioning.
    pub fn begin(&mut self, cell: CellRef, kind: TransitionKind, value: Cell, now: Instant) -> bool {
        if self.active.contains_key(&cell) {
            return false;
        }
        self.active.insert(cell, Transition::new(kind, value, now));
        true
    }

    /// Move every transition forward to `now`, possibly across several phases.
    pub fn advance(&mut self, now: Instant, timings: &AnimationTimings) -> Vec<TransitionStep> {
        let mut steps = Vec::new();
        let mut finished = Vec::new();
        for (&cell, transition) in self.active.iter_mut() {
            loop {
                let due = transition.phase_started_at + transition.phase.duration(timings);
                if now < due {
                    break;
                }
                if transition.phase == TransitionPhase::FadeOut {
                    if let Some(value) = transition.pending.take() {
                        steps.push(TransitionStep::Swap { cell, value });
                    }
                }
                match transition.phase.next() {
                    Some(next) => {
                        transition.phase = next;
                        transition.phase_started_at = due;
                    }
                    None => {
                        finished.push(cell);
                        break;
                    }
                }
            }
        }
        for cell in finished {
            self.active.remove(&cell);
            steps.push(TransitionStep::Finished { cell });
        }
        steps
    }

    pub fn remap_rows(&mut self, permutation: &Permutation) {
        self.active = self
            .active
            .drain()
            .map(|(c, t)| (CellRef::new(permutation.apply(c.row), c.col), t))
            .collect();
    }

    pub fn remap_columns(&mut self, remap: &ColumnRemap) {
        self.active = self
            .active
            .drain()
            .map(|(c, t)| (CellRef::new(c.row, remap.apply(c.col)), t))
            .collect();
    }

    /// Abandon every transition.
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Badge, Placeholder};

    fn timings() -> AnimationTimings {
        AnimationTimings {
            fade: Duration::from_millis(100),
            pulse: Duration::from_millis(200),
            hold: Duration::from_millis(300),
            stagger: Duration::from_millis(10),
        }
    }

    fn badge() -> Cell {
        Cell::Resolved(Badge {
            text: "Alice".to_string(),
            detail: "user".to_string(),
        })
    }

    #[test]
    fn test_begin_rejects_second_transition() {
        let mut registry = AnimationRegistry::new();
        let now = Instant::now();
        let cell = CellRef::new(0, 1);
        assert!(registry.begin(cell, TransitionKind::Fade, badge(), now));
        assert!(!registry.begin(cell, TransitionKind::PulseToError, Cell::Loading, now));
        assert!(registry.is_animating(cell));
    }

    #[test]
    fn test_fade_swaps_after_fade_out_then_finishes() {
        let t = timings();
        let mut registry = AnimationRegistry::new();
        let start = Instant::now();
        let cell = CellRef::new(2, 0);
        registry.begin(cell, TransitionKind::Fade, badge(), start);

        assert!(registry.advance(start + Duration::from_millis(50), &t).is_empty());

        let steps = registry.advance(start + Duration::from_millis(100), &t);
        assert_eq!(steps, vec![TransitionStep::Swap { cell, value: badge() }]);
        assert!(registry.is_animating(cell));

        let steps = registry.advance(start + Duration::from_millis(200), &t);
        assert_eq!(steps, vec![TransitionStep::Finished { cell }]);
        assert!(!registry.is_animating(cell));
    }

    #[test]
    fn test_pulse_walks_all_phases() {
        let t = timings();
        let mut registry = AnimationRegistry::new();
        let start = Instant::now();
        let cell = CellRef::new(0, 0);
        let error = Cell::Placeholder(Placeholder::NotResolved);
        registry.begin(cell, TransitionKind::PulseToError, error.clone(), start);

        registry.advance(start + Duration::from_millis(250), &t);
        match registry.state(cell) {
            CellAnimation::Transitioning(tr) => assert_eq!(tr.phase, TransitionPhase::Hold),
            CellAnimation::Idle => panic!("expected transition"),
        }

        // pulse 200 + hold 300 + fade-out 100 = 600
        let steps = registry.advance(start + Duration::from_millis(600), &t);
        assert_eq!(steps, vec![TransitionStep::Swap { cell, value: error }]);
    }

    #[test]
    fn test_large_gap_finishes_in_one_advance() {
        let t = timings();
        let mut registry = AnimationRegistry::new();
        let start = Instant::now();
        let cell = CellRef::new(0, 0);
        registry.begin(cell, TransitionKind::Fade, badge(), start);
        let steps = registry.advance(start + Duration::from_secs(5), &t);
        assert_eq!(
            steps,
            vec![
                TransitionStep::Swap { cell, value: badge() },
                TransitionStep::Finished { cell },
            ]
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remap_rows_moves_transitions() {
        let mut registry = AnimationRegistry::new();
        registry.begin(CellRef::new(0, 1), TransitionKind::Fade, badge(), Instant::now());
        registry.remap_rows(&Permutation::from_order(&[1, 0]));
        assert!(registry.is_animating(CellRef::new(1, 1)));
        assert!(!registry.is_animating(CellRef::new(0, 1)));
    }
}
