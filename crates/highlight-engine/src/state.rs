//! Cross-move state shared by the sequence rules.
//!
//! Each tracker owns its own field of [`SharedState`], so no two rules can
//! step on each other's bookkeeping. Everything is kept in ordered maps so a
//! run is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::board_utils::Flank;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{Phase, Side};

/// A run of qualifying half-moves by one side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Streak {
    pub count: u32,
    pub first: u32,
    pub last: u32,
    /// Evaluation samples collected along the way
    pub evals: Vec<f64>,
    /// Side-relative evaluation before the streak began
    pub baseline: Option<f64>,
}

impl Streak {
    fn start(move_number: u32, baseline: Option<f64>) -> Self {
        Self {
            count: 0,
            first: move_number,
            last: move_number,
            evals: Vec::new(),
            baseline,
        }
    }

    /// Spread between the highest and lowest sample
    pub fn eval_range(&self) -> Option<f64> {
        let max = self.evals.iter().copied().reduce(f64::max)?;
        let min = self.evals.iter().copied().reduce(f64::min)?;
        Some(max - min)
    }
}

/// Per-side streaks of consecutive move numbers. Each side fires at most once.
#[derive(Debug, Clone, Default)]
pub struct StreakTracker {
    streaks: BTreeMap<Side, Streak>,
    fired: BTreeSet<Side>,
}

impl StreakTracker {
    /// Count a qualifying half-move. It continues the streak when it falls on
    /// the same or the next move number, otherwise a new streak starts.
    pub fn extend(
        &mut self,
        side: Side,
        move_number: u32,
        eval: Option<f64>,
        baseline: Option<f64>,
    ) -> Streak {
        let streak = self.streaks.entry(side).or_default();
        if streak.count == 0 || move_number > streak.last + 1 {
            *streak = Streak::start(move_number, baseline);
        }
        streak.count += 1;
        streak.last = move_number;
        if let Some(eval) = eval {
            streak.evals.push(eval);
        }
        streak.clone()
    }

    /// A non-qualifying half-move. The streak survives a one-move gap.
    pub fn interrupt(&mut self, side: Side, move_number: u32) {
        if self
            .streaks
            .get(&side)
            .is_some_and(|s| move_number > s.last + 1)
        {
            self.streaks.remove(&side);
        }
    }

    pub fn reset(&mut self, side: Side) {
        self.streaks.remove(&side);
    }

    pub fn get(&self, side: Side) -> Option<&Streak> {
        self.streaks.get(&side)
    }

    pub fn has_fired(&self, side: Side) -> bool {
        self.fired.contains(&side)
    }

    /// Mark the side as fired; false if it already had
    pub fn fire(&mut self, side: Side) -> bool {
        self.fired.insert(side)
    }
}

/// A declared multi-move span
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MoveRange {
    pub side: Side,
    pub first: u32,
    pub last: u32,
    pub rule_type: RuleKind,
}

impl MoveRange {
    pub fn from_highlight(highlight: &Highlight) -> Option<Self> {
        highlight.move_number_end.map(|last| Self {
            side: highlight.side,
            first: highlight.move_number,
            last,
            rule_type: highlight.rule_type,
        })
    }

    /// Inside `(first, last]`
    pub fn contains_strictly(&self, move_number: u32) -> bool {
        move_number > self.first && move_number <= self.last
    }

    /// A span starting anywhere but `first` that touches this range
    pub fn overlaps(&self, first: u32, last: u32) -> bool {
        first != self.first && first <= self.last && self.first <= last
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissStreak {
    pub count: u32,
    pub first: u32,
    pub last: u32,
    pub best_move: String,
}

/// Consecutive missed mates per (side, phase)
#[derive(Debug, Clone, Default)]
pub struct DelayedMatingTracker {
    streaks: BTreeMap<(Side, Phase), MissStreak>,
    emitted: BTreeSet<(Side, Phase)>,
    ranges: Vec<MoveRange>,
}

impl DelayedMatingTracker {
    pub fn record_miss(
        &mut self,
        side: Side,
        phase: Phase,
        move_number: u32,
        best_move: &str,
    ) -> MissStreak {
        let streak = self
            .streaks
            .entry((side, phase))
            .and_modify(|s| {
                s.count += 1;
                s.last = move_number;
                s.best_move = best_move.to_string();
            })
            .or_insert_with(|| MissStreak {
                count: 1,
                first: move_number,
                last: move_number,
                best_move: best_move.to_string(),
            });
        streak.clone()
    }

    pub fn clear(&mut self, side: Side, phase: Phase) {
        self.streaks.remove(&(side, phase));
    }

    /// Record the ranged highlight for this key; false if one already exists
    pub fn declare(&mut self, side: Side, phase: Phase, first: u32, last: u32) -> bool {
        if !self.emitted.insert((side, phase)) {
            return false;
        }
        self.ranges.push(MoveRange {
            side,
            first,
            last,
            rule_type: RuleKind::DelayedMating,
        });
        true
    }

    pub fn ranges(&self) -> &[MoveRange] {
        &self.ranges
    }
}

#[derive(Debug, Clone, Default)]
pub struct PawnStormTracker {
    emitted: BTreeSet<(Side, Flank, u32)>,
}

impl PawnStormTracker {
    pub fn mark(&mut self, side: Side, flank: Flank, move_number: u32) -> bool {
        self.emitted.insert((side, flank, move_number))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZugzwangTracker {
    last: BTreeMap<Side, u32>,
}

impl ZugzwangTracker {
    pub fn record(&mut self, side: Side, move_number: u32) {
        self.last.insert(side, move_number);
    }

    /// Did `side` have a zugzwang within `window` moves before `move_number`?
    pub fn recent(&self, side: Side, move_number: u32, window: u32) -> bool {
        self.last
            .get(&side)
            .is_some_and(|last| move_number.saturating_sub(*last) <= window)
    }
}

fn half_move_index(move_number: u32, side: Side) -> u32 {
    move_number.saturating_sub(1) * 2 + u32::from(!side.is_white())
}

#[derive(Debug, Clone, Default)]
pub struct MomentumTracker {
    last_shift: Option<(u32, Side)>,
}

impl MomentumTracker {
    /// The previous shift happened within the two preceding half-moves
    pub fn is_again(&self, move_number: u32, side: Side) -> bool {
        self.last_shift.is_some_and(|(last_move, last_side)| {
            let now = half_move_index(move_number, side);
            let then = half_move_index(last_move, last_side);
            now > then && now - then <= 2
        })
    }

    pub fn record(&mut self, move_number: u32, side: Side) {
        self.last_shift = Some((move_number, side));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SwingDirection {
    Increased,
    Decreased,
}

impl SwingDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SwingDirection::Increased => "increased",
            SwingDirection::Decreased => "decreased",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwingCandidate {
    pub swing: f64,
    pub highlight: Highlight,
}

/// Largest evaluation swing per (side, phase, direction), emitted after the pass
#[derive(Debug, Clone, Default)]
pub struct EvalSwingTracker {
    candidates: BTreeMap<(Side, Phase, SwingDirection), SwingCandidate>,
}

impl EvalSwingTracker {
    pub fn offer(&mut self, key: (Side, Phase, SwingDirection), swing: f64, highlight: Highlight) {
        let replace = self
            .candidates
            .get(&key)
            .map_or(true, |current| swing > current.swing);
        if replace {
            self.candidates.insert(key, SwingCandidate { swing, highlight });
        }
    }

    pub fn highlights(&self) -> Vec<Highlight> {
        self.candidates
            .values()
            .map(|c| c.highlight.clone())
            .collect()
    }
}

/// Everything rules carry from one move to the next within a run
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    pub perpetual_check: StreakTracker,
    pub windmill: StreakTracker,
    pub fortress: StreakTracker,
    pub delayed_mating: DelayedMatingTracker,
    pub pawn_storm: PawnStormTracker,
    pub zugzwang: ZugzwangTracker,
    pub momentum: MomentumTracker,
    pub eval_swing: EvalSwingTracker,
}

impl SharedState {
    /// Ranges declared through state rather than through highlights
    pub fn declared_ranges(&self) -> Vec<MoveRange> {
        self.delayed_mating.ranges().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_extends_on_consecutive_moves() {
        let mut tracker = StreakTracker::default();
        tracker.extend(Side::White, 20, Some(10.0), None);
        tracker.extend(Side::White, 21, Some(30.0), None);
        let streak = tracker.extend(Side::White, 22, Some(20.0), None);
        assert_eq!(streak.count, 3);
        assert_eq!((streak.first, streak.last), (20, 22));
        assert_eq!(streak.eval_range(), Some(20.0));
    }

    #[test]
    fn test_streak_restarts_after_gap() {
        let mut tracker = StreakTracker::default();
        tracker.extend(Side::Black, 10, None, None);
        let streak = tracker.extend(Side::Black, 12, None, None);
        assert_eq!(streak.count, 1);
        assert_eq!(streak.first, 12);
    }

    #[test]
    fn test_interrupt_tolerates_one_move() {
        let mut tracker = StreakTracker::default();
        tracker.extend(Side::White, 5, None, None);
        tracker.interrupt(Side::White, 6);
        assert!(tracker.get(Side::White).is_some());
        tracker.interrupt(Side::White, 7);
        assert!(tracker.get(Side::White).is_none());
    }

    #[test]
    fn test_fire_once() {
        let mut tracker = StreakTracker::default();
        assert!(tracker.fire(Side::White));
        assert!(!tracker.fire(Side::White));
        assert!(tracker.fire(Side::Black));
    }

    #[test]
    fn test_delayed_mating_streak_and_ranges() {
        let mut tracker = DelayedMatingTracker::default();
        tracker.record_miss(Side::White, Phase::Middlegame, 25, "Qh7#");
        let streak = tracker.record_miss(Side::White, Phase::Middlegame, 26, "Qg7#");
        assert_eq!(streak.count, 2);
        assert_eq!(streak.best_move, "Qg7#");
        assert!(tracker.declare(Side::White, Phase::Middlegame, 25, 26));
        assert!(!tracker.declare(Side::White, Phase::Middlegame, 25, 27));
        assert_eq!(tracker.ranges().len(), 1);

        tracker.clear(Side::White, Phase::Middlegame);
        let fresh = tracker.record_miss(Side::White, Phase::Middlegame, 30, "Rh8#");
        assert_eq!(fresh.count, 1);
    }

    #[test]
    fn test_range_contains_strictly() {
        let range = MoveRange {
            side: Side::White,
            first: 10,
            last: 12,
            rule_type: RuleKind::Windmill,
        };
        assert!(!range.contains_strictly(10));
        assert!(range.contains_strictly(11));
        assert!(range.contains_strictly(12));
        assert!(!range.contains_strictly(13));
    }

    #[test]
    fn test_momentum_again() {
        let mut tracker = MomentumTracker::default();
        assert!(!tracker.is_again(15, Side::White));
        tracker.record(15, Side::White);
        assert!(tracker.is_again(15, Side::Black));
        assert!(tracker.is_again(16, Side::White));
        assert!(!tracker.is_again(16, Side::Black));
    }

    #[test]
    fn test_zugzwang_recent() {
        let mut tracker = ZugzwangTracker::default();
        tracker.record(Side::Black, 40);
        assert!(tracker.recent(Side::Black, 42, 2));
        assert!(!tracker.recent(Side::Black, 43, 2));
        assert!(!tracker.recent(Side::White, 41, 2));
    }

    #[test]
    fn test_eval_swing_keeps_largest() {
        let mut tracker = EvalSwingTracker::default();
        let key = (Side::White, Phase::Middlegame, SwingDirection::Increased);
        let make = |n: u32, text: &str| Highlight::ranged(n, n, Side::White, RuleKind::EvaluationSwing, 30, text);
        tracker.offer(key, 250.0, make(14, "small"));
        tracker.offer(key, 400.0, make(18, "big"));
        tracker.offer(key, 300.0, make(20, "medium"));
        let highlights = tracker.highlights();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].description, "big");
    }

    #[test]
    fn test_pawn_storm_mark() {
        let mut tracker = PawnStormTracker::default();
        assert!(tracker.mark(Side::White, Flank::Kingside, 18));
        assert!(!tracker.mark(Side::White, Flank::Kingside, 18));
        assert!(tracker.mark(Side::White, Flank::Queenside, 18));
    }
}
