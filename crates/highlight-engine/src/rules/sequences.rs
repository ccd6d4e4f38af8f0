//! Rules whose patterns span several moves. Each keeps its memory in its
//! own tracker inside [`SharedState`].

use super::{cpl_below, Rule, PRECISE_CPL};
use crate::board_utils::{relative_rank, Flank, MovedPiece};
use crate::config::RuleSettings;
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{Evaluation, MoveRecord, Side, SideMove};
use crate::state::{SharedState, SwingDirection};

use chess::Piece;

fn own_eval(side_move: &SideMove, side: Side) -> Option<f64> {
    side_move.centipawns().map(|cp| cp * side.sign())
}

fn sign_changed(before: f64, after: f64) -> bool {
    (before > 0.0 && after < 0.0) || (before < 0.0 && after > 0.0)
}

/// Repeated checks that the defender cannot escape
pub struct PerpetualCheckRule {
    min_checks: u32,
    max_eval_range: f64,
}

impl PerpetualCheckRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_checks: settings.param_u32("min_checks", 3),
            max_eval_range: settings.param("max_eval_range", 50.0),
        }
    }
}

impl Rule for PerpetualCheckRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PerpetualCheck
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        _ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() {
                continue;
            }
            if !mv.gives_check() || mv.is_capture() {
                state.perpetual_check.interrupt(side, n);
                continue;
            }

            let streak = state.perpetual_check.extend(side, n, mv.centipawns(), None);
            let steady = streak.evals.len() >= self.min_checks as usize
                && streak
                    .eval_range()
                    .is_some_and(|range| range < self.max_eval_range);
            if streak.count >= self.min_checks && steady && state.perpetual_check.fire(side) {
                highlights.push(Highlight::ranged(
                    streak.first,
                    streak.last,
                    side,
                    RuleKind::PerpetualCheck,
                    46,
                    format!("{} initiated perpetual check", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A run of checks that each win material
pub struct WindmillRule {
    min_checks: u32,
    eval_tolerance: f64,
}

impl WindmillRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_checks: settings.param_u32("min_checks", 3),
            eval_tolerance: settings.param("eval_tolerance", 50.0),
        }
    }
}

impl Rule for WindmillRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Windmill
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() {
                continue;
            }
            if !(mv.gives_check() && mv.is_capture()) {
                state.windmill.interrupt(side, n);
                continue;
            }

            let baseline = ctx.eval_before(side).map(|cp| cp * side.sign());
            let current = own_eval(mv, side);
            let streak = state.windmill.extend(side, n, current, baseline);
            if streak.count < self.min_checks || state.windmill.has_fired(side) {
                continue;
            }
            let holding = match (streak.baseline, current) {
                (Some(before), Some(now)) => now >= before - self.eval_tolerance,
                _ => true,
            };
            if holding && state.windmill.fire(side) {
                highlights.push(Highlight::ranged(
                    streak.first,
                    streak.last,
                    side,
                    RuleKind::Windmill,
                    47,
                    format!(
                        "{} executed a windmill (series of checks and captures)",
                        side.name()
                    ),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Forced mates that were on the board and not played
pub struct DelayedMatingRule {
    max_mate_distance: u32,
    min_misses: u32,
}

impl DelayedMatingRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            max_mate_distance: settings.param_u32("max_mate_distance", 5),
            min_misses: settings.param_u32("min_misses", 2),
        }
    }

    fn mate_in_reach(&self, mv: &SideMove, side: Side) -> bool {
        match mv.evaluation() {
            Some(Evaluation::Mate {
                for_white,
                distance,
            }) => {
                for_white == side.is_white()
                    && distance.is_none_or(|d| d <= self.max_mate_distance)
            }
            _ => false,
        }
    }
}

impl Rule for DelayedMatingRule {
    fn kind(&self) -> RuleKind {
        RuleKind::DelayedMating
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let phase = ctx.phase();
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() {
                continue;
            }
            let Some(best) = mv.best_move.as_deref() else {
                state.delayed_mating.clear(side, phase);
                continue;
            };
            let mate_on_board =
                best.contains('#') || mv.evaluation().is_some_and(|e| e.is_mate_for(side));
            if !mate_on_board || mv.played_best() {
                state.delayed_mating.clear(side, phase);
                continue;
            }
            // A distant mate or a small loss leaves the streak as it was
            if !self.mate_in_reach(mv, side) || mv.cpl.is_none_or(|cpl| cpl <= ctx.thresholds.good) {
                continue;
            }

            let streak = state
                .delayed_mating
                .record_miss(side, phase, record.move_number, best);
            highlights.push(Highlight::new(
                record,
                side,
                RuleKind::MissedMate,
                50,
                format!("{} missed a checkmate opportunity (best move was {best})", side.name()),
            ));
            if streak.count >= self.min_misses
                && state
                    .delayed_mating
                    .declare(side, phase, streak.first, streak.last)
            {
                highlights.push(Highlight::ranged(
                    streak.first,
                    streak.last,
                    side,
                    RuleKind::DelayedMating,
                    55,
                    format!(
                        "{} delayed mating (best move was {})",
                        side.name(),
                        streak.best_move
                    ),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Adjacent flank pawns rolling forward together in the middlegame
pub struct PawnStormRule {
    window: usize,
}

impl PawnStormRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            window: settings.param_u32("window", 4).max(1) as usize,
        }
    }

    /// A straight forward pawn step, as opposed to a capture or a retreat
    fn advance(moved: Option<MovedPiece>, side: Side) -> Option<MovedPiece> {
        moved.filter(|m| {
            m.piece == Piece::Pawn
                && m.from.get_file() == m.to.get_file()
                && relative_rank(m.to, side.color()) > relative_rank(m.from, side.color())
        })
    }

    fn coordinated(board: &chess::Board, side: Side, files: (usize, usize)) -> bool {
        let color = side.color();
        let pawns = *board.pieces(Piece::Pawn) & *board.color_combined(color);
        let ranks_on = |file: usize| -> Vec<usize> {
            pawns
                .into_iter()
                .filter(|sq| sq.get_file().to_index() == file)
                .map(|sq| relative_rank(sq, color))
                .collect()
        };
        let (a, b) = (ranks_on(files.0), ranks_on(files.1));
        let close = a
            .iter()
            .flat_map(|ra| b.iter().map(move |rb| ra.abs_diff(*rb)))
            .min()
            .is_some_and(|diff| diff <= 1);
        let advanced = a.iter().chain(b.iter()).max().is_some_and(|r| *r >= 5);
        close && advanced
    }

    fn storm(&self, ctx: &EvaluationContext<'_>, side: Side) -> Result<Option<Flank>, HighlightError> {
        let Some(current) = Self::advance(ctx.moved_piece(side)?, side) else {
            return Ok(None);
        };
        let Some(flank) = Flank::of(current.to.get_file()) else {
            return Ok(None);
        };

        let mut files = vec![current.to.get_file().to_index()];
        let first = (ctx.move_index + 1).saturating_sub(self.window);
        for index in first..ctx.move_index {
            let earlier = Self::advance(ctx.positions.moved_piece(index, side)?, side);
            if let Some(m) = earlier.filter(|m| Flank::of(m.to.get_file()) == Some(flank)) {
                files.push(m.to.get_file().to_index());
            }
        }
        files.sort_unstable();
        files.dedup();

        let Some(board) = ctx.board_after(side)? else {
            return Ok(None);
        };
        let stormed = files
            .windows(2)
            .filter(|pair| pair[1] == pair[0] + 1)
            .any(|pair| Self::coordinated(&board, side, (pair[0], pair[1])));
        Ok(stormed.then_some(flank))
    }
}

impl Rule for PawnStormRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PawnStorm
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        if n <= ctx.phases.opening_end || n >= ctx.phases.middlegame_end {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            if !record.side(side).is_pawn_move() {
                continue;
            }
            let Some(flank) = self.storm(ctx, side)? else {
                continue;
            };
            if state.pawn_storm.mark(side, flank, n) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::PawnStorm,
                    22,
                    format!("{} initiated a pawn storm on the {}", side.name(), flank.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Holding a level evaluation while down material
pub struct DefensiveFortressRule {
    min_moves: u32,
    material_deficit: i32,
    eval_window: f64,
}

impl DefensiveFortressRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_moves: settings.param_u32("min_moves", 3),
            material_deficit: settings.param("material_deficit", 300.0) as i32,
            eval_window: settings.param("eval_window", 100.0),
        }
    }
}

impl Rule for DefensiveFortressRule {
    fn kind(&self) -> RuleKind {
        RuleKind::DefensiveFortress
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        _ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() {
                continue;
            }
            let diff = mv.material - record.side(side.opponent()).material;
            if diff > -self.material_deficit {
                state.fortress.reset(side);
                continue;
            }
            let Some(eval) = own_eval(mv, side).filter(|e| e.abs() <= self.eval_window) else {
                state.fortress.interrupt(side, n);
                continue;
            };

            let streak = state.fortress.extend(side, n, Some(eval), None);
            if streak.count >= self.min_moves && state.fortress.fire(side) {
                highlights.push(Highlight::ranged(
                    streak.first,
                    streak.last,
                    side,
                    RuleKind::DefensiveFortress,
                    29,
                    format!("{} maintained a defensive fortress", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Every move available in a thin endgame makes things worse
pub struct ZugzwangRule;

impl ZugzwangRule {
    const MIN_CPL: f64 = 150.0;
    const MAX_MATERIAL: i32 = 2000;
    const WINDOW: u32 = 2;
}

impl Rule for ZugzwangRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Zugzwang
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        let Some(prev) = ctx.prev else {
            return Ok(highlights);
        };
        if n < ctx.phases.middlegame_end
            || record.white.material + record.black.material >= Self::MAX_MATERIAL
        {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            let mv = record.side(side);
            let all_bad = [mv.cpl, mv.cpl_2, mv.cpl_3]
                .iter()
                .all(|c| c.is_some_and(|c| c > Self::MIN_CPL));
            if !mv.has_move() || !all_bad {
                continue;
            }
            let worsened = own_eval(prev.side(side), side)
                .zip(own_eval(mv, side))
                .is_some_and(|(before, after)| before - after > 50.0);
            if !worsened || state.zugzwang.recent(side.opponent(), n, Self::WINDOW) {
                continue;
            }
            state.zugzwang.record(side, n);
            highlights.push(Highlight::new(
                record,
                side,
                RuleKind::Zugzwang,
                35,
                format!("{} is in zugzwang (any move worsens the position)", side.name()),
            ));
        }
        Ok(highlights)
    }
}

/// The evaluation crosses zero on a sound move
pub struct MomentumShiftRule {
    min_change: f64,
}

impl MomentumShiftRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_change: settings.param("min_change", 200.0),
        }
    }

    fn eval_before(ctx: &EvaluationContext<'_>, record: &MoveRecord, side: Side) -> Option<f64> {
        let prev = ctx.prev?;
        match side {
            Side::White => prev.black.centipawns().or_else(|| prev.white.centipawns()),
            Side::Black => record.white.centipawns(),
        }
    }
}

impl Rule for MomentumShiftRule {
    fn kind(&self) -> RuleKind {
        RuleKind::MomentumShift
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let n = record.move_number;
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() || !cpl_below(mv, 50.0) {
                continue;
            }
            let (Some(before), Some(after)) = (Self::eval_before(ctx, record, side), mv.centipawns())
            else {
                continue;
            };
            if !sign_changed(before, after) || (after - before).abs() <= self.min_change {
                continue;
            }
            let description = if state.momentum.is_again(n, side) {
                "The advantage switched sides again"
            } else {
                "The advantage switched sides"
            };
            state.momentum.record(n, side);
            highlights.push(Highlight::new(record, side, RuleKind::MomentumShift, 45, description));
        }
        Ok(highlights)
    }
}

/// Large one-sided evaluation changes. Candidates go to the tracker and only
/// the biggest per side, phase and direction is emitted after the pass.
pub struct EvaluationSwingRule {
    min_swing: f64,
}

impl EvaluationSwingRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_swing: settings.param("min_swing", 200.0),
        }
    }
}

impl Rule for EvaluationSwingRule {
    fn kind(&self) -> RuleKind {
        RuleKind::EvaluationSwing
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let Some(prev) = ctx.prev else {
            return Ok(Vec::new());
        };
        let phase = ctx.phase();
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() {
                continue;
            }
            let (Some(before), Some(after)) = (prev.side(side).centipawns(), mv.centipawns()) else {
                continue;
            };
            let swing = (after - before).abs();
            if swing <= self.min_swing || sign_changed(before, after) {
                continue;
            }
            if mv.cpl.is_some_and(|cpl| cpl >= PRECISE_CPL) {
                continue;
            }
            if ctx
                .reply(side)
                .and_then(|reply| reply.cpl)
                .is_some_and(|cpl| cpl > 100.0)
            {
                continue;
            }

            let direction = if (after - before) * side.sign() > 0.0 {
                SwingDirection::Increased
            } else {
                SwingDirection::Decreased
            };
            let highlight = Highlight::new(
                record,
                side,
                RuleKind::EvaluationSwing,
                30,
                format!(
                    "{}'s evaluation {} by {:.1} pawns",
                    side.name(),
                    direction.as_str(),
                    swing / 100.0
                ),
            );
            state.eval_swing.offer((side, phase, direction), swing, highlight);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PhaseBounds;
    use crate::rules::test_support::{half, pair, run_rule, run_rule_with_state};

    const PHASES: PhaseBounds = PhaseBounds {
        opening_end: 10,
        middlegame_end: 30,
    };

    fn evaluated(san: &str, eval: &str, cpl: f64) -> SideMove {
        SideMove {
            san: Some(san.into()),
            eval: Some(eval.into()),
            cpl: Some(cpl),
            ..Default::default()
        }
    }

    fn capture(san: &str, eval: &str, letter: &str) -> SideMove {
        SideMove {
            capture: Some(letter.into()),
            ..evaluated(san, eval, 0.0)
        }
    }

    #[test]
    fn test_perpetual_check_fires_once() {
        let moves: Vec<MoveRecord> = (40..46)
            .map(|n| {
                let eval = if n % 2 == 0 { "+0.10" } else { "-0.10" };
                pair(n, evaluated("Qe8+", eval, 0.0), evaluated("Kh7", eval, 0.0))
            })
            .collect();
        let rule = PerpetualCheckRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].move_number, 40);
        assert_eq!(found[0].move_number_end, Some(42));
        assert_eq!(found[0].move_notation, "40-42.");
        assert_eq!(found[0].description, "White initiated perpetual check");
    }

    #[test]
    fn test_perpetual_check_needs_steady_evaluation() {
        let moves = vec![
            pair(40, evaluated("Qe8+", "+0.10", 0.0), half("Kh7")),
            pair(41, evaluated("Qh5+", "+1.50", 0.0), half("Kg8")),
            pair(42, evaluated("Qe8+", "+0.10", 0.0), half("Kh7")),
        ];
        let rule = PerpetualCheckRule::new(&RuleSettings::default());
        assert!(run_rule(&rule, &moves, PHASES).is_empty());
    }

    #[test]
    fn test_windmill_spans_three_checking_captures() {
        let moves = vec![
            pair(19, evaluated("Bg5", "+1.00", 0.0), evaluated("Kg8", "+1.00", 0.0)),
            pair(20, capture("Rxf7+", "+1.20", "p"), evaluated("Kg8", "+1.10", 0.0)),
            pair(21, capture("Rxb7+", "+1.40", "b"), evaluated("Kh8", "+1.40", 0.0)),
            pair(22, capture("Rxa7+", "+0.90", "p"), evaluated("Kg8", "+0.95", 0.0)),
            pair(23, evaluated("Rg7+", "+1.00", 0.0), evaluated("Kh8", "+1.00", 0.0)),
        ];
        let rule = WindmillRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].move_number, 20);
        assert_eq!(found[0].move_number_end, Some(22));
        assert_eq!(found[0].priority, 47);
    }

    #[test]
    fn test_delayed_mating_after_two_misses() {
        let miss = |san: &str| SideMove {
            best_move: Some("Qh7#".into()),
            ..evaluated(san, "M1", 300.0)
        };
        let moves = vec![
            pair(30, miss("Qg6"), evaluated("Kg8", "M2", 0.0)),
            pair(31, miss("Qe6+"), evaluated("Kh8", "M1", 0.0)),
            pair(32, evaluated("Qh3+", "+9.00", 0.0), evaluated("Kg8", "+9.00", 0.0)),
        ];
        let rule = DelayedMatingRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);

        let kinds: Vec<RuleKind> = found.iter().map(|h| h.rule_type).collect();
        assert_eq!(
            kinds,
            vec![RuleKind::MissedMate, RuleKind::MissedMate, RuleKind::DelayedMating]
        );
        let delayed = &found[2];
        assert_eq!(delayed.move_number, 30);
        assert_eq!(delayed.move_number_end, Some(31));
        assert_eq!(delayed.description, "White delayed mating (best move was Qh7#)");
    }

    #[test]
    fn test_playing_the_mate_is_not_a_miss() {
        let moves = vec![pair(
            30,
            SideMove {
                best_move: Some("Qh7#".into()),
                ..evaluated("Qh7#", "M1", 0.0)
            },
            SideMove::default(),
        )];
        let rule = DelayedMatingRule::new(&RuleSettings::default());
        assert!(run_rule(&rule, &moves, PHASES).is_empty());
    }

    #[test]
    fn test_mating_move_needs_a_mate_evaluation() {
        let moves = vec![pair(
            30,
            SideMove {
                best_move: Some("Qh7#".into()),
                ..evaluated("Qg6", "+4.50", 300.0)
            },
            SideMove::default(),
        )];
        let rule = DelayedMatingRule::new(&RuleSettings::default());
        assert!(run_rule(&rule, &moves, PHASES).is_empty());
    }

    #[test]
    fn test_distant_mate_keeps_the_streak() {
        let miss = |san: &str, eval: &str| SideMove {
            best_move: Some("Qh7#".into()),
            ..evaluated(san, eval, 300.0)
        };
        let moves = vec![
            pair(30, miss("Qg6", "M1"), SideMove::default()),
            pair(31, miss("Qf5", "M8"), SideMove::default()),
            pair(32, miss("Qe6+", "M2"), SideMove::default()),
        ];
        let rule = DelayedMatingRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);

        let kinds: Vec<RuleKind> = found.iter().map(|h| h.rule_type).collect();
        assert_eq!(
            kinds,
            vec![RuleKind::MissedMate, RuleKind::MissedMate, RuleKind::DelayedMating]
        );
        assert_eq!(found[2].move_number, 30);
        assert_eq!(found[2].move_number_end, Some(32));

        // A non-mating best move in between breaks it
        let broken = vec![
            pair(30, miss("Qg6", "M1"), SideMove::default()),
            pair(
                31,
                SideMove {
                    best_move: Some("Qf5".into()),
                    ..evaluated("Qg4", "+6.00", 300.0)
                },
                SideMove::default(),
            ),
            pair(32, miss("Qe6+", "M2"), SideMove::default()),
        ];
        let found = run_rule(&rule, &broken, PHASES);
        assert!(!found.iter().any(|h| h.rule_type == RuleKind::DelayedMating));
    }

    #[test]
    fn test_fortress_while_down_material() {
        let down = |n: u32| MoveRecord {
            move_number: n,
            white: SideMove {
                material: 1800,
                ..evaluated("Kf2", "-0.40", 10.0)
            },
            black: SideMove {
                material: 2300,
                ..evaluated("Rb1", "-0.50", 10.0)
            },
        };
        let moves: Vec<MoveRecord> = (50..55).map(down).collect();
        let rule = DefensiveFortressRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].side, Side::White);
        assert_eq!(found[0].move_number_end, Some(52));
    }

    #[test]
    fn test_momentum_shift_again() {
        let moves = vec![
            pair(20, evaluated("Nf3", "+1.50", 10.0), evaluated("Nc6", "+1.50", 10.0)),
            pair(21, evaluated("Bd3", "-1.00", 20.0), evaluated("Qe7", "+1.40", 10.0)),
        ];
        let rule = MomentumShiftRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].description, "The advantage switched sides");
        assert_eq!(found[1].side, Side::Black);
        assert_eq!(found[1].description, "The advantage switched sides again");
    }

    #[test]
    fn test_zugzwang_in_thin_endgame() {
        let squeezed = SideMove {
            cpl_2: Some(220.0),
            cpl_3: Some(300.0),
            material: 800,
            ..evaluated("Kd7", "+3.00", 200.0)
        };
        let moves = vec![
            pair(
                44,
                SideMove {
                    material: 900,
                    ..evaluated("Kd5", "+0.20", 0.0)
                },
                SideMove {
                    material: 800,
                    ..evaluated("Kc7", "+0.20", 0.0)
                },
            ),
            pair(
                45,
                SideMove {
                    material: 900,
                    ..evaluated("Ke6", "+0.30", 0.0)
                },
                squeezed,
            ),
        ];
        let found = run_rule(&ZugzwangRule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].side, Side::Black);
        assert_eq!(
            found[0].description,
            "Black is in zugzwang (any move worsens the position)"
        );
    }

    #[test]
    fn test_pawn_storm_on_kingside() {
        let fen_move = |san: &str, fen: &str| SideMove {
            san: Some(san.into()),
            fen: Some(fen.into()),
            ..Default::default()
        };
        let moves = vec![
            pair(14, SideMove::default(), fen_move("Ka8", "k7/8/8/6PP/8/8/8/K7 w - - 0 1")),
            pair(
                15,
                fen_move("h6", "k7/8/7P/6P1/8/8/8/K7 b - - 0 1"),
                fen_move("Kb8", "1k6/8/7P/6P1/8/8/8/K7 w - - 1 2"),
            ),
            pair(16, fen_move("g6", "1k6/8/6PP/8/8/8/8/K7 b - - 0 2"), half("Ka8")),
        ];
        let rule = PawnStormRule::new(&RuleSettings::default());
        let found = run_rule(&rule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].move_number, 16);
        assert_eq!(found[0].description, "White initiated a pawn storm on the kingside");
    }

    #[test]
    fn test_evaluation_swing_is_deferred() {
        // Black's replies are imprecise, so only White's swings qualify
        let moves = vec![
            pair(12, evaluated("Nf3", "+0.20", 10.0), evaluated("Nc6", "+0.20", 10.0)),
            pair(13, evaluated("Nd5", "+2.60", 5.0), evaluated("Qd8", "+2.70", 40.0)),
            pair(14, evaluated("Ne7+", "+5.60", 0.0), evaluated("Kh8", "+5.60", 40.0)),
        ];
        let rule = EvaluationSwingRule::new(&RuleSettings::default());
        let (found, state) = run_rule_with_state(&rule, &moves, PHASES);
        assert!(found.is_empty());

        let swings = state.eval_swing.highlights();
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].move_number, 14);
        assert_eq!(swings[0].description, "White's evaluation increased by 3.0 pawns");
    }
}
