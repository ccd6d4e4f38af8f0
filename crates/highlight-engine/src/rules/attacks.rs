//! Multi-target attacks: forks, coordinated attacks, tempo gains and in-between moves

use chess::{Board, Color, Piece, Square};

use super::{
    alternatives_clearly_worse, capture_value, cpl_below, Rule, CLEAR_ALTERNATIVE_CPL, PRECISE_CPL,
};
use crate::board_utils::{
    attacked_enemies, attackers, can_be_taken_by_lower_or_equal, is_defended, piece_value, VALUABLE,
};
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{MoveRecord, Side};
use crate::state::SharedState;

/// The piece on `square` attacks two or more enemy pieces in a way the
/// opponent cannot parry without loss.
pub(crate) fn is_exploitable_fork(board: &Board, square: Square, color: Color) -> bool {
    let Some(piece) = board.piece_on(square) else {
        return false;
    };
    if piece != Piece::King && can_be_taken_by_lower_or_equal(board, piece, color, square) {
        return false;
    }

    let targets = attacked_enemies(board, square, color);
    if targets.len() < 2 {
        return false;
    }

    let checks_king = targets.iter().any(|(_, p)| *p == Piece::King);
    let valuable: Vec<Square> = targets
        .iter()
        .filter(|(_, p)| *p != Piece::King && piece_value(*p) >= VALUABLE)
        .map(|(sq, _)| *sq)
        .collect();

    if checks_king {
        return !valuable.is_empty();
    }
    valuable.len() >= 2 && valuable.iter().any(|sq| !is_defended(board, !color, *sq))
}

pub struct ForkRule;

impl ForkRule {
    fn forks(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        side: Side,
    ) -> Result<bool, HighlightError> {
        let mv = record.side(side);
        if !mv.has_move()
            || !ctx.is_good(mv)
            || !cpl_below(mv, PRECISE_CPL)
            || !alternatives_clearly_worse(mv, CLEAR_ALTERNATIVE_CPL)
        {
            return Ok(false);
        }
        let (Some(board), Some(moved)) = (ctx.board_after(side)?, ctx.moved_piece(side)?) else {
            return Ok(false);
        };
        Ok(is_exploitable_fork(&board, moved.to, side.color()))
    }
}

impl Rule for ForkRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Fork
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            if self.forks(record, ctx, side)? {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Fork,
                    45,
                    format!("{} executed a fork", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Two or more pieces, the moved one included, bear down on the enemy king
/// or a valuable enemy piece.
pub struct PieceCoordinationRule;

impl PieceCoordinationRule {
    fn coordinated(
        &self,
        ctx: &EvaluationContext<'_>,
        record: &MoveRecord,
        side: Side,
    ) -> Result<bool, HighlightError> {
        let mv = record.side(side);
        if !mv.has_move() || !cpl_below(mv, PRECISE_CPL) {
            return Ok(false);
        }
        let (Some(board), Some(moved)) = (ctx.board_after(side)?, ctx.moved_piece(side)?) else {
            return Ok(false);
        };
        let color = side.color();
        let hits = *board.color_combined(!color);
        Ok(hits.into_iter().any(|target| {
            let is_target = board
                .piece_on(target)
                .is_some_and(|p| p == Piece::King || piece_value(p) >= VALUABLE);
            let ours = attackers(&board, color, target);
            is_target
                && ours.popcnt() >= 2
                && ours.into_iter().any(|sq| sq == moved.to)
        }))
    }
}

impl Rule for PieceCoordinationRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PieceCoordination
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            if self.coordinated(ctx, record, side)? {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::PieceCoordination,
                    33,
                    format!("{}'s pieces coordinated effectively", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A check or a valuable capture that leaves the opponent scrambling
pub struct TempoGainRule;

impl Rule for TempoGainRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TempoGain
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() || !ctx.is_good(mv) {
                continue;
            }
            let forcing = mv.gives_check() || capture_value(mv) >= VALUABLE;
            let rushed_reply = ctx
                .reply(side)
                .and_then(|reply| reply.cpl)
                .is_some_and(|cpl| cpl > CLEAR_ALTERNATIVE_CPL);
            if forcing && rushed_reply {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::TempoGain,
                    32,
                    format!("{} gained a tempo", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A check played instead of recapturing right after the opponent captured
pub struct ZwischenzugRule;

impl Rule for ZwischenzugRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Zwischenzug
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            let mv = record.side(side);
            let opponent_captured = ctx
                .previous_opponent(side)
                .is_some_and(|prev| prev.is_capture());
            if mv.has_move()
                && opponent_captured
                && !mv.is_capture()
                && mv.gives_check()
                && cpl_below(mv, PRECISE_CPL)
            {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Zwischenzug,
                    42,
                    format!("{} played an in-between move (zwischenzug)", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::model::{PhaseBounds, SideMove};
    use crate::rules::test_support::{half, half_with, pair, run_rule};

    const PHASES: PhaseBounds = PhaseBounds {
        opening_end: 10,
        middlegame_end: 30,
    };

    fn knight_fork_game(cpl: f64) -> Vec<MoveRecord> {
        vec![
            pair(
                20,
                SideMove::default(),
                SideMove {
                    san: Some("Ra8".into()),
                    fen: Some("r3k3/8/8/1N6/8/8/8/4K3 w - - 0 1".into()),
                    ..Default::default()
                },
            ),
            pair(
                21,
                half_with("Nc7+", "r3k3/2N5/8/8/8/8/8/4K3 b - - 1 1", cpl, "+5.00"),
                half("Kd8"),
            ),
        ]
    }

    #[test]
    fn test_exploitable_fork_geometry() {
        let board = Board::from_str("r3k3/2N5/8/8/8/8/8/4K3 b - - 1 1").unwrap();
        let c7 = Square::from_str("c7").unwrap();
        assert!(is_exploitable_fork(&board, c7, Color::White));

        // same fork but a bishop can take the knight
        let board = Board::from_str("rb2k3/2N5/8/8/8/8/8/4K3 b - - 1 1").unwrap();
        assert!(!is_exploitable_fork(&board, c7, Color::White));
    }

    #[test]
    fn test_fork_rule_fires_for_good_move() {
        let found = run_rule(&ForkRule, &knight_fork_game(0.0), PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "White executed a fork");
        assert_eq!(found[0].move_notation, "21. Nc7+");
        assert_eq!(found[0].priority, 45);
    }

    #[test]
    fn test_fork_rule_ignores_inaccurate_move() {
        assert!(run_rule(&ForkRule, &knight_fork_game(80.0), PHASES).is_empty());
    }

    #[test]
    fn test_zwischenzug() {
        let mut capture = half("Nxe4");
        capture.capture = Some("p".into());
        let mut check = half("Qh5+");
        check.cpl = Some(5.0);
        let moves = vec![pair(12, half("d3"), capture), pair(13, check, half("g6"))];
        let found = run_rule(&ZwischenzugRule, &moves, PHASES);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].side, Side::White);
        assert_eq!(found[0].move_number, 13);
    }

    #[test]
    fn test_recapture_is_not_zwischenzug() {
        let mut capture = half("Nxe4");
        capture.capture = Some("p".into());
        let mut recapture = half("dxe4+");
        recapture.capture = Some("n".into());
        recapture.cpl = Some(0.0);
        let moves = vec![pair(12, half("d3"), capture), pair(13, recapture, half("Ke7"))];
        assert!(run_rule(&ZwischenzugRule, &moves, PHASES).is_empty());
    }

    #[test]
    fn test_tempo_gain_needs_rushed_reply() {
        let mut grab = half("Nxe5");
        grab.capture = Some("b".into());
        grab.cpl = Some(10.0);
        let mut reply = half("Qe7");
        reply.cpl = Some(120.0);
        let moves = vec![pair(15, grab.clone(), reply)];
        assert_eq!(run_rule(&TempoGainRule, &moves, PHASES).len(), 1);

        let mut calm = half("Qe7");
        calm.cpl = Some(10.0);
        let moves = vec![pair(15, grab, calm)];
        assert!(run_rule(&TempoGainRule, &moves, PHASES).is_empty());
    }
}
