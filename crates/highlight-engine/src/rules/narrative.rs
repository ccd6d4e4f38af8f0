//! Game-story rules: opening theory, trades, imbalances, blunders and missed chances

use chess::{Board, Color, Piece, EMPTY};

use super::{alternatives_clearly_worse, cpl_below, Rule, PRECISE_CPL};
use crate::board_utils::{
    attackers, has_bishop_pair, in_check, is_defended, king_square, piece_name, pieces_of,
};
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{Assessment, MoveRecord, Side, SideMove};
use crate::state::SharedState;

fn own_eval(side_move: &SideMove, side: Side) -> Option<f64> {
    side_move.centipawns().map(|cp| cp * side.sign())
}

fn is_minor(piece: Piece) -> bool {
    matches!(piece, Piece::Bishop | Piece::Knight)
}

/// Pair-level trade highlight with an explicit one-move range
fn trade(record: &MoveRecord, kind: RuleKind, priority: i32, description: &str) -> Highlight {
    Highlight {
        move_number_end: Some(record.move_number),
        ..Highlight::for_pair(record, Side::White, kind, priority, description)
    }
}

/// Both sides captured the same heavy piece within the pair
fn traded_piece(record: &MoveRecord) -> Option<Piece> {
    if !record.black.has_move() {
        return None;
    }
    match (record.white.captured(), record.black.captured()) {
        (Some(a), Some(b)) if a == b && matches!(a, Piece::Queen | Piece::Rook) => Some(a),
        _ => None,
    }
}

pub struct BishopPairRule;

impl BishopPairRule {
    /// Some(true) when won by capturing an enemy bishop, Some(false) when
    /// the pair is otherwise new.
    fn gained(
        ctx: &EvaluationContext<'_>,
        record: &MoveRecord,
        side: Side,
    ) -> Result<Option<bool>, HighlightError> {
        let mv = record.side(side);
        let opponent = side.opponent();
        let own = mv.pieces.bishops;
        let theirs = record.side(opponent).pieces.bishops;
        if own != 2 || theirs >= 2 {
            return Ok(None);
        }

        let captured_pair = ctx.prev_counts(opponent).pieces.bishops >= 2
            && mv.captured() == Some(Piece::Bishop);
        let newly_formed = ctx.prev_counts(side).pieces.bishops < 2;
        if !captured_pair && !newly_formed {
            return Ok(None);
        }

        let equalized = ctx
            .reply(side)
            .is_some_and(|reply| reply.captured() == Some(Piece::Bishop));
        let on_both_colours = ctx
            .board_after(side)?
            .is_some_and(|board| has_bishop_pair(&board, side.color()));
        Ok((on_both_colours && !equalized).then_some(captured_pair))
    }
}

impl Rule for BishopPairRule {
    fn kind(&self) -> RuleKind {
        RuleKind::BishopPair
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            if !record.side(side).has_move() {
                continue;
            }
            let highlight = match Self::gained(ctx, record, side)? {
                Some(true) => Highlight::new(
                    record,
                    side,
                    RuleKind::BishopPair,
                    32,
                    format!("{} gained the bishop pair", side.name()),
                ),
                Some(false) => Highlight::new(
                    record,
                    side,
                    RuleKind::BishopPair,
                    28,
                    format!("{} secured the bishop pair", side.name()),
                ),
                None => continue,
            };
            highlights.push(highlight);
        }
        Ok(highlights)
    }
}

/// Unequal trades: a minor piece for pawns, or a rook for a minor piece
pub struct MaterialImbalanceRule;

impl MaterialImbalanceRule {
    /// Pairs looked back over when collecting pawns for a piece
    const PAWN_WINDOW: usize = 3;
    const RECAPTURE_START: usize = 2;
    const RECAPTURE_CAP: usize = 10;

    /// Minor piece given up for two or more pawns within the last few pairs
    fn piece_for_pawns(ctx: &EvaluationContext<'_>, side: Side) -> Option<(Piece, usize)> {
        let first = (ctx.move_index + 1).saturating_sub(Self::PAWN_WINDOW);
        let window = ctx.moves.get(first..=ctx.move_index)?;
        let opponent = side.opponent();

        let pawns = window
            .iter()
            .filter(|r| r.side(side).captured() == Some(Piece::Pawn))
            .count();
        let gave: Vec<Piece> = window
            .iter()
            .filter_map(|r| r.side(opponent).captured())
            .filter(|p| is_minor(*p))
            .collect();
        let took_minor = window
            .iter()
            .any(|r| r.side(side).captured().is_some_and(is_minor));

        match gave.as_slice() {
            [piece] if pawns >= 2 && !took_minor => Some((*piece, pawns)),
            _ => None,
        }
    }

    /// Does the opponent take one of the side's rooks within an adaptive
    /// window that grows while the side keeps capturing?
    fn rook_recaptured(ctx: &EvaluationContext<'_>, side: Side) -> bool {
        let opponent = side.opponent();
        let mut window = Self::RECAPTURE_START;
        while window <= Self::RECAPTURE_CAP {
            let hit = (1..=window)
                .filter_map(|step| ctx.record_at(step as isize))
                .any(|r| r.side(opponent).captured() == Some(Piece::Rook));
            if hit {
                return true;
            }
            let still_capturing = ctx
                .record_at(window as isize)
                .is_some_and(|r| r.side(side).is_capture());
            if !still_capturing {
                return false;
            }
            window += 1;
        }
        false
    }

    fn rook_for_minor(ctx: &EvaluationContext<'_>, record: &MoveRecord, side: Side) -> bool {
        let mv = record.side(side);
        if !mv.captured().is_some_and(is_minor) || mv.assessment_is(Assessment::Best) {
            return false;
        }
        let before = ctx.prev_counts(side).pieces;
        let now = mv.pieces;
        let minor_lost = now.bishops + now.knights < before.bishops + before.knights;
        let rook_lost = now.rooks < before.rooks;
        !minor_lost && (rook_lost || Self::rook_recaptured(ctx, side))
    }
}

impl Rule for MaterialImbalanceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::MaterialImbalance
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
            if !mv.has_move() {
                continue;
            }
            if mv.captured() == Some(Piece::Pawn) {
                if let Some((piece, pawns)) = Self::piece_for_pawns(ctx, side) {
                    let letter = match piece {
                        Piece::Bishop => 'B',
                        _ => 'N',
                    };
                    highlights.push(Highlight::new(
                        record,
                        side,
                        RuleKind::MaterialImbalance,
                        25,
                        format!("{} traded {letter} for {pawns} pawns", side.name()),
                    ));
                }
            }
            if Self::rook_for_minor(ctx, record, side) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::MaterialImbalance,
                    32,
                    format!("{} traded rook for minor piece", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

pub struct ExchangeSequenceRule;

impl Rule for ExchangeSequenceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ExchangeSequence
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        _ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let highlight = match traded_piece(record) {
            Some(Piece::Queen) => trade(record, RuleKind::ExchangeSequence, 30, "Queens were exchanged"),
            Some(Piece::Rook) => trade(record, RuleKind::ExchangeSequence, 18, "Rooks were exchanged"),
            _ => return Ok(Vec::new()),
        };
        Ok(vec![highlight])
    }
}

/// Heavy-piece trades that improve White's evaluation
pub struct SimplificationRule;

impl Rule for SimplificationRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Simplification
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let improved = ctx
            .prev
            .and_then(|prev| prev.white.centipawns())
            .zip(record.white.centipawns())
            .is_some_and(|(before, after)| after - before > 50.0);
        if !improved {
            return Ok(Vec::new());
        }
        let highlight = match traded_piece(record) {
            Some(Piece::Queen) => trade(record, RuleKind::Simplification, 22, "Queens were traded"),
            Some(Piece::Rook) => trade(record, RuleKind::Simplification, 18, "Rooks were traded"),
            _ => return Ok(Vec::new()),
        };
        Ok(vec![highlight])
    }
}

/// The first side to play a non-book, non-best move
pub struct TheoryDepartureRule;

impl Rule for TheoryDepartureRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TheoryDeparture
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let in_book = Side::BOTH
            .iter()
            .any(|side| record.side(*side).assessment_is(Assessment::Book));
        if in_book
            || ctx.theory_departed
            || record.move_number <= ctx.last_book_move.unwrap_or_default()
        {
            return Ok(Vec::new());
        }

        let first = Side::BOTH.into_iter().find(|side| {
            let mv = record.side(*side);
            mv.has_move() && !mv.assessment_is(Assessment::Best)
        });
        Ok(first
            .map(|side| {
                Highlight::new(
                    record,
                    side,
                    RuleKind::TheoryDeparture,
                    20,
                    format!("{} was first to leave theory", side.name()),
                )
            })
            .into_iter()
            .collect())
    }
}

/// A sound move the engine did not have in its top three
pub struct NoveltyRule;

impl NoveltyRule {
    const FROM_MOVE: u32 = 7;
    const CREATIVE_MARGIN: f64 = 20.0;
}

impl Rule for NoveltyRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Novelty
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        if record.move_number < Self::FROM_MOVE {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move() || mv.is_top3 || !ctx.is_good(mv) {
                continue;
            }
            let creative = mv
                .cpl
                .zip(mv.cpl_2)
                .is_some_and(|(cpl, cpl_2)| cpl < cpl_2 + Self::CREATIVE_MARGIN);
            let highlight = if creative {
                Highlight::new(
                    record,
                    side,
                    RuleKind::Novelty,
                    18,
                    format!(
                        "{} played a creative move close to engine recommendations",
                        side.name()
                    ),
                )
            } else {
                Highlight::new(
                    record,
                    side,
                    RuleKind::Novelty,
                    15,
                    format!("{} played a novelty (not in top 3 engine moves)", side.name()),
                )
            };
            highlights.push(highlight);
        }
        Ok(highlights)
    }
}

pub struct CastlingRule;

impl CastlingRule {
    fn castled(
        ctx: &EvaluationContext<'_>,
        san: &str,
        side: Side,
    ) -> Result<Option<&'static str>, HighlightError> {
        let (Some(before), Some(after)) = (ctx.board_before(side)?, ctx.board_after(side)?) else {
            return Ok(None);
        };
        let color = side.color();
        let (had, has) = (before.castle_rights(color), after.castle_rights(color));
        let wing = if san.starts_with("O-O-O") {
            (had.has_queenside() && !has.has_queenside()).then_some("queenside")
        } else {
            (had.has_kingside() && !has.has_kingside()).then_some("kingside")
        };
        Ok(wing)
    }
}

impl Rule for CastlingRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Castling
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
            let Some(san) = mv.san().filter(|_| mv.is_castling()) else {
                continue;
            };
            if let Some(wing) = Self::castled(ctx, san, side)? {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Castling,
                    15,
                    format!("{} castled {wing}", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// The engine's best move was tactical and the player missed it badly
pub struct TacticalOpportunityRule;

impl TacticalOpportunityRule {
    fn is_tactical(best: &str, side_move: &SideMove) -> bool {
        let forcing = best.contains('x') || best.contains('+') || best.contains('#');
        let gap = side_move
            .cpl
            .zip(side_move.cpl_2)
            .is_some_and(|(cpl, cpl_2)| cpl - cpl_2 > 200.0);
        forcing || gap
    }
}

impl Rule for TacticalOpportunityRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TacticalOpportunity
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
            let Some(best) = mv.best_move.as_deref() else {
                continue;
            };
            if !mv.has_move()
                || mv.played_best()
                || !ctx.is_mistake_or_worse(mv)
                || !Self::is_tactical(best, mv)
            {
                continue;
            }
            let multiple = matches!(
                (mv.cpl_2, mv.cpl_3),
                (Some(a), Some(b)) if a < PRECISE_CPL && b < PRECISE_CPL
            );
            let highlight = if multiple {
                Highlight::new(
                    record,
                    side,
                    RuleKind::TacticalOpportunity,
                    30,
                    format!(
                        "{} missed multiple tactical opportunities (best move was {best})",
                        side.name()
                    ),
                )
            } else {
                Highlight::new(
                    record,
                    side,
                    RuleKind::TacticalOpportunity,
                    25,
                    format!("{} missed a tactical opportunity (best move was {best})", side.name()),
                )
            };
            highlights.push(highlight);
        }
        Ok(highlights)
    }
}

/// The only move that holds against a concrete threat
pub struct DefensiveResourceRule;

impl DefensiveResourceRule {
    const SERIOUS_THREAT_CPL: f64 = 150.0;
    const BAD_EVAL: f64 = -150.0;
    const WORSENED_BY: f64 = 100.0;
    const HOLD_TOLERANCE: f64 = 20.0;
    const ONLY_MOVE_MARGIN: f64 = 100.0;

    /// Attacked, undefended own pieces worth at least a minor
    fn loose_pieces(board: &Board, color: Color) -> Vec<chess::Square> {
        [Piece::Queen, Piece::Rook, Piece::Bishop, Piece::Knight]
            .into_iter()
            .flat_map(|piece| pieces_of(board, piece, color))
            .filter(|sq| {
                attackers(board, !color, *sq) != EMPTY && !is_defended(board, color, *sq)
            })
            .collect()
    }

    fn king_attackers(board: &Board, color: Color) -> u32 {
        king_square(board, color)
            .map(|king| attackers(board, !color, king).popcnt())
            .unwrap_or_default()
    }

    fn threatened(board: &Board, color: Color) -> bool {
        in_check(board)
            || !Self::loose_pieces(board, color).is_empty()
            || Self::king_attackers(board, color) >= 2
    }

    fn meets_threat(before: &Board, after: &Board, color: Color) -> bool {
        if in_check(before) && !in_check(after) {
            return true;
        }
        let rescued = Self::loose_pieces(before, color).into_iter().any(|sq| {
            after.color_on(sq) != Some(color)
                || is_defended(after, color, sq)
                || attackers(after, !color, sq) == EMPTY
        });
        let attackers_before = Self::king_attackers(before, color);
        rescued || (attackers_before >= 2 && Self::king_attackers(after, color) < attackers_before)
    }

    fn found(
        ctx: &EvaluationContext<'_>,
        record: &MoveRecord,
        side: Side,
    ) -> Result<bool, HighlightError> {
        let mv = record.side(side);
        let Some(previous) = ctx.previous_opponent(side) else {
            return Ok(false);
        };
        let best = mv.is_top3 && mv.played_best();
        if !mv.has_move()
            || !ctx.is_good(mv)
            || !best
            || !alternatives_clearly_worse(mv, Self::ONLY_MOVE_MARGIN)
        {
            return Ok(false);
        }

        let blundered_into = previous.cpl.is_some_and(|cpl| cpl > Self::SERIOUS_THREAT_CPL);
        let facing = own_eval(previous, side);
        let own_before = ctx.record_at(-1).and_then(|r| own_eval(r.side(side), side));
        let bad_eval = facing.is_some_and(|e| e < Self::BAD_EVAL)
            || facing
                .zip(own_before)
                .is_some_and(|(now, then)| now - then < -Self::WORSENED_BY);
        if !blundered_into && !bad_eval {
            return Ok(false);
        }

        let held = facing
            .zip(own_eval(mv, side))
            .is_some_and(|(before, after)| after >= before - Self::HOLD_TOLERANCE);
        if !held {
            return Ok(false);
        }

        let (Some(before), Some(after)) = (ctx.board_before(side)?, ctx.board_after(side)?) else {
            return Ok(false);
        };
        let color = side.color();
        Ok(Self::threatened(&before, color) && Self::meets_threat(&before, &after, color))
    }
}

impl Rule for DefensiveResourceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::DefensiveResource
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            if Self::found(ctx, record, side)? {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::DefensiveResource,
                    20,
                    format!("{} found the only defensive resource", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A queen or rook lost to an unrecovered blunder, reported on the
/// blundering half-move.
pub struct BlunderedPieceRule;

impl BlunderedPieceRule {
    const RECOVERY_CPL: f64 = 20.0;

    fn min_eval_drop(piece: Piece) -> f64 {
        match piece {
            Piece::Queen => 300.0,
            _ => 200.0,
        }
    }

    fn blunder(
        &self,
        ctx: &EvaluationContext<'_>,
        record: &MoveRecord,
        capturer: Side,
    ) -> Option<Highlight> {
        let capture = record.side(capturer);
        let piece = capture
            .captured()
            .filter(|p| matches!(p, Piece::Queen | Piece::Rook))?;
        let victim = capturer.opponent();
        let lost =
            record.side(victim).pieces.count(piece) < ctx.prev_counts(victim).pieces.count(piece);
        if !lost {
            return None;
        }

        let (blunder_record, blunder) = match capturer {
            Side::White => (ctx.prev?, &ctx.prev?.black),
            Side::Black => (record, &record.white),
        };
        let was_blunder =
            ctx.is_mistake_or_worse(blunder) || blunder.assessment_is(Assessment::Blunder);
        if !blunder.has_move() || !was_blunder {
            return None;
        }

        let min_drop = Self::min_eval_drop(piece);
        let after_capture = own_eval(capture, victim);
        let recovered = ctx.reply(capturer).is_some_and(|reply| {
            reply.assessment_is(Assessment::Best)
                || reply.cpl.is_some_and(|cpl| cpl <= Self::RECOVERY_CPL)
                || own_eval(reply, victim)
                    .zip(after_capture)
                    .is_some_and(|(now, then)| now - then >= min_drop)
        });
        if recovered {
            return None;
        }

        let dropped = own_eval(blunder, victim)
            .zip(after_capture)
            .is_some_and(|(before, after)| before - after >= min_drop);
        dropped.then(|| {
            Highlight::new(
                blunder_record,
                victim,
                RuleKind::BlunderedPiece,
                50,
                format!("{} blundered the {}", victim.name(), piece_name(piece)),
            )
        })
    }
}

impl Rule for BlunderedPieceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::BlunderedPiece
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        Ok(Side::BOTH
            .into_iter()
            .filter_map(|side| self.blunder(ctx, record, side))
            .collect())
    }
}

/// An accurate move that improves the position and leaves the opponent
/// struggling to reply.
pub struct InitiativeRule;

impl InitiativeRule {
    const MIN_SHIFT: f64 = 50.0;
}

impl Rule for InitiativeRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Initiative
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let Some(prev) = ctx.prev else {
            return Ok(highlights);
        };
        for side in Side::BOTH {
            let mv = record.side(side);
            let (Some(reply), Some(before_reply)) = (ctx.reply(side), ctx.previous_opponent(side))
            else {
                continue;
            };
            let improved = own_eval(mv, side)
                .zip(own_eval(prev.side(side), side))
                .is_some_and(|(now, then)| now - then >= Self::MIN_SHIFT);
            let opponent_slipped = own_eval(reply, side)
                .zip(own_eval(before_reply, side))
                .is_some_and(|(now, then)| now - then >= Self::MIN_SHIFT);
            if !mv.has_move() || !improved || !opponent_slipped {
                continue;
            }

            let constrained = cpl_below(mv, PRECISE_CPL)
                && reply.cpl.is_some_and(|cpl| cpl > 50.0)
                && matches!((reply.cpl_2, reply.cpl_3), (Some(a), Some(b)) if a > 50.0 && b > 50.0);
            highlights.push(Highlight::new(
                record,
                side,
                RuleKind::Initiative,
                if constrained { 30 } else { 28 },
                format!("{} seized the initiative", side.name()),
            ));
        }
        Ok(highlights)
    }
}
