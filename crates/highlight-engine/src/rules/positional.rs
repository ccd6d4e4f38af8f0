//! Positional themes: pawn structure, outposts, king safety and piece activity

use std::collections::BTreeSet;

use chess::{Board, Color, Piece, Square, EMPTY};

use super::{cpl_below, Rule, PRECISE_CPL};
use crate::board_utils::{
    file_has_pawn, in_enemy_half, is_central, is_defended, is_passed_pawn, isolated_pawns,
    king_square, pawn_attacks, pawn_can_attack, piece_name, pieces_of, relative_rank, square_at,
    MovedPiece,
};
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{MoveRecord, Side};
use crate::state::SharedState;

/// Missing evaluations count as an improvement
fn eval_not_worse(ctx: &EvaluationContext<'_>, side: Side) -> bool {
    ctx.own_eval_delta(side).is_none_or(|delta| delta > 0.0)
}

/// The side's moved piece when it is of the given type
fn moved(
    ctx: &EvaluationContext<'_>,
    side: Side,
    piece: Piece,
) -> Result<Option<MovedPiece>, HighlightError> {
    Ok(ctx.moved_piece(side)?.filter(|m| m.piece == piece))
}

/// Push a highlight for every side for which `check` holds
fn per_side(
    record: &MoveRecord,
    kind: RuleKind,
    priority: i32,
    description: impl Fn(Side) -> String,
    mut check: impl FnMut(Side) -> Result<bool, HighlightError>,
) -> Result<Vec<Highlight>, HighlightError> {
    let mut highlights = Vec::new();
    for side in Side::BOTH {
        if record.side(side).has_move() && check(side)? {
            highlights.push(Highlight::new(record, side, kind, priority, description(side)));
        }
    }
    Ok(highlights)
}

/// A central pawn capture that opens the file or creates a passed pawn
pub struct PawnBreakRule;

impl PawnBreakRule {
    fn breaks(ctx: &EvaluationContext<'_>, record: &MoveRecord, side: Side) -> Result<bool, HighlightError> {
        let mv = record.side(side);
        if !mv.is_pawn_move() || mv.captured() != Some(Piece::Pawn) {
            return Ok(false);
        }
        let recaptured = [
            ctx.reply_at(ctx.move_index, side),
            ctx.reply_at(ctx.move_index + 1, side),
        ]
        .into_iter()
        .flatten()
        .any(|reply| reply.captured() == Some(Piece::Pawn));
        if recaptured {
            return Ok(false);
        }

        let (Some(board), Some(pawn)) = (ctx.board_after(side)?, moved(ctx, side, Piece::Pawn)?) else {
            return Ok(false);
        };
        let color = side.color();
        if !is_central(pawn.to) || relative_rank(pawn.to, color) <= relative_rank(pawn.from, color) {
            return Ok(false);
        }
        let file_open = !file_has_pawn(&board, pawn.to.get_file(), !color);
        Ok(file_open || is_passed_pawn(&board, pawn.to, color))
    }
}

impl Rule for PawnBreakRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PawnBreak
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::PawnBreak,
            25,
            |side| format!("{} executed a central pawn break", side.name()),
            |side| Self::breaks(ctx, record, side),
        )
    }
}

/// Evaluation gained without material changing hands
pub struct PositionalImprovementRule;

impl Rule for PositionalImprovementRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PositionalImprovement
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        if ctx.prev.is_none() {
            return Ok(Vec::new());
        }
        per_side(
            record,
            RuleKind::PositionalImprovement,
            25,
            |side| format!("{} gained a positional advantage", side.name()),
            |side| {
                let quiet = ctx.material_change(side).is_some_and(|c| c.abs() < 50);
                let improved = ctx.own_eval_delta(side).is_some_and(|d| d > 50.0);
                let held = ctx
                    .reply(side)
                    .and_then(|reply| reply.cpl)
                    .is_none_or(|cpl| cpl <= 100.0);
                Ok(quiet && improved && held && cpl_below(record.side(side), PRECISE_CPL))
            },
        )
    }
}

pub struct CentralizationRule;

impl CentralizationRule {
    fn centralized(ctx: &EvaluationContext<'_>, record: &MoveRecord, side: Side) -> Result<Option<Piece>, HighlightError> {
        let Some(m) = ctx.moved_piece(side)? else {
            return Ok(None);
        };
        if !matches!(m.piece, Piece::Knight | Piece::Bishop | Piece::Queen)
            || is_central(m.from)
            || !is_central(m.to)
        {
            return Ok(None);
        }
        let meaningful = cpl_below(record.side(side), PRECISE_CPL)
            || ctx.own_eval_delta(side).is_some_and(|d| d > 50.0);
        Ok(meaningful.then_some(m.piece))
    }
}

impl Rule for CentralizationRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Centralization
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
            if let Some(piece) = Self::centralized(ctx, record, side)? {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Centralization,
                    15,
                    format!("{} centralized the {}", side.name(), piece_name(piece)),
                ));
            }
        }
        Ok(highlights)
    }
}

/// King boxed in by its own pawns with an enemy heavy piece on the back rank
pub struct BackRankWeaknessRule;

impl BackRankWeaknessRule {
    pub(crate) fn weak(board: &Board, color: Color) -> bool {
        let Some(king) = king_square(board, color) else {
            return false;
        };
        if relative_rank(king, color) != 0 {
            return false;
        }

        let forward = if color == Color::White { 1 } else { -1 };
        let rank = king.get_rank().to_index() as i32;
        let file = king.get_file().to_index() as i32;
        let own_pawns = pieces_of(board, Piece::Pawn, color);
        let boxed_in = (-1..=1)
            .filter_map(|df| square_at(rank + forward, file + df))
            .all(|sq| own_pawns & chess::BitBoard::from_square(sq) != EMPTY);
        if !boxed_in {
            return false;
        }

        let heavy = pieces_of(board, Piece::Rook, !color) | pieces_of(board, Piece::Queen, !color);
        heavy.into_iter().any(|sq| sq.get_rank() == king.get_rank())
    }
}

impl Rule for BackRankWeaknessRule {
    fn kind(&self) -> RuleKind {
        RuleKind::BackRankWeakness
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::BackRankWeakness,
            43,
            |side| format!("{}'s king is vulnerable on the back rank", side.name()),
            |side| Ok(ctx.board_after(side)?.is_some_and(|b| Self::weak(&b, side.color()))),
        )
    }
}

/// A defended piece on an enemy-half square no enemy pawn can ever hit
pub struct WeakSquareRule;

impl Rule for WeakSquareRule {
    fn kind(&self) -> RuleKind {
        RuleKind::WeakSquare
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::WeakSquare,
            23,
            |side| format!("{} occupied a weak square", side.name()),
            |side| {
                if !ctx.is_good(record.side(side)) {
                    return Ok(false);
                }
                let (Some(board), Some(m)) = (ctx.board_after(side)?, ctx.moved_piece(side)?) else {
                    return Ok(false);
                };
                let color = side.color();
                Ok(m.piece != Piece::King
                    && in_enemy_half(m.to, color)
                    && !pawn_can_attack(&board, m.to, !color)
                    && is_defended(&board, color, m.to))
            },
        )
    }
}

/// A pawn move that leaves one of the mover's pawns without neighbours
pub struct IsolatedPawnRule;

impl IsolatedPawnRule {
    fn isolated_files(board: &Board, color: Color) -> BTreeSet<usize> {
        isolated_pawns(board, color)
            .into_iter()
            .map(|sq| sq.get_file().to_index())
            .collect()
    }
}

impl Rule for IsolatedPawnRule {
    fn kind(&self) -> RuleKind {
        RuleKind::IsolatedPawn
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::IsolatedPawn,
            21,
            |side| format!("{} created an isolated pawn", side.name()),
            |side| {
                if !record.side(side).is_pawn_move() {
                    return Ok(false);
                }
                let (Some(before), Some(after)) = (ctx.board_before(side)?, ctx.board_after(side)?) else {
                    return Ok(false);
                };
                let color = side.color();
                let was = Self::isolated_files(&before, color);
                Ok(Self::isolated_files(&after, color)
                    .iter()
                    .any(|file| !was.contains(file)))
            },
        )
    }
}

/// The king stepping up the board in the endgame
pub struct KingActivityRule;

impl Rule for KingActivityRule {
    fn kind(&self) -> RuleKind {
        RuleKind::KingActivity
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        if !ctx.is_endgame() {
            return Ok(Vec::new());
        }
        per_side(
            record,
            RuleKind::KingActivity,
            27,
            |side| format!("{}'s king became active in the endgame", side.name()),
            |side| {
                if record.side(side).is_castling() {
                    return Ok(false);
                }
                let Some(king) = moved(ctx, side, Piece::King)? else {
                    return Ok(false);
                };
                let color = side.color();
                let (from, to) = (relative_rank(king.from, color), relative_rank(king.to, color));
                Ok((3..=6).contains(&to) && from < to && eval_not_worse(ctx, side))
            },
        )
    }
}

/// A defended pawn reaching the sixth or seventh rank
pub struct PawnPromotionThreatRule;

impl Rule for PawnPromotionThreatRule {
    fn kind(&self) -> RuleKind {
        RuleKind::PawnPromotionThreat
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::PawnPromotionThreat,
            40,
            |side| format!("{} created a pawn promotion threat", side.name()),
            |side| {
                if !record.side(side).is_pawn_move() {
                    return Ok(false);
                }
                let (Some(board), Some(pawn)) = (ctx.board_after(side)?, moved(ctx, side, Piece::Pawn)?)
                else {
                    return Ok(false);
                };
                let color = side.color();
                let rank = relative_rank(pawn.to, color);
                Ok((5..=6).contains(&rank)
                    && relative_rank(pawn.from, color) < 5
                    && is_defended(&board, color, pawn.to))
            },
        )
    }
}

/// A rook leaving the first two ranks to join the attack
pub struct RookLiftRule;

impl Rule for RookLiftRule {
    fn kind(&self) -> RuleKind {
        RuleKind::RookLift
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::RookLift,
            24,
            |side| format!("{} lifted the rook to create threats", side.name()),
            |side| {
                let Some(rook) = moved(ctx, side, Piece::Rook)? else {
                    return Ok(false);
                };
                let color = side.color();
                Ok(relative_rank(rook.from, color) <= 1
                    && relative_rank(rook.to, color) >= 2
                    && eval_not_worse(ctx, side))
            },
        )
    }
}

/// A pawn-supported knight in the enemy half that no enemy pawn can chase
pub struct KnightOutpostRule;

impl KnightOutpostRule {
    pub(crate) fn is_outpost(board: &Board, square: Square, color: Color) -> bool {
        let file = square.get_file().to_index();
        let supported = pawn_attacks(square, !color) & pieces_of(board, Piece::Pawn, color) != EMPTY;
        file != 0
            && file != 7
            && in_enemy_half(square, color)
            && supported
            && !pawn_can_attack(board, square, !color)
    }
}

impl Rule for KnightOutpostRule {
    fn kind(&self) -> RuleKind {
        RuleKind::KnightOutpost
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        per_side(
            record,
            RuleKind::KnightOutpost,
            26,
            |side| format!("{} established a knight outpost", side.name()),
            |side| {
                if record.side(side).is_capture() {
                    return Ok(false);
                }
                let (Some(board), Some(knight)) = (ctx.board_after(side)?, moved(ctx, side, Piece::Knight)?)
                else {
                    return Ok(false);
                };
                Ok(Self::is_outpost(&board, knight.to, side.color()))
            },
        )
    }
}
