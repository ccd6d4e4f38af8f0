//! Line tactics: pins, skewers, discovered attacks, batteries and interference

use chess::{BitBoard, Board, Color, MoveGen, Piece, Square, EMPTY};

use super::{cpl_below, is_simple_recapture, Rule, PRECISE_CPL};
use crate::board_utils::{
    attackers, can_be_taken_by_lower_or_equal, can_slide_between, direction, file_has_pawn,
    first_piece_on_ray, is_clear_between, is_defended, is_ray_piece, king_value, king_zone,
    line_name, piece_name, piece_value, ray, relative_rank, slide_directions, square_distance,
    MovedPiece, ROOK_VALUE, VALUABLE,
};
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{MoveRecord, Side};
use crate::state::SharedState;

/// One line through `from` in direction `d`: the first two pieces met
fn first_two(board: &Board, from: Square, d: (i32, i32)) -> Option<(Square, Square)> {
    let mut occupied = ray(from, d)
        .into_iter()
        .filter(|sq| board.piece_on(*sq).is_some());
    Some((occupied.next()?, occupied.next()?))
}

fn is_enemy(board: &Board, square: Square, color: Color) -> bool {
    board.color_on(square) == Some(!color)
}

/// Square of the enemy piece pinned by the slider on `slider`, if any.
pub(crate) fn pinned_by(board: &Board, slider: Square, color: Color) -> Option<Square> {
    let piece = board.piece_on(slider)?;
    if !is_ray_piece(piece) || attackers(board, !color, slider) != EMPTY {
        return None;
    }

    slide_directions(piece).iter().find_map(|&d| {
        let (front, back) = first_two(board, slider, d)?;
        if !is_enemy(board, front, color) || !is_enemy(board, back, color) {
            return None;
        }
        let front_piece = board.piece_on(front)?;
        let back_piece = board.piece_on(back)?;
        if front_piece == Piece::King || piece_value(front_piece) < VALUABLE {
            return None;
        }
        let back_value = king_value(back_piece);
        if back_value < ROOK_VALUE || back_value <= piece_value(front_piece) {
            return None;
        }

        let line = chess::line(slider, back);
        let stuck = if back_piece == Piece::King {
            // absolute pin: nothing legal leaves the line
            board.side_to_move() != !color
                || !MoveGen::new_legal(board).any(|m| {
                    m.get_source() == front && line & BitBoard::from_square(m.get_dest()) == EMPTY
                })
        } else {
            !is_defended(board, !color, back) || back_value > piece_value(piece)
        };
        stuck.then_some(front)
    })
}

/// The slider on `square` attacks a valuable piece that must move and
/// expose a lesser piece behind it.
pub(crate) fn is_exploitable_skewer(board: &Board, square: Square, color: Color) -> bool {
    let Some(piece) = board.piece_on(square) else {
        return false;
    };
    if !is_ray_piece(piece) || can_be_taken_by_lower_or_equal(board, piece, color, square) {
        return false;
    }

    slide_directions(piece).iter().any(|&d| {
        let Some((front, back)) = first_two(board, square, d) else {
            return false;
        };
        if !is_enemy(board, front, color) || !is_enemy(board, back, color) {
            return false;
        }
        let (Some(front_piece), Some(back_piece)) = (board.piece_on(front), board.piece_on(back))
        else {
            return false;
        };
        let front_value = king_value(front_piece);
        let back_value = piece_value(back_piece);
        let front_exposed = front_piece == Piece::King || !is_defended(board, !color, front);
        front_value >= ROOK_VALUE
            && back_value >= VALUABLE
            && front_value >= back_value + 200
            && square_distance(square, front) >= 2
            && front_exposed
            && !is_defended(board, !color, back)
    })
}

/// Boards and moved piece for a side, only when the move was good
fn good_move_geometry(
    ctx: &EvaluationContext<'_>,
    record: &MoveRecord,
    side: Side,
) -> Result<Option<(Board, Board, MovedPiece)>, HighlightError> {
    let mv = record.side(side);
    if !mv.has_move() || !ctx.is_good(mv) {
        return Ok(None);
    }
    let (Some(before), Some(after)) = (ctx.board_before(side)?, ctx.board_after(side)?) else {
        return Ok(None);
    };
    let Some(moved) = ctx.moved_piece(side)? else {
        return Ok(None);
    };
    Ok(Some((before, after, moved)))
}

pub struct PinRule;

impl Rule for PinRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Pin
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            let Some((_, after, moved)) = good_move_geometry(ctx, record, side)? else {
                continue;
            };
            if pinned_by(&after, moved.to, side.color()).is_some() {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Pin,
                    38,
                    format!("{} created a pin", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

pub struct SkewerRule;

impl Rule for SkewerRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Skewer
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            let Some((_, after, moved)) = good_move_geometry(ctx, record, side)? else {
                continue;
            };
            if is_exploitable_skewer(&after, moved.to, side.color()) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Skewer,
                    40,
                    format!("{} executed a skewer", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// Moving a piece off a friendly slider's line uncovers an attack
pub struct DiscoveredAttackRule;

impl DiscoveredAttackRule {
    /// Target (square, piece) newly hit by a slider behind the vacated square
    fn discovered_target(
        before: &Board,
        after: &Board,
        moved: &MovedPiece,
        color: Color,
    ) -> Option<(Square, Piece)> {
        let sliders = *after.color_combined(color)
            & (*after.pieces(Piece::Bishop) | *after.pieces(Piece::Rook) | *after.pieces(Piece::Queen));

        sliders
            .into_iter()
            .filter(|s| *s != moved.to)
            .find_map(|slider| {
                let piece = after.piece_on(slider)?;
                if !can_slide_between(piece, slider, moved.from)
                    || !is_clear_between(after, slider, moved.from)
                {
                    return None;
                }
                let d = direction(slider, moved.from)?;
                let target = first_piece_on_ray(after, moved.from, d)?;
                if !is_enemy(after, target, color) {
                    return None;
                }
                // the line must have been closed before the move
                if attackers(before, color, target) & BitBoard::from_square(slider) != EMPTY {
                    return None;
                }
                let target_piece = after.piece_on(target)?;
                let worthwhile = target_piece == Piece::King
                    || (piece_value(target_piece) >= VALUABLE
                        && (!is_defended(after, !color, target)
                            || piece_value(target_piece) > piece_value(piece)));
                worthwhile.then_some((target, target_piece))
            })
    }
}

impl Rule for DiscoveredAttackRule {
    fn kind(&self) -> RuleKind {
        RuleKind::DiscoveredAttack
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        if ctx.is_opening() {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            if is_simple_recapture(ctx, side) {
                continue;
            }
            let Some((before, after, moved)) = good_move_geometry(ctx, record, side)? else {
                continue;
            };
            let Some((_, target)) = Self::discovered_target(&before, &after, &moved, side.color())
            else {
                continue;
            };
            let opponent = side.opponent().name();
            let (priority, victim) = if target == Piece::King {
                (45, "king")
            } else {
                (40, piece_name(target))
            };
            highlights.push(Highlight::new(
                record,
                side,
                RuleKind::DiscoveredAttack,
                priority,
                format!("{} performed a discovered attack on {opponent}'s {victim}", side.name()),
            ));
        }
        Ok(highlights)
    }
}

/// Two friendly sliders lined up on an open line aimed at the enemy
pub struct BatteryRule;

impl BatteryRule {
    fn on_home_square(piece: Piece, square: Square, color: Color) -> bool {
        if relative_rank(square, color) != 0 {
            return false;
        }
        let file = square.get_file().to_index();
        match piece {
            Piece::Rook => file == 0 || file == 7,
            Piece::Bishop => file == 2 || file == 5,
            Piece::Queen => file == 3,
            _ => false,
        }
    }

    /// Partner slider sharing a line with the piece on `square`
    fn partner(board: &Board, square: Square, color: Color) -> Option<(Square, (i32, i32))> {
        let piece = board.piece_on(square)?;
        slide_directions(piece).iter().find_map(|&d| {
            let other = first_piece_on_ray(board, square, d)?;
            let other_piece = board.piece_on(other)?;
            let usable = board.color_on(other) == Some(color)
                && can_slide_between(other_piece, other, square)
                && !Self::on_home_square(other_piece, other, color);
            usable.then_some((other, d))
        })
    }

    fn threatens(board: &Board, a: Square, b: Square, d: (i32, i32), color: Color) -> bool {
        let zone = king_zone(board, !color);
        // extend past both ends of the pair
        [(b, d), (a, (-d.0, -d.1))].iter().any(|&(end, dir)| {
            for sq in ray(end, dir) {
                if zone & BitBoard::from_square(sq) != EMPTY {
                    return true;
                }
                if let Some(color_on) = board.color_on(sq) {
                    return color_on != color;
                }
            }
            false
        })
    }

    fn battery(
        before: &Board,
        after: &Board,
        moved: &MovedPiece,
        color: Color,
    ) -> Option<String> {
        if !is_ray_piece(moved.piece) {
            return None;
        }
        let (partner, d) = Self::partner(after, moved.to, color)?;

        let existed = Self::partner(before, moved.from, color)
            .is_some_and(|(old, old_d)| old == partner && (old_d == d || old_d == (-d.0, -d.1)));
        if existed {
            return None;
        }
        if d.1 == 0 && file_has_pawn(after, moved.to.get_file(), color) {
            return None;
        }
        if !Self::threatens(after, moved.to, partner, d, color) {
            return None;
        }
        line_name(moved.to, partner)
    }
}

impl Rule for BatteryRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Battery
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        if ctx.is_opening() {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            let Some((before, after, moved)) = good_move_geometry(ctx, record, side)? else {
                continue;
            };
            if let Some(line) = Self::battery(&before, &after, &moved, side.color()) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Battery,
                    35,
                    format!("{} created a battery on the {line}", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A piece dropped onto the line between an enemy slider and the piece it guards
pub struct InterferenceRule;

impl InterferenceRule {
    const AXES: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

    fn interferes(before: &Board, after: &Board, square: Square, color: Color) -> bool {
        if is_enemy(before, square, color) {
            return false;
        }
        Self::AXES.iter().any(|&d| {
            let (Some(a), Some(b)) = (
                first_piece_on_ray(after, square, d),
                first_piece_on_ray(after, square, (-d.0, -d.1)),
            ) else {
                return false;
            };
            if !is_enemy(after, a, color) || !is_enemy(after, b, color) {
                return false;
            }
            let (Some(pa), Some(pb)) = (after.piece_on(a), after.piece_on(b)) else {
                return false;
            };
            if !is_ray_piece(pa) || !is_ray_piece(pb) {
                return false;
            }
            let valuable = piece_value(pa).max(piece_value(pb)) >= VALUABLE;
            let connected = can_slide_between(pa, a, b) || can_slide_between(pb, b, a);
            valuable && connected && is_clear_between(before, a, b)
        })
    }
}

impl Rule for InterferenceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Interference
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            if record.side(side).is_capture() || !cpl_below(record.side(side), PRECISE_CPL * 2.0) {
                continue;
            }
            let Some((before, after, moved)) = good_move_geometry(ctx, record, side)? else {
                continue;
            };
            if Self::interferes(&before, &after, moved.to, side.color()) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::Interference,
                    38,
                    format!("{} created interference", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}
