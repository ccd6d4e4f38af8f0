//! Per-move evaluation context and the memoized position cache

use std::cell::OnceCell;
use std::str::FromStr;

use chess::Board;
use tracing::debug;

use crate::board_utils::{self, MovedPiece};
use crate::config::CplThresholds;
use crate::error::HighlightError;
use crate::model::{MoveRecord, Phase, PhaseBounds, PieceCounts, Side, SideMove, STARTING_MATERIAL};

#[derive(Debug, Clone, Copy)]
enum Parsed {
    Absent,
    Invalid,
    Ready(Board),
}

/// Parses each half-move FEN at most once per detection run.
pub struct PositionCache<'a> {
    moves: &'a [MoveRecord],
    boards: Vec<[OnceCell<Parsed>; 2]>,
}

impl<'a> PositionCache<'a> {
    pub fn new(moves: &'a [MoveRecord]) -> Self {
        let boards = moves
            .iter()
            .map(|_| [OnceCell::new(), OnceCell::new()])
            .collect();
        Self { moves, boards }
    }

    fn slot(side: Side) -> usize {
        match side {
            Side::White => 0,
            Side::Black => 1,
        }
    }

    /// Position after the half-move. `Ok(None)` when no FEN was recorded.
    pub fn board_after(&self, index: usize, side: Side) -> Result<Option<Board>, HighlightError> {
        let (Some(record), Some(cells)) = (self.moves.get(index), self.boards.get(index)) else {
            return Ok(None);
        };
        let parsed = cells[Self::slot(side)].get_or_init(|| match record.side(side).fen.as_deref() {
            None | Some("") => Parsed::Absent,
            Some(fen) => match Board::from_str(fen) {
                Ok(board) => Parsed::Ready(board),
                Err(e) => {
                    debug!(move_number = record.move_number, ?side, error = %e, "Unparsable FEN");
                    Parsed::Invalid
                }
            },
        });
        match parsed {
            Parsed::Absent => Ok(None),
            Parsed::Invalid => Err(HighlightError::InvalidFen {
                move_number: record.move_number,
                side,
            }),
            Parsed::Ready(board) => Ok(Some(*board)),
        }
    }

    /// Position before the half-move: the previous half-move's position,
    /// or the standard start for White's first move.
    pub fn board_before(&self, index: usize, side: Side) -> Result<Option<Board>, HighlightError> {
        match (side, index) {
            (Side::White, 0) => Ok(Some(Board::default())),
            (Side::White, i) => self.board_after(i - 1, Side::Black),
            (Side::Black, i) => self.board_after(i, Side::White),
        }
    }

    /// What the side moved on this half-move
    pub fn moved_piece(&self, index: usize, side: Side) -> Result<Option<MovedPiece>, HighlightError> {
        let (Some(before), Some(after)) = (self.board_before(index, side)?, self.board_after(index, side)?)
        else {
            return Ok(None);
        };
        Ok(board_utils::moved_piece(&before, &after, side.color()))
    }
}

/// One side's piece counts and material at a point in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideCounts {
    pub pieces: PieceCounts,
    pub material: i32,
}

impl SideCounts {
    pub const STARTING: SideCounts = SideCounts {
        pieces: PieceCounts::STARTING,
        material: STARTING_MATERIAL,
    };

    pub fn of(side_move: &SideMove) -> Self {
        Self {
            pieces: side_move.pieces,
            material: side_move.material,
        }
    }
}

/// Read-only view handed to every rule for one move pair.
/// Cross-move state travels separately as `&mut SharedState`.
pub struct EvaluationContext<'a> {
    pub moves: &'a [MoveRecord],
    pub move_index: usize,
    pub total_moves: usize,
    pub phases: PhaseBounds,
    pub prev: Option<&'a MoveRecord>,
    pub next: Option<&'a MoveRecord>,
    pub prev_white: SideCounts,
    pub prev_black: SideCounts,
    pub last_book_move: Option<u32>,
    pub theory_departed: bool,
    pub thresholds: CplThresholds,
    pub positions: &'a PositionCache<'a>,
}

impl<'a> EvaluationContext<'a> {
    pub fn current(&self) -> Option<&'a MoveRecord> {
        self.moves.get(self.move_index)
    }

    pub fn move_number(&self) -> u32 {
        self.current().map(|r| r.move_number).unwrap_or_default()
    }

    pub fn phase(&self) -> Phase {
        self.phases.phase_of(self.move_number())
    }

    pub fn is_opening(&self) -> bool {
        self.phase() == Phase::Opening
    }

    pub fn is_endgame(&self) -> bool {
        self.phase() == Phase::Endgame
    }

    /// Record `offset` pairs away from the current one
    pub fn record_at(&self, offset: isize) -> Option<&'a MoveRecord> {
        let index = self.move_index.checked_add_signed(offset)?;
        self.moves.get(index)
    }

    pub fn prev_counts(&self, side: Side) -> SideCounts {
        match side {
            Side::White => self.prev_white,
            Side::Black => self.prev_black,
        }
    }

    /// Change in the side's own material across this pair
    pub fn material_change(&self, side: Side) -> Option<i32> {
        let current = self.current()?;
        Some(current.side(side).material - self.prev_counts(side).material)
    }

    pub fn board_after(&self, side: Side) -> Result<Option<Board>, HighlightError> {
        self.positions.board_after(self.move_index, side)
    }

    pub fn board_before(&self, side: Side) -> Result<Option<Board>, HighlightError> {
        self.positions.board_before(self.move_index, side)
    }

    pub fn moved_piece(&self, side: Side) -> Result<Option<MovedPiece>, HighlightError> {
        self.positions.moved_piece(self.move_index, side)
    }

    pub fn is_good(&self, side_move: &SideMove) -> bool {
        side_move.cpl.is_some_and(|cpl| cpl < self.thresholds.good)
    }

    pub fn is_mistake_or_worse(&self, side_move: &SideMove) -> bool {
        side_move.cpl.is_some_and(|cpl| cpl > self.thresholds.mistake)
    }

    /// White-relative centipawns before the side's half-move
    pub fn eval_before(&self, side: Side) -> Option<f64> {
        match side {
            Side::White => match self.prev {
                Some(prev) => prev.black.centipawns(),
                None => Some(0.0),
            },
            Side::Black => self.current()?.white.centipawns(),
        }
    }

    /// Evaluation change from the mover's point of view
    pub fn own_eval_delta(&self, side: Side) -> Option<f64> {
        let after = self.current()?.side(side).centipawns()?;
        let before = self.eval_before(side)?;
        Some((after - before) * side.sign())
    }

    /// The opponent's half-move right after this side's move
    pub fn reply(&self, side: Side) -> Option<&'a SideMove> {
        self.reply_at(self.move_index, side)
    }

    /// Where the opponent's answer to the side's move at `index` lives
    pub fn reply_slot(index: usize, side: Side) -> (usize, Side) {
        match side {
            Side::White => (index, Side::Black),
            Side::Black => (index + 1, Side::White),
        }
    }

    /// The opponent's answer to the side's half-move in pair `index`
    pub fn reply_at(&self, index: usize, side: Side) -> Option<&'a SideMove> {
        let (at, by) = Self::reply_slot(index, side);
        let reply = self.moves.get(at)?.side(by);
        reply.has_move().then_some(reply)
    }

    /// The opponent's half-move right before this side's move
    pub fn previous_opponent(&self, side: Side) -> Option<&'a SideMove> {
        let previous = match side {
            Side::White => &self.prev?.black,
            Side::Black => &self.current()?.white,
        };
        previous.has_move().then_some(previous)
    }

    /// The side's own half-move `pairs` move numbers later
    pub fn own_later(&self, side: Side, pairs: isize) -> Option<&'a SideMove> {
        let later = self.record_at(pairs)?.side(side);
        later.has_move().then_some(later)
    }
}
