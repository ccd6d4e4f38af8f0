//! Analyzed-game input model: move records, sides, phases and evaluations.

use chess::{Color, Piece};
use serde::{Deserialize, Serialize};

use crate::board_utils::piece_from_letter;
use crate::error::HighlightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::White, Side::Black];

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }

    pub fn is_white(self) -> bool {
        self == Side::White
    }

    /// +1 for White, -1 for Black. Multiplying a White-relative
    /// evaluation by this gives the side's own point of view.
    pub fn sign(self) -> f64 {
        match self {
            Side::White => 1.0,
            Side::Black => -1.0,
        }
    }
}

/// Game phase by move number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Opening, Phase::Middlegame, Phase::Endgame];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBounds {
    pub opening_end: u32,
    pub middlegame_end: u32,
}

impl PhaseBounds {
    pub fn new(opening_end: u32, middlegame_end: u32) -> Self {
        Self {
            opening_end,
            middlegame_end,
        }
    }

    pub fn phase_of(&self, move_number: u32) -> Phase {
        if move_number <= self.opening_end {
            Phase::Opening
        } else if move_number < self.middlegame_end {
            Phase::Middlegame
        } else {
            Phase::Endgame
        }
    }

    pub fn is_endgame(&self, move_number: u32) -> bool {
        self.phase_of(move_number) == Phase::Endgame
    }
}

/// Engine move-quality label attached to each half-move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Assessment {
    Book,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    Other,
}

impl From<String> for Assessment {
    fn from(label: String) -> Self {
        let lower = label.to_ascii_lowercase();
        let word = lower.trim().trim_end_matches(" move");
        match word {
            "book" => Assessment::Book,
            "best" => Assessment::Best,
            "excellent" => Assessment::Excellent,
            "good" => Assessment::Good,
            "inaccuracy" => Assessment::Inaccuracy,
            "mistake" => Assessment::Mistake,
            "blunder" => Assessment::Blunder,
            _ => Assessment::Other,
        }
    }
}

impl From<Assessment> for String {
    fn from(assessment: Assessment) -> Self {
        match assessment {
            Assessment::Book => "Book Move",
            Assessment::Best => "Best Move",
            Assessment::Excellent => "Excellent",
            Assessment::Good => "Good",
            Assessment::Inaccuracy => "Inaccuracy",
            Assessment::Mistake => "Mistake",
            Assessment::Blunder => "Blunder",
            Assessment::Other => "Other",
        }
        .to_string()
    }
}

/// A parsed engine evaluation, always from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Centipawns(f64),
    /// Forced mate. `distance` is None when the engine string carried no count.
    Mate { for_white: bool, distance: Option<u32> },
}

impl Evaluation {
    /// Parse "+0.35", "-1.2", "M3", "-M2" style strings.
    pub fn parse(raw: &str) -> Result<Self, HighlightError> {
        let s = raw.trim();
        if let Some(rest) = s.strip_prefix("-M") {
            return Ok(Evaluation::Mate {
                for_white: false,
                distance: rest.parse().ok(),
            });
        }
        if let Some(rest) = s.strip_prefix("+M").or_else(|| s.strip_prefix('M')) {
            return Ok(Evaluation::Mate {
                for_white: true,
                distance: rest.parse().ok(),
            });
        }
        let pawns: f64 = s
            .trim_start_matches('+')
            .parse()
            .map_err(|_| HighlightError::InvalidEvaluation(raw.to_string()))?;
        Ok(Evaluation::Centipawns(pawns * 100.0))
    }

    pub fn centipawns(self) -> Option<f64> {
        match self {
            Evaluation::Centipawns(cp) => Some(cp),
            Evaluation::Mate { .. } => None,
        }
    }

    /// Is this a forced mate for `side`?
    pub fn is_mate_for(self, side: Side) -> bool {
        matches!(self, Evaluation::Mate { for_white, .. } if for_white == side.is_white())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceCounts {
    pub queens: u32,
    pub rooks: u32,
    pub bishops: u32,
    pub knights: u32,
    pub pawns: u32,
}

impl PieceCounts {
    pub const STARTING: PieceCounts = PieceCounts {
        queens: 1,
        rooks: 2,
        bishops: 2,
        knights: 2,
        pawns: 8,
    };

    pub fn count(&self, piece: Piece) -> u32 {
        match piece {
            Piece::Queen => self.queens,
            Piece::Rook => self.rooks,
            Piece::Bishop => self.bishops,
            Piece::Knight => self.knights,
            Piece::Pawn => self.pawns,
            Piece::King => 1,
        }
    }
}

/// Material in centipawns for the standard starting position
pub const STARTING_MATERIAL: i32 = 3900;

/// One side's half of an analyzed move pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SideMove {
    /// Move in SAN; None when the side has no move (end of game)
    pub san: Option<String>,
    /// White-relative evaluation after the move ("+0.35", "M3", "-M2")
    pub eval: Option<String>,
    pub cpl: Option<f64>,
    pub cpl_2: Option<f64>,
    pub cpl_3: Option<f64>,
    pub assessment: Option<Assessment>,
    pub best_move: Option<String>,
    pub best_2: Option<String>,
    pub best_3: Option<String>,
    pub is_top3: bool,
    /// Captured piece letter (p, n, b, r, q)
    pub capture: Option<String>,
    /// Own material in centipawns, after the full move pair
    pub material: i32,
    /// Own piece counts, after the full move pair
    pub pieces: PieceCounts,
    /// Position after this half-move
    pub fen: Option<String>,
}

impl SideMove {
    pub fn san(&self) -> Option<&str> {
        self.san.as_deref().filter(|s| !s.is_empty())
    }

    pub fn has_move(&self) -> bool {
        self.san().is_some()
    }

    pub fn evaluation(&self) -> Option<Evaluation> {
        self.eval.as_deref().and_then(|e| Evaluation::parse(e).ok())
    }

    /// Evaluation in centipawns (White-relative); None for mates and bad data
    pub fn centipawns(&self) -> Option<f64> {
        self.evaluation().and_then(Evaluation::centipawns)
    }

    pub fn captured(&self) -> Option<Piece> {
        self.capture
            .as_deref()
            .and_then(|c| c.chars().next())
            .and_then(piece_from_letter)
    }

    pub fn is_capture(&self) -> bool {
        self.captured().is_some()
    }

    pub fn gives_check(&self) -> bool {
        self.san().is_some_and(|s| s.contains('+') || s.contains('#'))
    }

    pub fn is_pawn_move(&self) -> bool {
        self.san()
            .and_then(|s| s.chars().next())
            .is_some_and(|c| c.is_ascii_lowercase())
    }

    pub fn is_castling(&self) -> bool {
        self.san().is_some_and(|s| s.starts_with("O-O"))
    }

    pub fn assessment_is(&self, assessment: Assessment) -> bool {
        self.assessment == Some(assessment)
    }

    /// Is the played move the engine's first choice?
    pub fn played_best(&self) -> bool {
        match (self.san(), self.best_move.as_deref()) {
            (Some(played), Some(best)) => played.eq_ignore_ascii_case(best),
            _ => false,
        }
    }
}

/// One analyzed move number: White's and Black's half-moves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveRecord {
    pub move_number: u32,
    #[serde(default)]
    pub white: SideMove,
    #[serde(default)]
    pub black: SideMove,
}

impl MoveRecord {
    pub fn side(&self, side: Side) -> &SideMove {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    /// Display notation for one half-move: "12. Nf3" or "12. ...Nf6"
    pub fn notation(&self, side: Side) -> String {
        let san = self.side(side).san().unwrap_or_default();
        match side {
            Side::White => format!("{}. {}", self.move_number, san),
            Side::Black => format!("{}. ...{}", self.move_number, san),
        }
    }

    /// Display notation for the whole pair: "12. Qxd8 ... Kxd8"
    pub fn pair_notation(&self) -> String {
        format!(
            "{}. {} ... {}",
            self.move_number,
            self.white.san().unwrap_or_default(),
            self.black.san().unwrap_or_default()
        )
    }
}

/// Notation for a multi-move range: "20-24." or "20-24. ..."
pub fn range_notation(first: u32, last: u32, side: Side) -> String {
    match side {
        Side::White => format!("{first}-{last}."),
        Side::Black => format!("{first}-{last}. ..."),
    }
}

/// A fully analyzed game handed to the detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    pub moves: Vec<MoveRecord>,
    pub opening_end: u32,
    pub middlegame_end: u32,
}

impl GameInput {
    pub fn phases(&self) -> PhaseBounds {
        PhaseBounds::new(self.opening_end, self.middlegame_end)
    }
}
