#![allow(dead_code)]

use highlight_engine::model::{PieceCounts, STARTING_MATERIAL};
use highlight_engine::{Assessment, MoveRecord, PhaseBounds, SideMove};

pub const PHASES: PhaseBounds = PhaseBounds {
    opening_end: 10,
    middlegame_end: 30,
};

/// A half-move with full material and a centipawn evaluation
pub fn mv(san: &str, eval: &str, cpl: f64) -> SideMove {
    SideMove {
        san: Some(san.into()),
        eval: Some(eval.into()),
        cpl: Some(cpl),
        material: STARTING_MATERIAL,
        pieces: PieceCounts::STARTING,
        ..Default::default()
    }
}

pub fn capture(san: &str, eval: &str, cpl: f64, letter: &str) -> SideMove {
    SideMove {
        capture: Some(letter.into()),
        ..mv(san, eval, cpl)
    }
}

pub fn with_fen(side_move: SideMove, fen: &str) -> SideMove {
    SideMove {
        fen: Some(fen.into()),
        ..side_move
    }
}

pub fn assessed(side_move: SideMove, assessment: Assessment) -> SideMove {
    SideMove {
        assessment: Some(assessment),
        ..side_move
    }
}

pub fn pair(move_number: u32, white: SideMove, black: SideMove) -> MoveRecord {
    MoveRecord {
        move_number,
        white,
        black,
    }
}

/// Quiet filler moves with a flat evaluation
pub fn quiet_moves(range: std::ops::Range<u32>) -> Vec<MoveRecord> {
    range
        .map(|n| pair(n, mv("Kf1", "+0.20", 5.0), mv("Kf8", "+0.20", 5.0)))
        .collect()
}

/// Scholar's mate with real positions, engine data and assessments
pub fn scholars_mate() -> Vec<MoveRecord> {
    vec![
        pair(
            1,
            assessed(
                with_fen(
                    mv("e4", "+0.30", 0.0),
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
                ),
                Assessment::Book,
            ),
            assessed(
                with_fen(
                    mv("e5", "+0.30", 0.0),
                    "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
                ),
                Assessment::Book,
            ),
        ),
        pair(
            2,
            assessed(
                with_fen(
                    mv("Bc4", "+0.20", 10.0),
                    "rnbqkbnr/pppp1ppp/8/4p3/2B1P3/8/PPPP1PPP/RNBQK1NR b KQkq - 1 2",
                ),
                Assessment::Good,
            ),
            assessed(
                with_fen(
                    mv("Nc6", "+0.30", 5.0),
                    "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/8/PPPP1PPP/RNBQK1NR w KQkq - 2 3",
                ),
                Assessment::Best,
            ),
        ),
        pair(
            3,
            assessed(
                with_fen(
                    mv("Qh5", "+0.00", 40.0),
                    "r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 3 3",
                ),
                Assessment::Good,
            ),
            assessed(
                with_fen(
                    SideMove {
                        best_move: Some("g6".into()),
                        ..mv("Nf6", "M1", 900.0)
                    },
                    "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
                ),
                Assessment::Blunder,
            ),
        ),
        pair(
            4,
            assessed(
                with_fen(
                    SideMove {
                        best_move: Some("Qxf7#".into()),
                        ..capture("Qxf7#", "M0", 0.0, "p")
                    },
                    "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
                ),
                Assessment::Best,
            ),
            SideMove::default(),
        ),
    ]
}
