//! Board utility functions for highlight detection.
//! Everything here is a thin layer over the `chess` crate's bitboards.

use std::sync::LazyLock;

use chess::{BitBoard, Board, BoardStatus, Color, File, Piece, Rank, Square, EMPTY};
use regex::Regex;

// Piece values in centipawns
pub const PAWN_VALUE: i32 = 100;
pub const KNIGHT_VALUE: i32 = 300;
pub const BISHOP_VALUE: i32 = 300;
pub const ROOK_VALUE: i32 = 500;
pub const QUEEN_VALUE: i32 = 900;
pub const KING_VALUE: i32 = 900;

/// Targets worth at least this much count as valuable
pub const VALUABLE: i32 = 300;

pub const ORTHOGONAL: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
pub const DIAGONAL: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
pub const ALL_DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

static SAN_DESTINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-h][1-8])(?:=?[QRBN])?[+#]?[!?]*$").expect("valid SAN regex")
});

/// Piece value (no king)
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Piece value including king (for pins, skewers and forks)
pub fn king_value(piece: Piece) -> i32 {
    match piece {
        Piece::King => KING_VALUE,
        other => piece_value(other),
    }
}

/// Piece from a capture letter or SAN piece letter (either case)
pub fn piece_from_letter(letter: char) -> Option<Piece> {
    match letter.to_ascii_lowercase() {
        'p' => Some(Piece::Pawn),
        'n' => Some(Piece::Knight),
        'b' => Some(Piece::Bishop),
        'r' => Some(Piece::Rook),
        'q' => Some(Piece::Queen),
        'k' => Some(Piece::King),
        _ => None,
    }
}

pub fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

/// Is this a ray (sliding) piece type?
pub fn is_ray_piece(piece: Piece) -> bool {
    matches!(piece, Piece::Queen | Piece::Rook | Piece::Bishop)
}

/// Ray directions a piece slides along; empty for non-sliders
pub fn slide_directions(piece: Piece) -> &'static [(i32, i32)] {
    match piece {
        Piece::Rook => &ORTHOGONAL,
        Piece::Bishop => &DIAGONAL,
        Piece::Queen => &ALL_DIRECTIONS,
        _ => &[],
    }
}

pub fn square_at(rank: i32, file: i32) -> Option<Square> {
    if (0..8).contains(&rank) && (0..8).contains(&file) {
        Some(Square::make_square(
            Rank::from_index(rank as usize),
            File::from_index(file as usize),
        ))
    } else {
        None
    }
}

fn coords(square: Square) -> (i32, i32) {
    (
        square.get_rank().to_index() as i32,
        square.get_file().to_index() as i32,
    )
}

/// Squares from `from` (exclusive) to the board edge in one direction
pub fn ray(from: Square, direction: (i32, i32)) -> Vec<Square> {
    let (rank, file) = coords(from);
    let (dr, df) = direction;
    (1..8)
        .map_while(|step| square_at(rank + dr * step, file + df * step))
        .collect()
}

/// Unit direction from `a` towards `b` when they share a rank, file or diagonal
pub fn direction(a: Square, b: Square) -> Option<(i32, i32)> {
    let (ra, fa) = coords(a);
    let (rb, fb) = coords(b);
    let (dr, df) = (rb - ra, fb - fa);
    if a == b || (dr != 0 && df != 0 && dr.abs() != df.abs()) {
        return None;
    }
    Some((dr.signum(), df.signum()))
}

/// Can `piece` slide along the line joining `a` and `b`?
pub fn can_slide_between(piece: Piece, a: Square, b: Square) -> bool {
    direction(a, b).is_some_and(|d| slide_directions(piece).contains(&d))
}

/// Nothing stands strictly between the two squares
pub fn is_clear_between(board: &Board, a: Square, b: Square) -> bool {
    chess::between(a, b) & *board.combined() == EMPTY
}

/// Get squares attacked by a piece on a given square
pub fn attacks(board: &Board, square: Square) -> BitBoard {
    let piece = match board.piece_on(square) {
        Some(p) => p,
        None => return EMPTY,
    };

    match piece {
        Piece::Pawn => match board.color_on(square) {
            Some(color) => pawn_attacks(square, color),
            None => EMPTY,
        },
        Piece::Knight => chess::get_knight_moves(square),
        Piece::King => chess::get_king_moves(square),
        Piece::Bishop => chess::get_bishop_moves(square, *board.combined()),
        Piece::Rook => chess::get_rook_moves(square, *board.combined()),
        Piece::Queen => {
            chess::get_bishop_moves(square, *board.combined())
                | chess::get_rook_moves(square, *board.combined())
        }
    }
}

/// Pawn attack squares (just the diagonal attacks, not pushes)
pub fn pawn_attacks(square: Square, color: Color) -> BitBoard {
    chess::get_pawn_attacks(square, color, !EMPTY)
}

/// Get all pieces of a given color that attack a square
pub fn attackers(board: &Board, color: Color, square: Square) -> BitBoard {
    let occupied = *board.combined();
    let color_pieces = *board.color_combined(color);

    let mut result = EMPTY;

    // Pawns: reverse lookup from the target square with the opposite color
    result |= pawn_attacks(square, !color) & *board.pieces(Piece::Pawn) & color_pieces;
    result |= chess::get_knight_moves(square) & *board.pieces(Piece::Knight) & color_pieces;
    result |= chess::get_king_moves(square) & *board.pieces(Piece::King) & color_pieces;

    let diagonal = *board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen);
    result |= chess::get_bishop_moves(square, occupied) & diagonal & color_pieces;

    let orthogonal = *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    result |= chess::get_rook_moves(square, occupied) & orthogonal & color_pieces;

    result
}

/// Find the king square for a color
pub fn king_square(board: &Board, color: Color) -> Option<Square> {
    let king_bb = *board.pieces(Piece::King) & *board.color_combined(color);
    king_bb.into_iter().next()
}

/// King square plus every square next to it
pub fn king_zone(board: &Board, color: Color) -> BitBoard {
    match king_square(board, color) {
        Some(king) => chess::get_king_moves(king) | BitBoard::from_square(king),
        None => EMPTY,
    }
}

/// Is a piece defended by its own side?
pub fn is_defended(board: &Board, color: Color, square: Square) -> bool {
    attackers(board, color, square) != EMPTY
}

/// Is the piece attacked by the enemy and not defended?
pub fn is_hanging(board: &Board, color: Color, square: Square) -> bool {
    attackers(board, !color, square) != EMPTY && !is_defended(board, color, square)
}

/// Can an enemy piece worth no more than `piece` capture on `square`?
pub fn can_be_taken_by_lower_or_equal(
    board: &Board,
    piece: Piece,
    color: Color,
    square: Square,
) -> bool {
    attackers(board, !color, square).into_iter().any(|att_sq| {
        board
            .piece_on(att_sq)
            .is_some_and(|att| att != Piece::King && piece_value(att) <= king_value(piece))
    })
}

/// Count material for one side, in centipawns
pub fn material_count(board: &Board, color: Color) -> i32 {
    let color_bb = *board.color_combined(color);
    [
        Piece::Pawn,
        Piece::Knight,
        Piece::Bishop,
        Piece::Rook,
        Piece::Queen,
    ]
    .iter()
    .map(|&p| (*board.pieces(p) & color_bb).popcnt() as i32 * piece_value(p))
    .sum()
}

pub fn pieces_of(board: &Board, piece: Piece, color: Color) -> BitBoard {
    *board.pieces(piece) & *board.color_combined(color)
}

/// Distance between two squares (Chebyshev distance)
pub fn square_distance(s1: Square, s2: Square) -> u32 {
    let (r1, f1) = coords(s1);
    let (r2, f2) = coords(s2);
    (r1 - r2).unsigned_abs().max((f1 - f2).unsigned_abs())
}

/// Rank index from the side's own point of view (0 = back rank)
pub fn relative_rank(square: Square, color: Color) -> usize {
    let rank = square.get_rank().to_index();
    match color {
        Color::White => rank,
        Color::Black => 7 - rank,
    }
}

pub fn in_enemy_half(square: Square, color: Color) -> bool {
    relative_rank(square, color) >= 4
}

/// d3 to e6 block
pub fn is_central(square: Square) -> bool {
    let (rank, file) = coords(square);
    (3..=4).contains(&file) && (2..=5).contains(&rank)
}

pub fn is_light_square(square: Square) -> bool {
    let (rank, file) = coords(square);
    (rank + file) % 2 == 1
}

/// Could a pawn of `by` attack `square`, now or after advancing?
pub fn pawn_can_attack(board: &Board, square: Square, by: Color) -> bool {
    let (rank, file) = coords(square);
    pieces_of(board, Piece::Pawn, by).into_iter().any(|pawn| {
        let (pr, pf) = coords(pawn);
        (pf - file).abs() == 1
            && match by {
                Color::White => pr < rank,
                Color::Black => pr > rank,
            }
    })
}

/// No enemy pawn on the same or adjacent files in front of it
pub fn is_passed_pawn(board: &Board, square: Square, color: Color) -> bool {
    let (rank, file) = coords(square);
    !pieces_of(board, Piece::Pawn, !color).into_iter().any(|pawn| {
        let (pr, pf) = coords(pawn);
        (pf - file).abs() <= 1
            && match color {
                Color::White => pr > rank,
                Color::Black => pr < rank,
            }
    })
}

/// Pawns of `color` with no friendly pawn on an adjacent file
pub fn isolated_pawns(board: &Board, color: Color) -> BitBoard {
    let pawns = pieces_of(board, Piece::Pawn, color);
    let mut result = EMPTY;
    for pawn in pawns {
        if chess::get_adjacent_files(pawn.get_file()) & pawns == EMPTY {
            result |= BitBoard::from_square(pawn);
        }
    }
    result
}

pub fn file_has_pawn(board: &Board, file: File, color: Color) -> bool {
    chess::get_file(file) & pieces_of(board, Piece::Pawn, color) != EMPTY
}

/// Two bishops standing on squares of different colours
pub fn has_bishop_pair(board: &Board, color: Color) -> bool {
    let bishops = pieces_of(board, Piece::Bishop, color);
    let light = bishops.into_iter().any(is_light_square);
    let dark = bishops.into_iter().any(|sq| !is_light_square(sq));
    light && dark
}

pub fn is_checkmate(board: &Board) -> bool {
    board.status() == BoardStatus::Checkmate
}

pub fn in_check(board: &Board) -> bool {
    *board.checkers() != EMPTY
}

/// Enemy pieces (square, piece) attacked by the piece on `from`
pub fn attacked_enemies(board: &Board, from: Square, pov: Color) -> Vec<(Square, Piece)> {
    (attacks(board, from) & *board.color_combined(!pov))
        .into_iter()
        .filter_map(|sq| board.piece_on(sq).map(|p| (sq, p)))
        .collect()
}

/// First occupied square along a ray
pub fn first_piece_on_ray(board: &Board, from: Square, direction: (i32, i32)) -> Option<Square> {
    ray(from, direction)
        .into_iter()
        .find(|sq| board.piece_on(*sq).is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flank {
    Queenside,
    Kingside,
}

impl Flank {
    /// a-c files are queenside, f-h kingside, d/e belong to neither
    pub fn of(file: File) -> Option<Flank> {
        match file.to_index() {
            0..=2 => Some(Flank::Queenside),
            5..=7 => Some(Flank::Kingside),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Flank::Queenside => "queenside",
            Flank::Kingside => "kingside",
        }
    }
}

/// Origin, destination and type of the piece a side just moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovedPiece {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
}

/// Diff two positions for one colour. Castling yields the king's move,
/// promotion the promoted piece type.
pub fn moved_piece(before: &Board, after: &Board, color: Color) -> Option<MovedPiece> {
    let prev = *before.color_combined(color);
    let next = *after.color_combined(color);
    let vacated = prev & !next;
    let arrived = next & !prev;

    if vacated.popcnt() == 2 && arrived.popcnt() == 2 {
        let from = vacated
            .into_iter()
            .find(|sq| before.piece_on(*sq) == Some(Piece::King))?;
        let to = arrived
            .into_iter()
            .find(|sq| after.piece_on(*sq) == Some(Piece::King))?;
        return Some(MovedPiece { from, to, piece: Piece::King });
    }

    let from = vacated.into_iter().next()?;
    let to = arrived.into_iter().next()?;
    let piece = after.piece_on(to)?;
    Some(MovedPiece { from, to, piece })
}

/// Destination square of a SAN move; None for castling and garbage
pub fn san_destination(san: &str) -> Option<Square> {
    let caps = SAN_DESTINATION.captures(san.trim())?;
    caps.get(1)?.as_str().parse().ok()
}

/// Piece type named by a SAN move
pub fn san_piece(san: &str) -> Option<Piece> {
    match san.trim().chars().next()? {
        'O' | '0' => Some(Piece::King),
        c if c.is_ascii_lowercase() => Some(Piece::Pawn),
        c => piece_from_letter(c).filter(|p| *p != Piece::Pawn),
    }
}

pub fn file_char(file: File) -> char {
    (b'a' + file.to_index() as u8) as char
}

fn ordinal(n: usize) -> String {
    let suffix = match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Human name of the line through two squares: "e file", "7th rank",
/// "a1-h8 diagonal"
pub fn line_name(a: Square, b: Square) -> Option<String> {
    let (dr, df) = direction(a, b)?;
    if df == 0 {
        return Some(format!("{} file", file_char(a.get_file())));
    }
    if dr == 0 {
        return Some(format!("{} rank", ordinal(a.get_rank().to_index() + 1)));
    }
    let start = ray(a, (-dr, -df)).last().copied().unwrap_or(a);
    let end = ray(a, (dr, df)).last().copied().unwrap_or(a);
    let (low, high) = if start.get_file().to_index() <= end.get_file().to_index() {
        (start, end)
    } else {
        (end, start)
    };
    Some(format!("{low}-{high} diagonal"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sq(name: &str) -> Square {
        Square::from_str(name).unwrap()
    }

    #[test]
    fn test_king_square() {
        let board = Board::default();
        assert_eq!(
            king_square(&board, Color::White),
            Some(Square::make_square(Rank::First, File::E))
        );
        assert_eq!(
            king_square(&board, Color::Black),
            Some(Square::make_square(Rank::Eighth, File::E))
        );
    }

    #[test]
    fn test_material_count_starting() {
        let board = Board::default();
        assert_eq!(material_count(&board, Color::White), 3900);
        assert_eq!(material_count(&board, Color::Black), 3900);
    }

    #[test]
    fn test_attacks_starting_position() {
        let board = Board::default();
        let atk = attacks(&board, sq("e2"));
        assert!(atk & BitBoard::from_square(sq("d3")) != EMPTY);
        assert!(atk & BitBoard::from_square(sq("f3")) != EMPTY);
        assert_eq!(pawn_attacks(sq("e4"), Color::White).popcnt(), 2);
        assert_eq!(pawn_attacks(sq("a7"), Color::Black).popcnt(), 1);
    }

    #[test]
    fn test_attackers_reverse_lookup() {
        let board = Board::from_str(
            "rnbqkbnr/pppppppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2",
        )
        .unwrap();
        let white_attackers = attackers(&board, Color::White, sq("e5"));
        assert!(white_attackers & BitBoard::from_square(sq("f3")) != EMPTY);
        assert!(is_hanging(&board, Color::Black, sq("e5")));
    }

    #[test]
    fn test_moved_piece_normal_and_castling() {
        let before = Board::default();
        let after = Board::from_str(
            "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1",
        )
        .unwrap();
        let moved = moved_piece(&before, &after, Color::White).unwrap();
        assert_eq!(moved, MovedPiece { from: sq("g1"), to: sq("f3"), piece: Piece::Knight });

        let before = Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let after = Board::from_str("r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1").unwrap();
        let moved = moved_piece(&before, &after, Color::White).unwrap();
        assert_eq!(moved.piece, Piece::King);
        assert_eq!(moved.to, sq("g1"));
    }

    #[test]
    fn test_moved_piece_promotion() {
        let before = Board::from_str("8/4P3/8/8/8/8/k7/7K w - - 0 1").unwrap();
        let after = Board::from_str("4Q3/8/8/8/8/8/k7/7K b - - 0 1").unwrap();
        let moved = moved_piece(&before, &after, Color::White).unwrap();
        assert_eq!(moved.piece, Piece::Queen);
        assert_eq!(moved.from, sq("e7"));
    }

    #[test]
    fn test_san_helpers() {
        assert_eq!(san_destination("Nxe5+"), Some(sq("e5")));
        assert_eq!(san_destination("e8=Q#"), Some(sq("e8")));
        assert_eq!(san_destination("O-O"), None);
        assert_eq!(san_piece("Qh5"), Some(Piece::Queen));
        assert_eq!(san_piece("exd5"), Some(Piece::Pawn));
        assert_eq!(san_piece("O-O-O"), Some(Piece::King));
    }

    #[test]
    fn test_line_name() {
        assert_eq!(line_name(sq("e1"), sq("e4")).as_deref(), Some("e file"));
        assert_eq!(line_name(sq("a7"), sq("c7")).as_deref(), Some("7th rank"));
        assert_eq!(line_name(sq("c3"), sq("e5")).as_deref(), Some("a1-h8 diagonal"));
        assert_eq!(line_name(sq("a1"), sq("b3")), None);
    }

    #[test]
    fn test_pawn_structure() {
        let board = Board::from_str("4k3/pp4p1/8/3P4/8/8/P4PPP/4K3 w - - 0 1").unwrap();
        assert!(is_passed_pawn(&board, sq("d5"), Color::White));
        assert!(!is_passed_pawn(&board, sq("a2"), Color::White));
        let isolated = isolated_pawns(&board, Color::White);
        assert!(isolated & BitBoard::from_square(sq("d5")) != EMPTY);
        assert!(isolated & BitBoard::from_square(sq("a2")) != EMPTY);
        assert!(isolated & BitBoard::from_square(sq("g2")) == EMPTY);
        assert!(pawn_can_attack(&board, sq("f5"), Color::Black));
        assert!(!pawn_can_attack(&board, sq("d6"), Color::Black));
    }

    #[test]
    fn test_central_and_flank() {
        assert!(is_central(sq("d3")));
        assert!(is_central(sq("e6")));
        assert!(!is_central(sq("c4")));
        assert_eq!(Flank::of(File::G), Some(Flank::Kingside));
        assert_eq!(Flank::of(File::D), None);
    }

    #[test]
    fn test_bishop_pair() {
        let board = Board::default();
        assert!(has_bishop_pair(&board, Color::White));
        let board = Board::from_str("4k3/8/8/8/8/8/8/2B1KB2 w - - 0 1").unwrap();
        assert!(has_bishop_pair(&board, Color::White));
        let board = Board::from_str("4k3/8/8/8/8/8/8/B1B1K3 w - - 0 1").unwrap();
        assert!(!has_bishop_pair(&board, Color::White));
    }
}
