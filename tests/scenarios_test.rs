/// End-to-end scenarios: a hand-built game goes through the detector and
/// the curated output is checked.
mod common;

use common::{capture, mv, pair, quiet_moves, with_fen, PHASES};
use highlight_engine::curation::{curate, REPETITION_PENALTY};
use highlight_engine::{
    DetectionRun, DetectorConfig, Highlight, HighlightDetector, MoveRecord, RuleKind, Side,
    SideMove,
};

fn only(kinds: &[RuleKind]) -> DetectorConfig {
    let mut config = DetectorConfig::all_disabled();
    for kind in kinds {
        config.set_enabled(*kind, true);
    }
    config
}

fn windmill_game() -> Vec<MoveRecord> {
    let mut moves = quiet_moves(15..19);
    moves.extend([
        pair(19, mv("Bg5", "+1.00", 0.0), mv("Kg8", "+1.00", 0.0)),
        pair(20, capture("Rxf7+", "+1.20", 0.0, "p"), mv("Kg8", "+1.10", 0.0)),
        // The reply misjudges the position, so the check also gains a tempo
        pair(21, capture("Rxb7+", "+1.40", 0.0, "b"), mv("Kh8", "+1.40", 60.0)),
        pair(22, capture("Rxa7+", "+1.10", 0.0, "p"), mv("Kg8", "+1.10", 0.0)),
        pair(23, mv("Rg7+", "+1.10", 0.0), mv("Kh8", "+1.10", 0.0)),
    ]);
    moves
}

#[test]
fn test_windmill_is_reported_once_and_covers_its_checks() {
    let moves = windmill_game();
    let detector = HighlightDetector::new(&only(&[
        RuleKind::Windmill,
        RuleKind::TempoGain,
        RuleKind::PerpetualCheck,
        RuleKind::Fork,
    ]));

    let run = detector.run(&moves, PHASES);
    assert!(run
        .raw
        .iter()
        .any(|h| h.rule_type == RuleKind::TempoGain && h.move_number == 21));

    let curated = detector.detect(&moves, PHASES);
    let windmills: Vec<&Highlight> = curated
        .iter()
        .filter(|h| h.rule_type == RuleKind::Windmill)
        .collect();
    assert_eq!(windmills.len(), 1);
    assert_eq!(windmills[0].side, Side::White);
    assert_eq!(windmills[0].move_number, 20);
    assert_eq!(windmills[0].move_number_end, Some(22));
    assert_eq!(
        windmills[0].description,
        "White executed a windmill (series of checks and captures)"
    );

    let duplicates = curated.iter().filter(|h| {
        h.side == Side::White
            && h.rule_type != RuleKind::Windmill
            && (21..=22).contains(&h.move_number)
    });
    assert_eq!(duplicates.count(), 0);
}

#[test]
fn test_equal_pawn_trade_is_not_a_combination() {
    let moves = vec![
        pair(
            1,
            with_fen(
                mv("e4", "+0.30", 0.0),
                "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
            ),
            with_fen(
                mv("d5", "+0.40", 20.0),
                "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
            ),
        ),
        pair(
            2,
            with_fen(
                SideMove {
                    material: 3900,
                    ..capture("exd5", "+0.40", 0.0, "p")
                },
                "rnbqkbnr/ppp1pppp/8/3P4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2",
            ),
            with_fen(
                SideMove {
                    material: 3800,
                    ..capture("Qxd5", "+0.40", 0.0, "p")
                },
                "rnb1kbnr/ppp1pppp/8/3q4/8/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3",
            ),
        ),
        pair(
            3,
            with_fen(
                SideMove {
                    material: 3800,
                    ..mv("Nc3", "+0.40", 0.0)
                },
                "rnb1kbnr/ppp1pppp/8/3q4/8/2N5/PPPP1PPP/R1BQKBNR b KQkq - 1 3",
            ),
            with_fen(
                SideMove {
                    material: 3800,
                    ..mv("Qa5", "+0.40", 0.0)
                },
                "rnb1kbnr/ppp1pppp/8/q7/8/2N5/PPPP1PPP/R1BQKBNR w KQkq - 2 4",
            ),
        ),
    ];

    let run = HighlightDetector::new(&DetectorConfig::default()).run(&moves, PHASES);
    let combination = run.raw.iter().filter(|h| {
        h.move_number == 2
            && matches!(
                h.rule_type,
                RuleKind::ForcingCombination | RuleKind::TacticalResource | RuleKind::Decoy
            )
    });
    assert_eq!(combination.count(), 0);
}

#[test]
fn test_delayed_mating_replaces_individual_misses() {
    let miss = |san: &str| SideMove {
        best_move: Some("Qh7#".into()),
        ..mv(san, "M1", 300.0)
    };
    let mut moves = quiet_moves(26..30);
    moves.extend([
        pair(30, miss("Qg6"), mv("Kg8", "M2", 0.0)),
        pair(31, miss("Qe6+"), mv("Kh8", "M1", 0.0)),
        pair(32, mv("Qh3+", "+9.00", 0.0), mv("Kg8", "+9.00", 0.0)),
    ]);

    let detector = HighlightDetector::new(&only(&[RuleKind::DelayedMating]));
    let run = detector.run(&moves, PHASES);
    let raw_misses = run
        .raw
        .iter()
        .filter(|h| h.rule_type == RuleKind::MissedMate)
        .count();
    assert_eq!(raw_misses, 2);

    let curated = detector.detect(&moves, PHASES);
    assert_eq!(curated.len(), 1);
    assert_eq!(curated[0].rule_type, RuleKind::DelayedMating);
    assert_eq!(curated[0].move_number, 30);
    assert_eq!(curated[0].move_number_end, Some(31));
    assert!(!curated.iter().any(|h| h.rule_type == RuleKind::MissedMate));
}

fn at(move_number: u32, kind: RuleKind, priority: i32, description: &str) -> Highlight {
    let record = MoveRecord {
        move_number,
        ..Default::default()
    };
    Highlight::new(&record, Side::White, kind, priority, description)
}

#[test]
fn test_repeated_pattern_is_penalized_in_a_crowded_phase() {
    let repeated = "White forked the king and rook";
    let mut raw = vec![at(5, RuleKind::Fork, 41, repeated)];
    let middlegame_kinds = [
        RuleKind::Pin,
        RuleKind::Skewer,
        RuleKind::Battery,
        RuleKind::Decoy,
        RuleKind::RookLift,
        RuleKind::WeakSquare,
        RuleKind::Centralization,
    ];
    for (i, kind) in middlegame_kinds.into_iter().enumerate() {
        raw.push(at(12 + i as u32, kind, 40, &format!("White pattern {i}")));
    }
    raw.push(at(25, RuleKind::Fork, 40, repeated));

    let run = DetectionRun {
        raw,
        ..Default::default()
    };
    let curated = curate(&run, PHASES, 10);

    let fork = curated
        .iter()
        .find(|h| h.rule_type == RuleKind::Fork && h.move_number == 25)
        .expect("fork kept in the middlegame");
    assert_eq!(fork.priority, 40 - REPETITION_PENALTY);

    let pin = curated
        .iter()
        .find(|h| h.rule_type == RuleKind::Pin)
        .expect("pin kept");
    assert_eq!(pin.priority, 40);

    // With a cap of one the repeated pattern loses to the fresh one
    let capped = curate(&run, PHASES, 1);
    assert!(capped
        .iter()
        .filter(|h| h.move_number > PHASES.opening_end)
        .all(|h| h.rule_type == RuleKind::Pin));
}
