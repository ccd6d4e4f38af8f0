//! Chess highlight detection and curation.
//!
//! Takes a fully analyzed game (engine evaluations, centipawn loss, material
//! and positions per half-move) and produces a short, prioritized list of
//! notable events per game phase. Rules run in one forward pass over the
//! moves; `curation` turns their raw output into the final list.

pub mod board_utils;
pub mod config;
pub mod context;
pub mod curation;
pub mod detector;
pub mod error;
pub mod highlight;
pub mod model;
pub mod rules;
pub mod state;

pub use chess;

pub use config::{CplThresholds, DetectorConfig, RuleSettings};
pub use detector::{DetectionRun, HighlightDetector, RuleFailure};
pub use error::HighlightError;
pub use highlight::{Highlight, RuleKind};
pub use model::{Assessment, GameInput, MoveRecord, Phase, PhaseBounds, Side, SideMove};
pub use rules::{Rule, RuleRegistry};

/// Rule tags and display names, in registry order.
pub const RULE_TAGS: &[(&str, &str)] = &[
    ("bishop_pair", "Bishop Pair"),
    ("material_imbalance", "Material Imbalance"),
    ("exchange_sequence", "Exchange Sequence"),
    ("theory_departure", "Theory Departure"),
    ("novelty", "Novelty"),
    ("castling", "Castling"),
    ("pawn_break", "Pawn Break"),
    ("simplification", "Simplification"),
    ("evaluation_swing", "Evaluation Swing"),
    ("momentum_shift", "Momentum Shift"),
    ("forcing_combination", "Forcing Combination"),
    ("tactical_opportunity", "Tactical Opportunity"),
    ("defensive_resource", "Defensive Resource"),
    ("blundered_piece", "Blundered Piece"),
    ("positional_improvement", "Positional Improvement"),
    ("initiative", "Initiative"),
    ("tactical_resource", "Tactical Resource"),
    ("centralization", "Centralization"),
    ("pawn_storm", "Pawn Storm"),
    ("delayed_mating", "Delayed Mating"),
    ("fork", "Fork"),
    ("skewer", "Skewer"),
    ("pin", "Pin"),
    ("discovered_attack", "Discovered Attack"),
    ("battery", "Battery"),
    ("decoy", "Decoy"),
    ("zwischenzug", "Zwischenzug"),
    ("interference", "Interference"),
    ("windmill", "Windmill"),
    ("back_rank_weakness", "Back Rank Weakness"),
    ("weak_square", "Weak Square"),
    ("isolated_pawn", "Isolated Pawn"),
    ("perpetual_check", "Perpetual Check"),
    ("zugzwang", "Zugzwang"),
    ("piece_coordination", "Piece Coordination"),
    ("king_activity", "King Activity"),
    ("pawn_promotion_threat", "Pawn Promotion Threat"),
    ("tempo_gain", "Tempo Gain"),
    ("exchange_sacrifice", "Exchange Sacrifice"),
    ("rook_lift", "Rook Lift"),
    ("knight_outpost", "Knight Outpost"),
    ("breakthrough_sacrifice", "Breakthrough Sacrifice"),
    ("defensive_fortress", "Defensive Fortress"),
    ("tactical_sequence", "Tactical Sequence"),
];

/// Display name for a rule tag
pub fn rule_display_name(tag: &str) -> Option<&'static str> {
    RULE_TAGS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, name)| *name)
}
