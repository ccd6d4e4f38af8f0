//! Highlight records and the closed set of rule kinds that produce them

use serde::{Deserialize, Serialize};

use crate::model::{range_notation, MoveRecord, Side};

/// Stable identifier of the rule that produced a highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    BishopPair,
    MaterialImbalance,
    ExchangeSequence,
    TheoryDeparture,
    Novelty,
    Castling,
    PawnBreak,
    Simplification,
    EvaluationSwing,
    MomentumShift,
    ForcingCombination,
    TacticalOpportunity,
    DefensiveResource,
    BlunderedPiece,
    PositionalImprovement,
    Initiative,
    TacticalResource,
    Centralization,
    PawnStorm,
    DelayedMating,
    Fork,
    Skewer,
    Pin,
    DiscoveredAttack,
    Battery,
    Decoy,
    Zwischenzug,
    Interference,
    Windmill,
    BackRankWeakness,
    WeakSquare,
    IsolatedPawn,
    PerpetualCheck,
    Zugzwang,
    PieceCoordination,
    KingActivity,
    PawnPromotionThreat,
    TempoGain,
    ExchangeSacrifice,
    RookLift,
    KnightOutpost,
    BreakthroughSacrifice,
    DefensiveFortress,
    TacticalSequence,
    /// Emitted by the delayed-mating rule for a single missed mate
    MissedMate,
}

impl RuleKind {
    /// Every configurable rule, in the order the detector runs them
    pub const REGISTRY_ORDER: [RuleKind; 44] = [
        RuleKind::BishopPair,
        RuleKind::MaterialImbalance,
        RuleKind::ExchangeSequence,
        RuleKind::TheoryDeparture,
        RuleKind::Novelty,
        RuleKind::Castling,
        RuleKind::PawnBreak,
        RuleKind::Simplification,
        RuleKind::EvaluationSwing,
        RuleKind::MomentumShift,
        RuleKind::ForcingCombination,
        RuleKind::TacticalOpportunity,
        RuleKind::DefensiveResource,
        RuleKind::BlunderedPiece,
        RuleKind::PositionalImprovement,
        RuleKind::Initiative,
        RuleKind::TacticalResource,
        RuleKind::Centralization,
        RuleKind::PawnStorm,
        RuleKind::DelayedMating,
        RuleKind::Fork,
        RuleKind::Skewer,
        RuleKind::Pin,
        RuleKind::DiscoveredAttack,
        RuleKind::Battery,
        RuleKind::Decoy,
        RuleKind::Zwischenzug,
        RuleKind::Interference,
        RuleKind::Windmill,
        RuleKind::BackRankWeakness,
        RuleKind::WeakSquare,
        RuleKind::IsolatedPawn,
        RuleKind::PerpetualCheck,
        RuleKind::Zugzwang,
        RuleKind::PieceCoordination,
        RuleKind::KingActivity,
        RuleKind::PawnPromotionThreat,
        RuleKind::TempoGain,
        RuleKind::ExchangeSacrifice,
        RuleKind::RookLift,
        RuleKind::KnightOutpost,
        RuleKind::BreakthroughSacrifice,
        RuleKind::DefensiveFortress,
        RuleKind::TacticalSequence,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKind::BishopPair => "bishop_pair",
            RuleKind::MaterialImbalance => "material_imbalance",
            RuleKind::ExchangeSequence => "exchange_sequence",
            RuleKind::TheoryDeparture => "theory_departure",
            RuleKind::Novelty => "novelty",
            RuleKind::Castling => "castling",
            RuleKind::PawnBreak => "pawn_break",
            RuleKind::Simplification => "simplification",
            RuleKind::EvaluationSwing => "evaluation_swing",
            RuleKind::MomentumShift => "momentum_shift",
            RuleKind::ForcingCombination => "forcing_combination",
            RuleKind::TacticalOpportunity => "tactical_opportunity",
            RuleKind::DefensiveResource => "defensive_resource",
            RuleKind::BlunderedPiece => "blundered_piece",
            RuleKind::PositionalImprovement => "positional_improvement",
            RuleKind::Initiative => "initiative",
            RuleKind::TacticalResource => "tactical_resource",
            RuleKind::Centralization => "centralization",
            RuleKind::PawnStorm => "pawn_storm",
            RuleKind::DelayedMating => "delayed_mating",
            RuleKind::Fork => "fork",
            RuleKind::Skewer => "skewer",
            RuleKind::Pin => "pin",
            RuleKind::DiscoveredAttack => "discovered_attack",
            RuleKind::Battery => "battery",
            RuleKind::Decoy => "decoy",
            RuleKind::Zwischenzug => "zwischenzug",
            RuleKind::Interference => "interference",
            RuleKind::Windmill => "windmill",
            RuleKind::BackRankWeakness => "back_rank_weakness",
            RuleKind::WeakSquare => "weak_square",
            RuleKind::IsolatedPawn => "isolated_pawn",
            RuleKind::PerpetualCheck => "perpetual_check",
            RuleKind::Zugzwang => "zugzwang",
            RuleKind::PieceCoordination => "piece_coordination",
            RuleKind::KingActivity => "king_activity",
            RuleKind::PawnPromotionThreat => "pawn_promotion_threat",
            RuleKind::TempoGain => "tempo_gain",
            RuleKind::ExchangeSacrifice => "exchange_sacrifice",
            RuleKind::RookLift => "rook_lift",
            RuleKind::KnightOutpost => "knight_outpost",
            RuleKind::BreakthroughSacrifice => "breakthrough_sacrifice",
            RuleKind::DefensiveFortress => "defensive_fortress",
            RuleKind::TacticalSequence => "tactical_sequence",
            RuleKind::MissedMate => "missed_mate",
        }
    }

    pub fn from_tag(tag: &str) -> Option<RuleKind> {
        RuleKind::REGISTRY_ORDER
            .into_iter()
            .chain([RuleKind::MissedMate])
            .find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub move_number: u32,
    /// Last move of a multi-move event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_number_end: Option<u32>,
    pub side: Side,
    pub move_notation: String,
    pub description: String,
    pub priority: i32,
    pub rule_type: RuleKind,
}

impl Highlight {
    /// Highlight on one half-move
    pub fn new(
        record: &MoveRecord,
        side: Side,
        rule_type: RuleKind,
        priority: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            move_number: record.move_number,
            move_number_end: None,
            side,
            move_notation: record.notation(side),
            description: description.into(),
            priority,
            rule_type,
        }
    }

    /// Highlight covering a whole move pair ("12. Qxd8 ... Kxd8")
    pub fn for_pair(
        record: &MoveRecord,
        side: Side,
        rule_type: RuleKind,
        priority: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            move_notation: record.pair_notation(),
            ..Self::new(record, side, rule_type, priority, description)
        }
    }

    /// Highlight spanning `first..=last`
    pub fn ranged(
        first: u32,
        last: u32,
        side: Side,
        rule_type: RuleKind,
        priority: i32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            move_number: first,
            move_number_end: Some(last.max(first)),
            side,
            move_notation: range_notation(first, last.max(first), side),
            description: description.into(),
            priority,
            rule_type,
        }
    }

    /// Leading clause of the description, used for cross-phase repetition
    pub fn pattern(&self) -> &str {
        self.description
            .split('.')
            .next()
            .unwrap_or_default()
            .trim()
    }
}
