//! Rule contract and registry.
//!
//! Every rule looks at one move pair at a time, for both sides, and returns
//! the highlights it finds. Rules that need memory across moves keep it in
//! their own tracker inside [`SharedState`].

pub mod attacks;
pub mod line_geometry;
pub mod narrative;
pub mod positional;
pub mod sacrifices;
pub mod sequences;

use crate::board_utils::piece_value;
use crate::config::{DetectorConfig, RuleSettings};
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{MoveRecord, Side, SideMove};
use crate::state::SharedState;

pub trait Rule {
    /// Tag used for configuration, dedup and suppression.
    fn kind(&self) -> RuleKind;

    /// Examine one move pair. Missing data yields no highlights; an `Err`
    /// is logged by the detector and treated the same way.
    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError>;
}

struct RegisteredRule {
    rule: Box<dyn Rule>,
    enabled: bool,
}

/// Owns the full rule set in a fixed order
pub struct RuleRegistry {
    rules: Vec<RegisteredRule>,
}

impl RuleRegistry {
    pub fn from_config(config: &DetectorConfig) -> Self {
        let rules = RuleKind::REGISTRY_ORDER
            .into_iter()
            .filter_map(|kind| {
                let settings = config.rule(kind);
                let enabled = settings.enabled;
                create_rule(kind, &settings).map(|rule| RegisteredRule { rule, enabled })
            })
            .collect();
        Self { rules }
    }

    /// Registry over a custom rule list, all enabled
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| RegisteredRule { rule, enabled: true })
                .collect(),
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = &dyn Rule> + '_ {
        self.rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn create_rule(kind: RuleKind, settings: &RuleSettings) -> Option<Box<dyn Rule>> {
    let rule: Box<dyn Rule> = match kind {
        RuleKind::BishopPair => Box::new(narrative::BishopPairRule),
        RuleKind::MaterialImbalance => Box::new(narrative::MaterialImbalanceRule),
        RuleKind::ExchangeSequence => Box::new(narrative::ExchangeSequenceRule),
        RuleKind::TheoryDeparture => Box::new(narrative::TheoryDepartureRule),
        RuleKind::Novelty => Box::new(narrative::NoveltyRule),
        RuleKind::Castling => Box::new(narrative::CastlingRule),
        RuleKind::PawnBreak => Box::new(positional::PawnBreakRule),
        RuleKind::Simplification => Box::new(narrative::SimplificationRule),
        RuleKind::EvaluationSwing => Box::new(sequences::EvaluationSwingRule::new(settings)),
        RuleKind::MomentumShift => Box::new(sequences::MomentumShiftRule::new(settings)),
        RuleKind::ForcingCombination => Box::new(sacrifices::ForcingCombinationRule::new(settings)),
        RuleKind::TacticalOpportunity => Box::new(narrative::TacticalOpportunityRule),
        RuleKind::DefensiveResource => Box::new(narrative::DefensiveResourceRule),
        RuleKind::BlunderedPiece => Box::new(narrative::BlunderedPieceRule),
        RuleKind::PositionalImprovement => Box::new(positional::PositionalImprovementRule),
        RuleKind::Initiative => Box::new(narrative::InitiativeRule),
        RuleKind::TacticalResource => Box::new(sacrifices::TacticalResourceRule),
        RuleKind::Centralization => Box::new(positional::CentralizationRule),
        RuleKind::PawnStorm => Box::new(sequences::PawnStormRule::new(settings)),
        RuleKind::DelayedMating => Box::new(sequences::DelayedMatingRule::new(settings)),
        RuleKind::Fork => Box::new(attacks::ForkRule),
        RuleKind::Skewer => Box::new(line_geometry::SkewerRule),
        RuleKind::Pin => Box::new(line_geometry::PinRule),
        RuleKind::DiscoveredAttack => Box::new(line_geometry::DiscoveredAttackRule),
        RuleKind::Battery => Box::new(line_geometry::BatteryRule),
        RuleKind::Decoy => Box::new(sacrifices::DecoyRule),
        RuleKind::Zwischenzug => Box::new(attacks::ZwischenzugRule),
        RuleKind::Interference => Box::new(line_geometry::InterferenceRule),
        RuleKind::Windmill => Box::new(sequences::WindmillRule::new(settings)),
        RuleKind::BackRankWeakness => Box::new(positional::BackRankWeaknessRule),
        RuleKind::WeakSquare => Box::new(positional::WeakSquareRule),
        RuleKind::IsolatedPawn => Box::new(positional::IsolatedPawnRule),
        RuleKind::PerpetualCheck => Box::new(sequences::PerpetualCheckRule::new(settings)),
        RuleKind::Zugzwang => Box::new(sequences::ZugzwangRule),
        RuleKind::PieceCoordination => Box::new(attacks::PieceCoordinationRule),
        RuleKind::KingActivity => Box::new(positional::KingActivityRule),
        RuleKind::PawnPromotionThreat => Box::new(positional::PawnPromotionThreatRule),
        RuleKind::TempoGain => Box::new(attacks::TempoGainRule),
        RuleKind::ExchangeSacrifice => Box::new(sacrifices::ExchangeSacrificeRule),
        RuleKind::RookLift => Box::new(positional::RookLiftRule),
        RuleKind::KnightOutpost => Box::new(positional::KnightOutpostRule),
        RuleKind::BreakthroughSacrifice => {
            Box::new(sacrifices::BreakthroughSacrificeRule::new(settings))
        }
        RuleKind::DefensiveFortress => Box::new(sequences::DefensiveFortressRule::new(settings)),
        RuleKind::TacticalSequence => Box::new(sacrifices::TacticalSequenceRule::new(settings)),
        RuleKind::MissedMate => return None,
    };
    Some(rule)
}

/// CPL below which a move counts as forced or near-perfect
pub(crate) const PRECISE_CPL: f64 = 30.0;
/// CPL below which both sides are considered to be in a forced line
pub(crate) const FORCED_CPL: f64 = 10.0;
/// Alternatives worse than this make the played move clearly best
pub(crate) const CLEAR_ALTERNATIVE_CPL: f64 = 50.0;

/// Value of the piece this half-move captured
pub(crate) fn capture_value(side_move: &SideMove) -> i32 {
    side_move.captured().map(piece_value).unwrap_or_default()
}

pub(crate) fn cpl_below(side_move: &SideMove, limit: f64) -> bool {
    side_move.cpl.is_some_and(|cpl| cpl < limit)
}

/// Both alternatives (when known) were clearly worse than the played move
pub(crate) fn alternatives_clearly_worse(side_move: &SideMove, margin: f64) -> bool {
    side_move.cpl_2.map_or(true, |c| c > margin) && side_move.cpl_3.map_or(true, |c| c > margin)
}

/// Both alternatives are known and clearly worse
pub(crate) fn alternatives_known_and_worse(side_move: &SideMove, margin: f64) -> bool {
    matches!((side_move.cpl_2, side_move.cpl_3), (Some(a), Some(b)) if a > margin && b > margin)
}

fn equal_trade(a: i32, b: i32) -> bool {
    (a - b).abs() <= 50
}

/// The side's capture is one half of an even trade: the opponent answers
/// with an equal capture, or the move itself answers one.
pub(crate) fn is_simple_recapture(ctx: &EvaluationContext<'_>, side: Side) -> bool {
    let Some(record) = ctx.current() else {
        return false;
    };
    let own = capture_value(record.side(side));
    if own == 0 {
        return false;
    }
    let answered = ctx
        .reply(side)
        .is_some_and(|reply| equal_trade(capture_value(reply), own));
    let answering = ctx
        .previous_opponent(side)
        .is_some_and(|prev| equal_trade(capture_value(prev), own));
    answered || answering
}

/// Both sides played at forcing precision around this half-move
pub(crate) fn in_forced_sequence(ctx: &EvaluationContext<'_>, side: Side) -> bool {
    let Some(record) = ctx.current() else {
        return false;
    };
    let forced = |m: &SideMove| cpl_below(m, FORCED_CPL);
    let own = forced(record.side(side));
    let before = ctx.previous_opponent(side).is_some_and(forced);
    let after = ctx.reply(side).is_some_and(forced);
    own && before && after
}
