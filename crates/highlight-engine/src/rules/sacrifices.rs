//! Material given up on purpose: decoys, exchange sacrifices, breakthroughs,
//! forcing combinations and the multi-move tactical sequences that follow.

use chess::Piece;

use super::attacks::is_exploitable_fork;
use super::line_geometry::{is_exploitable_skewer, pinned_by};
use super::{
    alternatives_known_and_worse, capture_value, cpl_below, in_forced_sequence,
    is_simple_recapture, Rule, CLEAR_ALTERNATIVE_CPL, FORCED_CPL, PRECISE_CPL,
};
use crate::board_utils::{attacks, is_checkmate, king_value, piece_name, VALUABLE};
use crate::config::RuleSettings;
use crate::context::EvaluationContext;
use crate::error::HighlightError;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{MoveRecord, Side, SideMove};
use crate::state::SharedState;

/// Captures of equal value within this margin are an even trade
const EQUAL_TRADE: i32 = 50;

fn even_trade(ours: &SideMove, theirs: &SideMove) -> bool {
    theirs.is_capture() && (capture_value(ours) - capture_value(theirs)).abs() <= EQUAL_TRADE
}

/// Evaluation from the side's own point of view
fn own_eval(side_move: &SideMove, side: Side) -> Option<f64> {
    side_move.centipawns().map(|cp| cp * side.sign())
}

/// How much material the side is down against the previous pair
fn material_given(ctx: &EvaluationContext<'_>, side: Side) -> Option<i32> {
    ctx.material_change(side).map(|change| -change)
}

/// Change in (own - opponent) material across this pair
fn balance_change(ctx: &EvaluationContext<'_>, side: Side) -> Option<i32> {
    Some(ctx.material_change(side)? - ctx.material_change(side.opponent())?)
}

/// Follow-up tactic that pays off a decoy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payoff {
    Fork,
    Pin,
    Skewer,
    Checkmate,
}

impl Payoff {
    fn title(self) -> &'static str {
        match self {
            Payoff::Fork => "Fork",
            Payoff::Pin => "Pin",
            Payoff::Skewer => "Skewer",
            Payoff::Checkmate => "Checkmate",
        }
    }
}

/// Giving up material so an enemy piece lands where it can be exploited
pub struct DecoyRule;

impl DecoyRule {
    /// Minimum net material the mover must give up
    const MIN_LOSS: i32 = 200;

    fn payoff(
        ctx: &EvaluationContext<'_>,
        side: Side,
        lured: chess::Square,
    ) -> Result<Option<Payoff>, HighlightError> {
        let color = side.color();
        for ahead in 1..=2 {
            let index = ctx.move_index + ahead;
            if ctx
                .moves
                .get(index)
                .is_none_or(|record| !record.side(side).has_move())
            {
                break;
            }
            let (Some(board), Some(moved)) = (
                ctx.positions.board_after(index, side)?,
                ctx.positions.moved_piece(index, side)?,
            ) else {
                continue;
            };
            if is_checkmate(&board) {
                return Ok(Some(Payoff::Checkmate));
            }
            if board.color_on(lured) != Some(!color) {
                continue;
            }
            let hits_lured = attacks(&board, moved.to) & chess::BitBoard::from_square(lured)
                != chess::EMPTY;
            if hits_lured && is_exploitable_fork(&board, moved.to, color) {
                return Ok(Some(Payoff::Fork));
            }
            if pinned_by(&board, moved.to, color) == Some(lured) {
                return Ok(Some(Payoff::Pin));
            }
            if hits_lured && is_exploitable_skewer(&board, moved.to, color) {
                return Ok(Some(Payoff::Skewer));
            }
        }
        Ok(None)
    }

    fn decoy(
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        side: Side,
    ) -> Result<Option<Highlight>, HighlightError> {
        let mv = record.side(side);
        if !mv.has_move() || !ctx.is_good(mv) {
            return Ok(None);
        }
        let Some(reply) = ctx.reply(side) else {
            return Ok(None);
        };
        if !reply.is_capture() || !cpl_below(reply, PRECISE_CPL) {
            return Ok(None);
        }
        if capture_value(reply) - capture_value(mv) < Self::MIN_LOSS {
            return Ok(None);
        }

        let (at, by) = EvaluationContext::reply_slot(ctx.move_index, side);
        let Some(capturer) = ctx.positions.moved_piece(at, by)? else {
            return Ok(None);
        };
        if capturer.piece != Piece::King && king_value(capturer.piece) < VALUABLE {
            return Ok(None);
        }

        let Some(payoff) = Self::payoff(ctx, side, capturer.to)? else {
            return Ok(None);
        };
        let opponent = side.opponent().name();
        let lured = piece_name(capturer.piece);
        let (priority, description) = match payoff {
            Payoff::Checkmate => (
                48,
                format!(
                    "{} executed a decoy, luring {opponent}'s {lured} into {}",
                    side.name(),
                    payoff.title()
                ),
            ),
            _ => (
                45,
                format!(
                    "{} executed a decoy, luring {opponent}'s {lured} away, enabling a {}",
                    side.name(),
                    payoff.title()
                ),
            ),
        };
        Ok(Some(Highlight::new(record, side, RuleKind::Decoy, priority, description)))
    }
}

impl Rule for DecoyRule {
    fn kind(&self) -> RuleKind {
        RuleKind::Decoy
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        if ctx.is_opening() {
            return Ok(Vec::new());
        }
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            highlights.extend(Self::decoy(record, ctx, side)?);
        }
        Ok(highlights)
    }
}

/// Rook for a minor piece within one pair, without the evaluation collapsing
pub struct ExchangeSacrificeRule;

impl Rule for ExchangeSacrificeRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ExchangeSacrifice
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let Some(prev) = ctx.prev else {
            return Ok(highlights);
        };
        for side in Side::BOTH {
            let mv = record.side(side);
            let took_minor = matches!(mv.captured(), Some(Piece::Knight | Piece::Bishop));
            let lost_rook = record.side(side.opponent()).captured() == Some(Piece::Rook);
            if !took_minor || !lost_rook {
                continue;
            }
            let Some(balance) = balance_change(ctx, side) else {
                continue;
            };
            if !(-250..=-150).contains(&balance) {
                continue;
            }
            let eval_change = match (own_eval(mv, side), own_eval(prev.side(side), side)) {
                (Some(after), Some(before)) => after - before,
                _ => 0.0,
            };
            if eval_change > -100.0 {
                highlights.push(Highlight::for_pair(
                    record,
                    side,
                    RuleKind::ExchangeSacrifice,
                    36,
                    format!(
                        "{} sacrificed the exchange for positional compensation",
                        side.name()
                    ),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A piece given up for good, paid back by a large evaluation swing
pub struct BreakthroughSacrificeRule {
    min_sacrifice: i32,
    min_gain: f64,
    lookahead: usize,
}

impl BreakthroughSacrificeRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_sacrifice: settings.param("min_sacrifice", 300.0) as i32,
            min_gain: settings.param("min_gain", 200.0),
            lookahead: 4,
        }
    }

    /// Material won back within the lookahead window
    fn regained(&self, ctx: &EvaluationContext<'_>, side: Side, sacrificed: i32) -> bool {
        let before = ctx.prev_counts(side).material;
        (1..=self.lookahead as isize)
            .filter_map(|ahead| ctx.record_at(ahead))
            .any(|later| {
                let m = later.side(side);
                f64::from(capture_value(m)) >= f64::from(sacrificed) * 0.8
                    || m.material >= before - EQUAL_TRADE
            })
    }
}

impl Rule for BreakthroughSacrificeRule {
    fn kind(&self) -> RuleKind {
        RuleKind::BreakthroughSacrifice
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        if ctx.prev.is_none() || ctx.next.is_none() {
            return Ok(highlights);
        }
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.is_capture() || mv.cpl.is_none() {
                continue;
            }
            let Some(sacrificed) = material_given(ctx, side) else {
                continue;
            };
            if sacrificed < self.min_sacrifice || self.regained(ctx, side, sacrificed) {
                continue;
            }
            let swing = ctx
                .reply(side)
                .and_then(|reply| Some(own_eval(reply, side)? - own_eval(mv, side)?));
            if swing.is_some_and(|gain| gain > self.min_gain) {
                highlights.push(Highlight::new(
                    record,
                    side,
                    RuleKind::BreakthroughSacrifice,
                    44,
                    format!("{} sacrificed a piece to break through", side.name()),
                ));
            }
        }
        Ok(highlights)
    }
}

/// A capture that gives up material and leaves the opponent one good reply
pub struct ForcingCombinationRule {
    min_sacrifice: i32,
    min_improvement: f64,
}

impl ForcingCombinationRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_sacrifice: settings.param("min_sacrifice", 200.0) as i32,
            min_improvement: 100.0,
        }
    }

    fn combination(&self, record: &MoveRecord, ctx: &EvaluationContext<'_>, side: Side) -> bool {
        let mv = record.side(side);
        if ctx.move_index == 0 || !mv.is_capture() || !ctx.is_good(mv) {
            return false;
        }
        if material_given(ctx, side).is_none_or(|given| given < self.min_sacrifice) {
            return false;
        }

        let opponent = side.opponent();
        let next_opponent = ctx.next.map(|next| next.side(opponent));
        let equal_recapture = even_trade(mv, record.side(opponent))
            || next_opponent.is_some_and(|theirs| even_trade(mv, theirs));
        if equal_recapture {
            return false;
        }

        let reply = ctx.reply(side);
        let forced = reply.is_some_and(|r| {
            cpl_below(r, PRECISE_CPL)
                && match (r.cpl_2, r.cpl_3) {
                    (Some(_), Some(_)) => alternatives_known_and_worse(r, CLEAR_ALTERNATIVE_CPL),
                    _ => true,
                }
        });

        let after_capture = own_eval(mv, side);
        let after_reply = reply.and_then(|r| own_eval(r, side));
        let before = ctx.prev.and_then(|prev| own_eval(prev.side(side), side));
        let gain_over_reply = after_reply
            .zip(after_capture)
            .map(|(reply_eval, capture_eval)| reply_eval - capture_eval);
        let gain_over_move = after_capture
            .zip(before)
            .map(|(capture_eval, before_eval)| capture_eval - before_eval);
        let improved = gain_over_move.is_some_and(|g| g > self.min_improvement);
        let succeeded = improved || gain_over_reply.is_some_and(|g| g > self.min_improvement);

        (forced || improved) && succeeded
    }
}

impl Rule for ForcingCombinationRule {
    fn kind(&self) -> RuleKind {
        RuleKind::ForcingCombination
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        Ok(Side::BOTH
            .into_iter()
            .filter(|side| self.combination(record, ctx, *side))
            .map(|side| {
                Highlight::new(
                    record,
                    side,
                    RuleKind::ForcingCombination,
                    45,
                    format!("{} initiated a forcing combination", side.name()),
                )
            })
            .collect())
    }
}

/// A capture that opens a run of best-move pairs and wins material by the end
pub struct TacticalSequenceRule {
    min_gain: f64,
    max_pairs: usize,
}

impl TacticalSequenceRule {
    pub fn new(settings: &RuleSettings) -> Self {
        Self {
            min_gain: settings.param("min_gain", 200.0),
            max_pairs: 6,
        }
    }

    fn own_cpl(ctx: &EvaluationContext<'_>, index: usize, side: Side) -> Option<f64> {
        let m = ctx.moves.get(index)?.side(side);
        m.has_move().then_some(m.cpl).flatten()
    }

    /// At least two consecutive pairs after the start where both sides stay
    /// at best-move precision
    fn is_forcing(&self, ctx: &EvaluationContext<'_>, side: Side) -> bool {
        let start = ctx.move_index;
        let mut forced_pairs = 0;
        for index in start + 1..(start + self.max_pairs).min(ctx.moves.len()) {
            let Some(own) = Self::own_cpl(ctx, index, side) else {
                break;
            };
            let Some(theirs) = ctx.reply_at(index, side).and_then(|r| r.cpl) else {
                break;
            };
            if own >= FORCED_CPL || theirs >= FORCED_CPL {
                break;
            }
            forced_pairs += 1;
            if forced_pairs >= 2 {
                return true;
            }
        }
        false
    }

    /// Index of the last pair that still belongs to the sequence
    fn sequence_end(&self, ctx: &EvaluationContext<'_>, side: Side) -> usize {
        let start = ctx.move_index;
        let mut last = start;
        let mut captured = false;
        for index in start + 1..(start + self.max_pairs).min(ctx.moves.len()) {
            let Some(own) = Self::own_cpl(ctx, index, side) else {
                break;
            };
            if own >= PRECISE_CPL {
                break;
            }
            if ctx.moves[index].side(side).is_capture() {
                captured = true;
            }
            match ctx.reply_at(index, side).and_then(|r| r.cpl) {
                Some(theirs) if theirs < FORCED_CPL => last = index,
                Some(_) => {
                    let keeps_capturing = ctx
                        .moves
                        .get(index + 1)
                        .is_some_and(|next| next.side(side).is_capture());
                    if keeps_capturing {
                        last = index;
                        continue;
                    }
                    if captured {
                        break;
                    }
                    last = index;
                }
                None => {
                    if captured {
                        break;
                    }
                    last = index;
                }
            }
        }
        last
    }

    fn material_changes(ctx: &EvaluationContext<'_>, end: usize) -> bool {
        ctx.moves[ctx.move_index..=end]
            .iter()
            .any(|m| m.white.is_capture() || m.black.is_capture())
    }
}

impl Rule for TacticalSequenceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TacticalSequence
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        let Some(prev) = ctx.prev else {
            return Ok(highlights);
        };
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.is_capture() || !ctx.is_good(mv) || !self.is_forcing(ctx, side) {
                continue;
            }
            let end = self.sequence_end(ctx, side);
            if end <= ctx.move_index || !Self::material_changes(ctx, end) {
                continue;
            }
            let Some(end_record) = ctx.moves.get(end) else {
                continue;
            };
            let gain = own_eval(end_record.side(side), side)
                .zip(own_eval(prev.side(side), side))
                .map(|(after, before)| after - before);
            if gain.is_some_and(|g| g >= self.min_gain) {
                let mut highlight = Highlight::ranged(
                    record.move_number,
                    end_record.move_number,
                    side,
                    RuleKind::TacticalSequence,
                    42,
                    format!("{} used a tactical sequence to win material", side.name()),
                );
                if let Some(san) = mv.san() {
                    highlight.move_notation = format!("{} {san}", highlight.move_notation);
                }
                highlights.push(highlight);
            }
        }
        Ok(highlights)
    }
}

/// A strong move that wins material or evaluation outside a forced line
pub struct TacticalResourceRule;

impl TacticalResourceRule {
    fn is_resource(ctx: &EvaluationContext<'_>, mv: &SideMove, side: Side) -> bool {
        let delta = ctx.own_eval_delta(side);
        if mv.is_capture() {
            let captured = capture_value(mv);
            let recaptured = ctx.reply(side).map(capture_value).unwrap_or_default();
            captured - recaptured > 0
                || (captured >= VALUABLE && delta.is_some_and(|d| d >= 200.0))
        } else {
            let needed = if ctx.is_endgame() { 400.0 } else { 300.0 };
            delta.is_some_and(|d| d >= needed)
        }
    }
}

impl Rule for TacticalResourceRule {
    fn kind(&self) -> RuleKind {
        RuleKind::TacticalResource
    }

    fn evaluate(
        &self,
        record: &MoveRecord,
        ctx: &EvaluationContext<'_>,
        _state: &mut SharedState,
    ) -> Result<Vec<Highlight>, HighlightError> {
        let mut highlights = Vec::new();
        for side in Side::BOTH {
            let mv = record.side(side);
            if !mv.has_move()
                || !ctx.is_good(mv)
                || is_simple_recapture(ctx, side)
                || in_forced_sequence(ctx, side)
                || !Self::is_resource(ctx, mv, side)
            {
                continue;
            }
            let (priority, description) = if alternatives_known_and_worse(mv, CLEAR_ALTERNATIVE_CPL)
            {
                (28, format!("{} found the clearly best tactical resource", side.name()))
            } else {
                (25, format!("{} found a strong tactical resource", side.name()))
            };
            highlights.push(Highlight::new(
                record,
                side,
                RuleKind::TacticalResource,
                priority,
                description,
            ));
        }
        Ok(highlights)
    }
}
