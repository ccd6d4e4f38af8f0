//! Main pass: run every enabled rule over every move, then curate.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CplThresholds, DetectorConfig};
use crate::context::{EvaluationContext, PositionCache, SideCounts};
use crate::curation::curate;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{Assessment, MoveRecord, PhaseBounds, Side};
use crate::rules::RuleRegistry;
use crate::state::SharedState;

/// A rule that returned an error on one move. Kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFailure {
    pub move_number: u32,
    pub rule: RuleKind,
    pub error: String,
}

/// Everything one main pass produced, before curation
#[derive(Debug, Clone, Default)]
pub struct DetectionRun {
    pub raw: Vec<Highlight>,
    pub state: SharedState,
    pub failures: Vec<RuleFailure>,
}

/// Opening-theory bookkeeping carried between moves
#[derive(Debug, Clone, Copy, Default)]
struct TheoryState {
    last_book_move: Option<u32>,
    departed: bool,
}

impl TheoryState {
    fn advance(&mut self, record: &MoveRecord) {
        let in_book = Side::BOTH
            .iter()
            .any(|side| record.side(*side).assessment_is(Assessment::Book));
        if in_book {
            self.last_book_move = Some(record.move_number);
            return;
        }
        let past_book = record.move_number > self.last_book_move.unwrap_or_default();
        let left = Side::BOTH.iter().any(|side| {
            let mv = record.side(*side);
            mv.has_move() && !mv.assessment_is(Assessment::Best)
        });
        if past_book && left {
            self.departed = true;
        }
    }
}

pub struct HighlightDetector {
    registry: RuleRegistry,
    thresholds: CplThresholds,
    per_phase_limit: usize,
}

impl HighlightDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        let registry = RuleRegistry::from_config(config);
        info!(
            "Highlight detector ready: {} rules, {} enabled",
            registry.len(),
            registry.enabled().count()
        );
        Self {
            registry,
            thresholds: config.thresholds(),
            per_phase_limit: config.highlights_per_phase_limit,
        }
    }

    /// Detector over a custom registry
    pub fn with_registry(registry: RuleRegistry, config: &DetectorConfig) -> Self {
        Self {
            registry,
            thresholds: config.thresholds(),
            per_phase_limit: config.highlights_per_phase_limit,
        }
    }

    /// Detect and curate the highlights of one game
    pub fn detect(&self, moves: &[MoveRecord], phases: PhaseBounds) -> Vec<Highlight> {
        let run = self.run(moves, phases);
        let curated = curate(&run, phases, self.per_phase_limit);
        info!(
            "Detected {} raw highlights, kept {} ({} rule failures)",
            run.raw.len(),
            curated.len(),
            run.failures.len()
        );
        curated
    }

    /// Main pass only. Rule errors are logged and recorded, never propagated.
    pub fn run(&self, moves: &[MoveRecord], phases: PhaseBounds) -> DetectionRun {
        let positions = PositionCache::new(moves);
        let mut run = DetectionRun::default();
        let mut theory = TheoryState::default();
        let mut prev_white = SideCounts::STARTING;
        let mut prev_black = SideCounts::STARTING;

        for (index, record) in moves.iter().enumerate() {
            let ctx = EvaluationContext {
                moves,
                move_index: index,
                total_moves: moves.len(),
                phases,
                prev: index.checked_sub(1).and_then(|i| moves.get(i)),
                next: moves.get(index + 1),
                prev_white,
                prev_black,
                last_book_move: theory.last_book_move,
                theory_departed: theory.departed,
                thresholds: self.thresholds,
                positions: &positions,
            };

            for rule in self.registry.enabled() {
                match rule.evaluate(record, &ctx, &mut run.state) {
                    Ok(found) => run.raw.extend(found),
                    Err(e) => {
                        warn!(
                            rule = %rule.kind(),
                            move_number = record.move_number,
                            error = %e,
                            "Rule failed, skipping it for this move"
                        );
                        run.failures.push(RuleFailure {
                            move_number: record.move_number,
                            rule: rule.kind(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            theory.advance(record);
            prev_white = SideCounts::of(&record.white);
            if record.black.has_move() {
                prev_black = SideCounts::of(&record.black);
            }
        }

        debug!("Main pass produced {} raw highlights", run.raw.len());
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{half, pair};

    fn assessed(san: &str, assessment: Assessment) -> crate::model::SideMove {
        crate::model::SideMove {
            assessment: Some(assessment),
            ..half(san)
        }
    }

    #[test]
    fn test_theory_tracks_book_then_departure() {
        let mut theory = TheoryState::default();
        theory.advance(&pair(1, assessed("e4", Assessment::Book), assessed("e5", Assessment::Book)));
        assert_eq!(theory.last_book_move, Some(1));
        assert!(!theory.departed);

        theory.advance(&pair(2, assessed("Nf3", Assessment::Best), assessed("Nc6", Assessment::Best)));
        assert!(!theory.departed);

        theory.advance(&pair(3, assessed("Bc4", Assessment::Good), assessed("Bc5", Assessment::Best)));
        assert!(theory.departed);
    }

    #[test]
    fn test_theory_departure_reported_once() {
        let moves = vec![
            pair(1, assessed("e4", Assessment::Book), assessed("e5", Assessment::Book)),
            pair(2, assessed("Nf3", Assessment::Good), assessed("Nc6", Assessment::Best)),
            pair(3, assessed("Bc4", Assessment::Good), assessed("Bc5", Assessment::Inaccuracy)),
        ];
        let mut config = DetectorConfig::all_disabled();
        config.set_enabled(RuleKind::TheoryDeparture, true);
        let run = HighlightDetector::new(&config).run(&moves, PhaseBounds::new(10, 30));
        assert_eq!(run.raw.len(), 1);
        assert_eq!(run.raw[0].move_number, 2);
        assert_eq!(run.raw[0].side, Side::White);
    }

    #[test]
    fn test_empty_game() {
        let detector = HighlightDetector::new(&DetectorConfig::default());
        assert!(detector.detect(&[], PhaseBounds::new(10, 30)).is_empty());
    }
}
