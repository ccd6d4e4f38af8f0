//! Post-processing: turn the raw output of a main pass into the final,
//! phase-capped and ordered highlight list.
//!
//! Every step is a pure function over vectors and ordered sets, so the
//! same run always curates to the same list.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::detector::DetectionRun;
use crate::highlight::{Highlight, RuleKind};
use crate::model::{Phase, PhaseBounds, Side};
use crate::state::MoveRange;

/// Priority taken off a pattern already shown in an earlier phase
pub const REPETITION_PENALTY: i32 = 8;
/// Buckets at or below this size are never penalized
pub const PENALTY_MIN_BUCKET: usize = 7;
/// Highlights merged into one sentence per (move, side)
pub const MAX_COMBINED: usize = 2;

/// Run the whole post-processing pipeline
pub fn curate(run: &DetectionRun, phases: PhaseBounds, limit: usize) -> Vec<Highlight> {
    let mut ranges: Vec<MoveRange> = run.raw.iter().filter_map(MoveRange::from_highlight).collect();
    ranges.extend(run.state.declared_ranges());

    let mut highlights = suppress_inside_ranges(run.raw.clone(), &ranges);
    highlights = suppress_superseded_misses(highlights, &ranges);
    highlights.extend(run.state.eval_swing.highlights());

    let mut seen: BTreeSet<(Side, String)> = BTreeSet::new();
    let mut curated = Vec::new();
    for (phase, mut bucket) in bucket_by_phase(highlights, phases) {
        sort_by_priority(&mut bucket);
        if bucket.len() > PENALTY_MIN_BUCKET {
            penalize_repeats(&mut bucket, &seen);
            sort_by_priority(&mut bucket);
        }
        let bucket = combine_same_move(dedup_rule_types(bucket));
        seen.extend(bucket.iter().map(|h| (h.side, h.pattern().to_string())));

        debug!("{:?}: {} highlights before the cap of {}", phase, bucket.len(), limit);
        curated.extend(bucket.into_iter().take(limit));
    }

    sort_for_display(&mut curated);
    curated
}

/// Drop highlights of another rule type that sit strictly inside a range
/// declared for the same side. A ranged highlight also goes when its own
/// span overlaps such a range, unless both start on the same move.
pub fn suppress_inside_ranges(highlights: Vec<Highlight>, ranges: &[MoveRange]) -> Vec<Highlight> {
    highlights
        .into_iter()
        .filter(|h| {
            !ranges.iter().any(|r| {
                if r.side != h.side || r.rule_type == h.rule_type {
                    return false;
                }
                r.contains_strictly(h.move_number)
                    || h
                        .move_number_end
                        .is_some_and(|end| r.overlaps(h.move_number, end))
            })
        })
        .collect()
}

/// Individual missed mates are covered by a delayed-mating range that
/// starts at or before them.
pub fn suppress_superseded_misses(highlights: Vec<Highlight>, ranges: &[MoveRange]) -> Vec<Highlight> {
    highlights
        .into_iter()
        .filter(|h| {
            h.rule_type != RuleKind::MissedMate
                || !ranges.iter().any(|r| {
                    r.rule_type == RuleKind::DelayedMating
                        && r.side == h.side
                        && h.move_number >= r.first
                })
        })
        .collect()
}

/// Split by game phase, in opening, middlegame, endgame order
pub fn bucket_by_phase(
    highlights: Vec<Highlight>,
    phases: PhaseBounds,
) -> Vec<(Phase, Vec<Highlight>)> {
    let mut buckets: BTreeMap<Phase, Vec<Highlight>> =
        Phase::ALL.into_iter().map(|p| (p, Vec::new())).collect();
    for h in highlights {
        buckets.entry(phases.phase_of(h.move_number)).or_default().push(h);
    }
    buckets.into_iter().collect()
}

/// Priority descending, then move ascending. Stable for equal keys.
pub fn sort_by_priority(bucket: &mut [Highlight]) {
    bucket.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.move_number.cmp(&b.move_number))
    });
}

pub fn penalize_repeats(bucket: &mut [Highlight], seen: &BTreeSet<(Side, String)>) {
    for h in bucket.iter_mut() {
        if seen.contains(&(h.side, h.pattern().to_string())) {
            h.priority -= REPETITION_PENALTY;
        }
    }
}

/// Keep the first (highest-priority) highlight per (side, rule type)
pub fn dedup_rule_types(bucket: Vec<Highlight>) -> Vec<Highlight> {
    let mut kept = BTreeSet::new();
    bucket
        .into_iter()
        .filter(|h| kept.insert((h.side, h.rule_type)))
        .collect()
}

/// Merge up to two highlights on the same (move, side) into one sentence.
/// The merged highlight keeps the leader's priority and rule type.
pub fn combine_same_move(bucket: Vec<Highlight>) -> Vec<Highlight> {
    let mut order: Vec<(u32, Side)> = Vec::new();
    let mut groups: BTreeMap<(u32, Side), Vec<Highlight>> = BTreeMap::new();
    for h in bucket {
        let key = (h.move_number, h.side);
        let group = groups.entry(key).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(h);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let mut group = groups.remove(&key)?.into_iter().take(MAX_COMBINED);
            let mut leader = group.next()?;
            for other in group {
                leader.description = format!("{}. {}", leader.description, other.description);
            }
            Some(leader)
        })
        .collect()
}

/// Move ascending, White before Black
pub fn sort_for_display(highlights: &mut [Highlight]) {
    highlights.sort_by_key(|h| (h.move_number, h.side));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MoveRecord;

    fn at(move_number: u32, side: Side, kind: RuleKind, priority: i32, description: &str) -> Highlight {
        let record = MoveRecord {
            move_number,
            ..Default::default()
        };
        Highlight::new(&record, side, kind, priority, description)
    }

    #[test]
    fn test_range_suppresses_other_rules_only() {
        let windmill = Highlight::ranged(20, 22, Side::White, RuleKind::Windmill, 47, "W");
        let ranges = vec![MoveRange::from_highlight(&windmill).unwrap()];
        let kept = suppress_inside_ranges(
            vec![
                windmill.clone(),
                at(20, Side::White, RuleKind::Fork, 41, "start is outside"),
                at(21, Side::White, RuleKind::Fork, 41, "inside"),
                at(22, Side::Black, RuleKind::Pin, 38, "other side"),
            ],
            &ranges,
        );
        let descriptions: Vec<&str> = kept.iter().map(|h| h.description.as_str()).collect();
        assert_eq!(descriptions, vec!["W", "start is outside", "other side"]);
    }

    #[test]
    fn test_overlapping_ranges_of_other_rules_go() {
        let windmill = Highlight::ranged(20, 22, Side::White, RuleKind::Windmill, 47, "W");
        let ranges = vec![MoveRange::from_highlight(&windmill).unwrap()];
        let kept = suppress_inside_ranges(
            vec![
                windmill.clone(),
                Highlight::ranged(18, 21, Side::White, RuleKind::PerpetualCheck, 45, "tail inside"),
                Highlight::ranged(17, 25, Side::White, RuleKind::TacticalSequence, 45, "covers it"),
                Highlight::ranged(20, 24, Side::White, RuleKind::PawnStorm, 45, "same start"),
                Highlight::ranged(23, 26, Side::White, RuleKind::DefensiveFortress, 45, "after"),
                Highlight::ranged(18, 21, Side::Black, RuleKind::PerpetualCheck, 45, "black"),
            ],
            &ranges,
        );
        let descriptions: Vec<&str> = kept.iter().map(|h| h.description.as_str()).collect();
        assert_eq!(descriptions, vec!["W", "same start", "after", "black"]);
    }

    #[test]
    fn test_missed_mates_after_delayed_mating_go() {
        let range = MoveRange {
            side: Side::Black,
            first: 30,
            last: 31,
            rule_type: RuleKind::DelayedMating,
        };
        let kept = suppress_superseded_misses(
            vec![
                at(29, Side::Black, RuleKind::MissedMate, 50, "before"),
                at(30, Side::Black, RuleKind::MissedMate, 50, "first"),
                at(35, Side::Black, RuleKind::MissedMate, 50, "later"),
                at(35, Side::White, RuleKind::MissedMate, 50, "white"),
            ],
            &[range],
        );
        let descriptions: Vec<&str> = kept.iter().map(|h| h.description.as_str()).collect();
        assert_eq!(descriptions, vec!["before", "white"]);
    }

    #[test]
    fn test_dedup_keeps_highest_priority() {
        let mut bucket = vec![
            at(12, Side::White, RuleKind::Fork, 35, "low"),
            at(14, Side::White, RuleKind::Fork, 41, "high"),
            at(14, Side::Black, RuleKind::Fork, 41, "black"),
        ];
        sort_by_priority(&mut bucket);
        let kept = dedup_rule_types(bucket);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].description, "high");
        assert_eq!(kept[1].side, Side::Black);
    }

    #[test]
    fn test_combine_joins_two_of_three() {
        let merged = combine_same_move(vec![
            at(18, Side::White, RuleKind::Fork, 41, "White forked the king and rook"),
            at(18, Side::White, RuleKind::TempoGain, 32, "White gained a tempo"),
            at(18, Side::White, RuleKind::Centralization, 15, "White centralized the knight"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].description,
            "White forked the king and rook. White gained a tempo"
        );
        assert_eq!(merged[0].rule_type, RuleKind::Fork);
        assert_eq!(merged[0].priority, 41);
    }

    #[test]
    fn test_penalty_only_hits_seen_patterns() {
        let mut bucket = vec![
            at(15, Side::White, RuleKind::Fork, 40, "White forked the king and rook"),
            at(16, Side::White, RuleKind::Pin, 40, "White pinned the knight"),
        ];
        let seen = BTreeSet::from([(Side::White, "White forked the king and rook".to_string())]);
        penalize_repeats(&mut bucket, &seen);
        sort_by_priority(&mut bucket);
        assert_eq!(bucket[0].rule_type, RuleKind::Pin);
        assert_eq!(bucket[1].priority, 40 - REPETITION_PENALTY);
    }

    #[test]
    fn test_display_order() {
        let mut list = vec![
            at(9, Side::Black, RuleKind::Fork, 10, "a"),
            at(9, Side::White, RuleKind::Fork, 10, "b"),
            at(3, Side::Black, RuleKind::Fork, 10, "c"),
        ];
        sort_for_display(&mut list);
        let order: Vec<(u32, Side)> = list.iter().map(|h| (h.move_number, h.side)).collect();
        assert_eq!(order, vec![(3, Side::Black), (9, Side::White), (9, Side::Black)]);
    }

    #[test]
    fn test_curate_caps_each_phase() {
        let raw = (1..=12)
            .map(|n| at(n, Side::White, RuleKind::Novelty, 15, "novelty"))
            .chain((1..=12).map(|n| at(n, Side::Black, RuleKind::Castling, 15, "castled")))
            .collect();
        let run = DetectionRun {
            raw,
            ..Default::default()
        };
        let curated = curate(&run, PhaseBounds::new(12, 30), 1);
        assert_eq!(curated.len(), 1);
    }
}
