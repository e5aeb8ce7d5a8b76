//! Overlap resolver: picks a non-overlapping subset of candidate
//! annotations, breaking ties deterministically by
//! `(family_rank, score desc, length desc, marker_id)`.

use std::cmp::Ordering;

use crate::types::{annotation_order, Annotation};

/// Priority ordering for overlap resolution: lower family rank wins, then
/// higher score, then longer span, then lexicographically smaller marker
/// id. NaN scores (never produced by this crate's own
/// scoring, but not ruled out for author-supplied `declared_score`) sort
/// as lowest priority rather than panicking.
fn cmp_priority(a: &Annotation, b: &Annotation) -> Ordering {
    a.family
        .rank()
        .cmp(&b.family.rank())
        .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then_with(|| b.span().len().cmp(&a.span().len()))
        .then_with(|| a.marker_id.cmp(&b.marker_id))
}

/// Greedily accept candidates in priority order, skipping any candidate
/// whose span overlaps an already-accepted one; result is re-sorted by
/// `(start, end, marker_id)` for deterministic, idempotent output.
pub(crate) fn resolve_overlaps(mut candidates: Vec<Annotation>) -> Vec<Annotation> {
    candidates.sort_by(cmp_priority);

    let mut accepted: Vec<Annotation> = Vec::new();
    for candidate in candidates {
        let span = candidate.span();
        if accepted.iter().any(|a| a.span().overlaps(&span)) {
            continue;
        }
        accepted.push(candidate);
    }

    accepted.sort_by(annotation_order);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Family;

    fn ann(start: usize, end: usize, marker_id: &str, family: Family, score: f64) -> Annotation {
        Annotation { start, end, marker_id: marker_id.to_string(), family, score, label: marker_id.to_string() }
    }

    #[test]
    fn non_overlapping_candidates_all_survive() {
        let out = resolve_overlaps(vec![
            ann(0, 3, "A", Family::Ato, 0.5),
            ann(5, 8, "B", Family::Ato, 0.5),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn family_rank_breaks_overlap_tie() {
        let out = resolve_overlaps(vec![
            ann(0, 5, "ATO_X", Family::Ato, 0.9),
            ann(1, 4, "SEM_Y", Family::Sem, 0.1),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marker_id, "SEM_Y");
    }

    #[test]
    fn score_breaks_tie_within_same_family() {
        let out = resolve_overlaps(vec![
            ann(0, 5, "ATO_LOW", Family::Ato, 0.3),
            ann(1, 4, "ATO_HIGH", Family::Ato, 0.9),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marker_id, "ATO_HIGH");
    }

    #[test]
    fn length_breaks_tie_when_family_and_score_equal() {
        let out = resolve_overlaps(vec![
            ann(0, 3, "ATO_SHORT", Family::Ato, 0.5),
            ann(0, 6, "ATO_LONG", Family::Ato, 0.5),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marker_id, "ATO_LONG");
    }

    #[test]
    fn marker_id_breaks_final_tie() {
        let out = resolve_overlaps(vec![
            ann(0, 5, "ATO_B", Family::Ato, 0.5),
            ann(0, 5, "ATO_A", Family::Ato, 0.5),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].marker_id, "ATO_A");
    }

    #[test]
    fn output_is_sorted_by_start() {
        let out = resolve_overlaps(vec![
            ann(10, 12, "B", Family::Ato, 0.5),
            ann(0, 2, "A", Family::Ato, 0.5),
        ]);
        assert_eq!(out[0].marker_id, "A");
        assert_eq!(out[1].marker_id, "B");
    }

    #[test]
    fn idempotent_under_reapplication() {
        let once = resolve_overlaps(vec![
            ann(0, 5, "ATO_X", Family::Ato, 0.9),
            ann(1, 4, "SEM_Y", Family::Sem, 0.1),
            ann(6, 9, "ATO_Z", Family::Ato, 0.2),
        ]);
        let twice = resolve_overlaps(once.clone());
        assert_eq!(once, twice);
    }
}
