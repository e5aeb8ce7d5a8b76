use semantic_annotator::{Bundle, Engine, Family, Limits, NullSink};
use serde_json::json;

fn engine_from(markers: serde_json::Value, promotion: Option<serde_json::Value>, weights: Option<serde_json::Value>) -> Engine {
    let bundle = Bundle::from_values(markers, promotion, weights);
    Engine::from_bundle(bundle, Limits::default(), Box::new(NullSink))
}

#[test]
fn single_atomic_hit_with_no_composed_markers() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]}
        ]}),
        None,
        None,
    );

    let result = engine.analyze("maybe it will work out.");
    assert_eq!(result.metadata.atomic_count, 1);
    assert_eq!(result.metadata.composed_count, 0);
    assert_eq!(result.annotations.len(), 1);
    assert_eq!(result.annotations[0].marker_id, "ATO_HEDGE");
    assert_eq!(result.annotations[0].family, Family::Ato);
}

#[test]
fn demotion_suppresses_an_otherwise_matching_atomic() {
    let engine = engine_from(
        json!({"markers": [
            {
                "id": "ATO_HEDGE", "kind": "atomic",
                "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}],
                "demote_if": [{"regex": "^maybe$", "flags": "i"}]
            }
        ]}),
        None,
        None,
    );

    let result = engine.analyze("maybe");
    assert!(result.annotations.is_empty());
    assert_eq!(result.metadata.atomic_count, 0);
}

#[test]
fn composition_fires_when_enough_children_activate() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]},
            {"id": "ATO_DENIAL", "kind": "atomic", "detects": [{"regex": "\\bno\\b", "flags": "i"}]},
            {
                "id": "SEM_AMBIVALENCE", "kind": "composed",
                "composed_of": [
                    {"marker_id": "ATO_HEDGE", "weight": 1.0},
                    {"marker_id": "ATO_DENIAL", "weight": 1.0}
                ],
                "activation": "ATO_HEDGE >= 1 and ATO_DENIAL >= 1",
                "min_children": 2,
                "min_score": 0.4
            }
        ]}),
        None,
        None,
    );

    let result = engine.analyze("maybe, no, I don't know.");
    assert_eq!(result.metadata.composed_count, 1);
    assert!(result.annotations.iter().any(|a| a.marker_id == "SEM_AMBIVALENCE"));
}

#[test]
fn composition_does_not_fire_below_min_children() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]},
            {
                "id": "SEM_AMBIVALENCE", "kind": "composed",
                "composed_of": [{"marker_id": "ATO_HEDGE", "weight": 1.0}],
                "activation": "ATO_HEDGE >= 1",
                "min_children": 2,
                "min_score": 0.0
            }
        ]}),
        None,
        None,
    );

    let result = engine.analyze("maybe it will happen.");
    assert_eq!(result.metadata.composed_count, 0);
    assert!(!result.annotations.iter().any(|a| a.marker_id == "SEM_AMBIVALENCE"));
}

#[test]
fn promotion_relabels_family_when_guard_and_threshold_pass() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]},
            {
                "id": "SEM_AMBIVALENCE", "kind": "composed",
                "composed_of": [{"marker_id": "ATO_HEDGE", "weight": 1.0}],
                "activation": "ATO_HEDGE >= 1",
                "min_children": 1,
                "min_score": 0.5,
                "scoring": {"weight": 0.9}
            }
        ]}),
        Some(json!({"promotions": [
            {"marker_id": "SEM_AMBIVALENCE", "activate_when": "SEM_AMBIVALENCE", "min_score": 0.5, "promote_to": "CLU"}
        ]})),
        None,
    );

    let result = engine.analyze("maybe it will happen.");
    let hit = result.annotations.iter().find(|a| a.marker_id == "SEM_AMBIVALENCE").unwrap();
    assert_eq!(hit.family, Family::Clu);
}

#[test]
fn overlap_resolution_prefers_higher_family_rank_then_score_then_marker_id() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_WORD", "kind": "atomic", "detects": [{"regex": "trouble", "flags": "i"}], "scoring": {"weight": 0.9}},
            {"id": "SEM_WORD", "kind": "atomic", "detects": [{"regex": "trou", "flags": "i"}], "scoring": {"weight": 0.2}}
        ]}),
        None,
        None,
    );

    let result = engine.analyze("trouble ahead");
    assert_eq!(result.annotations.len(), 1);
    assert_eq!(result.annotations[0].marker_id, "SEM_WORD");
}

#[test]
fn annotations_are_sorted_non_overlapping_and_in_range() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_A", "kind": "atomic", "detects": [{"regex": "alpha", "flags": "i"}]},
            {"id": "ATO_B", "kind": "atomic", "detects": [{"regex": "beta", "flags": "i"}]}
        ]}),
        None,
        None,
    );

    let text = "alpha comes before beta in this sentence.";
    let result = engine.analyze(text);
    let len = text.chars().count();

    for a in &result.annotations {
        assert!(a.start < a.end);
        assert!(a.end <= len);
    }
    for w in result.annotations.windows(2) {
        assert!(w[0].start <= w[1].start);
        assert!(w[0].end <= w[1].start);
    }
}

#[test]
fn analyze_is_pure_and_repeatable() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]}
        ]}),
        None,
        None,
    );

    let text = "maybe this, maybe that, maybe neither.";
    let first = engine.analyze(text);
    let second = engine.analyze(text);
    assert_eq!(first, second);
}

#[test]
fn composed_span_always_contains_its_contributing_atomic_hits() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}]},
            {
                "id": "SEM_AMBIVALENCE", "kind": "composed",
                "composed_of": [{"marker_id": "ATO_HEDGE", "weight": 1.0}],
                "activation": "ATO_HEDGE >= 1",
                "min_children": 1,
                "min_score": 0.0,
                "span_policy": {"mode": "anchor_window", "window_tokens": [-2, 2]}
            }
        ]}),
        None,
        None,
    );

    let text = "well, maybe, who knows really.";
    let result = engine.analyze(text);
    let atomic = result.annotations.iter().find(|a| a.marker_id == "ATO_HEDGE");
    let composed = result.annotations.iter().find(|a| a.marker_id == "SEM_AMBIVALENCE");

    if let (Some(atomic), Some(composed)) = (atomic, composed) {
        assert!(composed.start <= atomic.start);
        assert!(composed.end >= atomic.end);
    }
}

#[test]
fn every_annotation_score_is_within_unit_range() {
    let engine = engine_from(
        json!({"markers": [
            {"id": "ATO_HEDGE", "kind": "atomic", "detects": [{"regex": "\\bmaybe\\b", "flags": "i"}], "scoring": {"weight": 0.7}}
        ]}),
        None,
        None,
    );

    let result = engine.analyze("maybe, maybe, maybe.");
    for a in &result.annotations {
        assert!(a.score >= 0.0 && a.score <= 1.0);
    }
}

#[test]
fn missing_bundle_files_yield_an_engine_that_detects_nothing() {
    let engine = Engine::from_dir("/nonexistent/bundle/dir/for/sure").unwrap();
    let result = engine.analyze("any text at all");
    assert!(result.annotations.is_empty());
    assert_eq!(result.metadata.atomic_count, 0);
}
