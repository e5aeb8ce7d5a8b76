//! Atomic detector: runs every atomic marker's compiled patterns over the
//! text and produces the surviving, demote-checked hits.

use std::collections::HashSet;

use fancy_regex::Regex;
use indexmap::IndexMap;

use crate::bundle::Bundle;
use crate::offsets::CodepointIndex;
use crate::pattern::CompiledAtomic;
use crate::sink::WarningSink;
use crate::types::Family;

/// One atomic hit before sentence-window composition or overlap
/// resolution has run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AtomicHit {
    pub start: usize,
    pub end: usize,
    pub marker_id: String,
    pub family: Family,
    pub score: f64,
    pub label: String,
}

/// Iterate a regex's non-overlapping matches over `text`, in byte offsets,
/// dropping zero-width matches and any single match that trips the
/// backtrack limit (treated as "no further matches" rather than
/// propagated — a detector that fails is just a detector with zero hits).
fn iter_matches<'a>(re: &'a Regex, text: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    re.find_iter(text).filter_map(|r| r.ok()).filter_map(|m| {
        if m.end() > m.start() {
            Some((m.start(), m.end()))
        } else {
            None
        }
    })
}

/// Demote test: drop the match if a demote pattern fullmatches
/// `text[s:e]` exactly, or if a demote pattern's match anywhere in `text`
/// overlaps `[s, e)`.
fn should_demote(text: &str, start: usize, end: usize, demotes: &[Regex]) -> bool {
    let slice = &text[start..end];

    for d in demotes {
        if let Ok(Some(caps)) = d.captures(slice) {
            if let Some(whole) = caps.get(0) {
                if whole.start() == 0 && whole.end() == slice.len() {
                    return true;
                }
            }
        }
    }

    for d in demotes {
        for (ds, de) in iter_matches(d, text) {
            if !(de <= start || ds >= end) {
                return true;
            }
        }
    }

    false
}

/// Run every atomic marker's compiled patterns over `text` and return the
/// surviving hits, deduplicated on `(start, end, marker_id)` and sorted by
/// `(start asc, end desc)`.
pub(crate) fn detect_atomics(
    text: &str,
    offsets: &CodepointIndex,
    compiled: &IndexMap<String, CompiledAtomic>,
    bundle: &Bundle,
    sink: &dyn WarningSink,
) -> Vec<AtomicHit> {
    let mut hits = Vec::new();
    let mut seen: HashSet<(usize, usize, String)> = HashSet::new();

    for (marker_id, atomic) in compiled {
        let Some(marker) = bundle.marker(marker_id) else { continue };

        for detect in atomic.candidate_detects(text) {
            for (bs, be) in iter_matches(&detect.regex, text) {
                if should_demote(text, bs, be, &atomic.demotes) {
                    continue;
                }

                let cs = offsets.byte_to_char(bs);
                let ce = offsets.byte_to_char(be);
                if cs >= ce || ce > offsets.char_len() {
                    sink.input_range_violation(marker_id, cs, ce, offsets.char_len());
                    continue;
                }

                let key = (cs, ce, marker_id.clone());
                if !seen.insert(key) {
                    continue;
                }

                let base = marker.declared_score.unwrap_or(0.7);
                let score = if detect.penalty { (base - 0.1).max(0.4) } else { base };

                hits.push(AtomicHit {
                    start: cs,
                    end: ce,
                    marker_id: marker_id.clone(),
                    family: marker.family,
                    score,
                    label: marker.label.clone(),
                });
            }
        }
    }

    hits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use crate::config::Limits;
    use crate::pattern::compile_bundle;
    use crate::sink::NullSink;
    use serde_json::json;

    fn compiled_for(markers: serde_json::Value) -> (Bundle, IndexMap<String, CompiledAtomic>) {
        let bundle = Bundle::from_values(markers, None, None);
        let compiled = compile_bundle(&bundle, &Limits::default(), &NullSink);
        (bundle, compiled)
    }

    #[test]
    fn single_atomic_hit() {
        let (bundle, compiled) = compiled_for(json!({"markers": [
            {"id": "ATO_HELLO", "kind": "atomic", "detects": [{"regex": "\\bhello\\b", "flags": "i"}]}
        ]}));
        let text = "say Hello world";
        let offsets = CodepointIndex::build(text);
        let hits = detect_atomics(text, &offsets, &compiled, &bundle, &NullSink);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].start, hits[0].end), (4, 9));
        assert_eq!(hits[0].score, 0.7);
    }

    #[test]
    fn demotion_kills_match_on_fullmatch() {
        let (bundle, compiled) = compiled_for(json!({"markers": [
            {
                "id": "ATO_HELLO", "kind": "atomic",
                "detects": [{"regex": "\\bhello\\b", "flags": "i"}],
                "demote_if": [{"regex": "^Hello$"}]
            }
        ]}));
        let text = "Hello";
        let offsets = CodepointIndex::build(text);
        let hits = detect_atomics(text, &offsets, &compiled, &bundle, &NullSink);
        assert!(hits.is_empty());
    }

    #[test]
    fn demotion_kills_overlapping_match() {
        let (bundle, compiled) = compiled_for(json!({"markers": [
            {
                "id": "ATO_HELLO", "kind": "atomic",
                "detects": [{"regex": "\\bhello\\b", "flags": "i"}],
                "demote_if": [{"regex": "say hello", "flags": "i"}]
            }
        ]}));
        let text = "say hello world";
        let offsets = CodepointIndex::build(text);
        let hits = detect_atomics(text, &offsets, &compiled, &bundle, &NullSink);
        assert!(hits.is_empty());
    }

    #[test]
    fn dedup_on_start_end_marker() {
        let (bundle, compiled) = compiled_for(json!({"markers": [
            {"id": "ATO_HELLO", "kind": "atomic", "detects": [
                {"regex": "hello", "flags": "i"},
                {"regex": "hel{2}o", "flags": "i"}
            ]}
        ]}));
        let text = "hello";
        let offsets = CodepointIndex::build(text);
        let hits = detect_atomics(text, &offsets, &compiled, &bundle, &NullSink);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn literal_penalty_scoring() {
        let (bundle, compiled) = compiled_for(json!({"markers": [
            {"id": "ATO_SIGNAL", "kind": "atomic", "frame": {"signal": ["worrisome"]}}
        ]}));
        let text = "this is worrisome indeed";
        let offsets = CodepointIndex::build(text);
        let hits = detect_atomics(text, &offsets, &compiled, &bundle, &NullSink);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.6);
    }
}
