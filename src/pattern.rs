//! Pattern compiler.
//!
//! Turns each atomic marker's `detects`/`demote_if` pattern strings into
//! executable `fancy_regex::Regex`es, plus an Aho-Corasick pre-filter:
//! patterns with an extractable literal are only tried when that literal
//! appears in the text; patterns without one are "always candidates" and
//! run unconditionally.

use std::collections::HashMap;

use aho_corasick::AhoCorasick;
use fancy_regex::{Regex, RegexBuilder};
use indexmap::IndexMap;
use rayon::prelude::*;

#[cfg(test)]
use crate::bundle::RawPattern;
use crate::bundle::{Bundle, MarkerKind};
use crate::config::Limits;
use crate::literal::extract_literals;
use crate::sink::WarningSink;

/// One compiled detect pattern plus whether it came from the literal-
/// fallback policy (literal-fallback hits are penalized in scoring).
pub(crate) struct CompiledDetect {
    pub regex: Regex,
    pub penalty: bool,
}

/// The compiled form of one atomic marker.
pub(crate) struct CompiledAtomic {
    /// Detect patterns with no extractable literal: tried on every text.
    always: Vec<CompiledDetect>,
    /// Detect patterns with an extractable literal: tried only if the
    /// pre-filter AC reports a hit for (one of) their literals.
    gated: Vec<CompiledDetect>,
    /// Pre-filter over `gated`'s literals; `None` if `gated` is empty.
    ac: Option<AhoCorasick>,
    /// AC pattern index → index into `gated`.
    ac_to_gated: Vec<usize>,
    pub demotes: Vec<Regex>,
}

impl CompiledAtomic {
    /// All detect patterns that should be tried against `text`, in the
    /// fixed declaration order (always-candidates first, then any gated
    /// pattern whose literal was found). Duplicates are not produced: each
    /// gated pattern appears at most once even if several of its literals
    /// hit.
    pub fn candidate_detects(&self, text: &str) -> Vec<&CompiledDetect> {
        let mut out: Vec<&CompiledDetect> = self.always.iter().collect();

        if let Some(ac) = &self.ac {
            let mut seen = vec![false; self.gated.len()];
            for m in ac.find_overlapping_iter(text) {
                let gated_idx = self.ac_to_gated[m.pattern().as_usize()];
                if !seen[gated_idx] {
                    seen[gated_idx] = true;
                    out.push(&self.gated[gated_idx]);
                }
            }
        }

        out
    }
}

/// Build a regex source with inline flag groups from a marker's flag
/// string (`i`/`m`/`s` map to case-insensitive/multiline/dotall; any other
/// character is ignored).
fn flagged_pattern(pattern: &str, flags: &str) -> String {
    let mut group = String::new();
    for c in flags.chars() {
        match c.to_ascii_lowercase() {
            'i' if !group.contains('i') => group.push('i'),
            'm' if !group.contains('m') => group.push('m'),
            's' if !group.contains('s') => group.push('s'),
            _ => {}
        }
    }
    if group.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", group, pattern)
    }
}

fn compile_one(pattern: &str, flags: &str, limits: &Limits) -> Result<Regex, fancy_regex::Error> {
    RegexBuilder::new(&flagged_pattern(pattern, flags))
        .backtrack_limit(limits.regex_backtrack_limit)
        .build()
}

/// Escape regex metacharacters in a literal fallback term before wrapping
/// it in `\b...\b`.
fn escape_literal(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build the AC pre-filter index from each gated detect's literal set,
/// deduplicating identical literals across detects.
fn build_ac_index(gated_literals: &[Vec<String>]) -> (Option<AhoCorasick>, Vec<usize>) {
    if gated_literals.iter().all(Vec::is_empty) {
        return (None, Vec::new());
    }

    let mut ac_patterns: Vec<String> = Vec::new();
    let mut ac_to_gated: Vec<usize> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (gated_idx, literals) in gated_literals.iter().enumerate() {
        for lit in literals {
            if !seen.contains_key(lit) {
                seen.insert(lit.clone(), ac_patterns.len());
                ac_patterns.push(lit.clone());
                ac_to_gated.push(gated_idx);
            }
        }
    }

    let ac = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&ac_patterns)
        .ok();
    (ac, ac_to_gated)
}

/// Compile one atomic marker's `detects` (plus literal-fallback detects
/// derived from `literal_terms`) and `demote_if` patterns.
fn compile_atomic(marker: &crate::bundle::Marker, limits: &Limits, sink: &dyn WarningSink) -> CompiledAtomic {
    let mut always = Vec::new();
    let mut gated: Vec<CompiledDetect> = Vec::new();
    let mut gated_literals: Vec<Vec<String>> = Vec::new();

    for p in &marker.detects {
        match compile_one(&p.regex, &p.flags, limits) {
            Ok(regex) => {
                let literals = extract_literals(&p.regex, limits.literal_min_len);
                if literals.is_empty() {
                    always.push(CompiledDetect { regex, penalty: false });
                } else {
                    gated.push(CompiledDetect { regex, penalty: false });
                    gated_literals.push(literals);
                }
            }
            Err(e) => sink.pattern_compile_warning(&marker.id, &p.regex, &e.to_string()),
        }
    }

    for term in &marker.literal_terms {
        let pattern = format!(r"\b{}\b", escape_literal(term));
        match compile_one(&pattern, "i", limits) {
            Ok(regex) => {
                gated.push(CompiledDetect { regex, penalty: true });
                gated_literals.push(vec![term.to_lowercase()]);
            }
            Err(e) => sink.pattern_compile_warning(&marker.id, &pattern, &e.to_string()),
        }
    }

    let (ac, ac_to_gated) = build_ac_index(&gated_literals);

    let mut demotes = Vec::new();
    for p in &marker.demote_if {
        match compile_one(&p.regex, &p.flags, limits) {
            Ok(regex) => demotes.push(regex),
            Err(e) => sink.pattern_compile_warning(&marker.id, &p.regex, &e.to_string()),
        }
    }

    CompiledAtomic { always, gated, ac, ac_to_gated, demotes }
}

/// Compile every atomic marker in `bundle` into an id-indexed map. Markers
/// with zero surviving detect patterns (all failed to compile) still get
/// an entry — they simply never match anything, a detector that fails to
/// compile is just a detector with zero hits for that marker.
///
/// Per-marker compilation is independent, so it runs across all available
/// cores via rayon.
pub(crate) fn compile_bundle(
    bundle: &Bundle,
    limits: &Limits,
    sink: &dyn WarningSink,
) -> IndexMap<String, CompiledAtomic> {
    let markers: Vec<&crate::bundle::Marker> = bundle
        .atomics
        .iter()
        .filter_map(|id| bundle.marker(id))
        .filter(|m| m.kind == MarkerKind::Atomic)
        .collect();

    markers
        .into_par_iter()
        .map(|m| (m.id.clone(), compile_atomic(m, limits, sink)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Marker;
    use crate::sink::NullSink;
    use crate::types::Family;

    fn atomic_marker(id: &str, detects: Vec<RawPattern>, demotes: Vec<RawPattern>) -> Marker {
        Marker {
            id: id.to_string(),
            family: Family::from_marker_id(id),
            kind: MarkerKind::Atomic,
            label: id.to_string(),
            detects,
            demote_if: demotes,
            literal_terms: Vec::new(),
            declared_score: None,
            composed_of: Vec::new(),
            activation: String::new(),
            span_policy: Default::default(),
            max_sentence_span: 1,
            min_children: None,
            min_score: None,
        }
    }

    #[test]
    fn compiles_simple_pattern() {
        let m = atomic_marker(
            "ATO_HELLO",
            vec![RawPattern { regex: r"\bhello\b".into(), flags: "i".into() }],
            vec![],
        );
        let compiled = compile_atomic(&m, &Limits::default(), &NullSink);
        assert_eq!(compiled.candidate_detects("say Hello world").len(), 1);
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let m = atomic_marker(
            "ATO_BAD",
            vec![
                RawPattern { regex: "(unterminated".into(), flags: String::new() },
                RawPattern { regex: r"ok".into(), flags: String::new() },
            ],
            vec![],
        );
        let compiled = compile_atomic(&m, &Limits::default(), &NullSink);
        assert_eq!(compiled.candidate_detects("this is ok").len(), 1);
    }

    #[test]
    fn literal_fallback_adds_penalized_detect() {
        let mut m = atomic_marker("ATO_SIGNAL", vec![], vec![]);
        m.literal_terms = vec!["enoughlength".to_string()];
        let compiled = compile_atomic(&m, &Limits::default(), &NullSink);
        let hits = compiled.candidate_detects("we have enoughlength here");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].penalty);
    }
}
