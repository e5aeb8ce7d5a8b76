//! Composer: walks a sliding sentence-count window per composed marker,
//! evaluates its activation expression against the window's child counts,
//! and assigns the first firing window a span per the marker's span
//! policy, then moves on to the next starting sentence.

use std::collections::HashMap;

use crate::bundle::{Bundle, MarkerKind, SpanPolicy};
use crate::detect::AtomicHit;
use crate::expr::Activation;
use crate::sink::WarningSink;
use crate::types::{Family, Span};

#[derive(Debug, Clone)]
pub(crate) struct ComposedHit {
    pub start: usize,
    pub end: usize,
    pub marker_id: String,
    pub family: Family,
    pub score: f64,
    pub label: String,
}

fn midpoint(hit: &AtomicHit) -> usize {
    (hit.start + hit.end) / 2
}

/// Sentence index containing `pos`, under half-open `[start, end)`
/// containment except at a boundary shared by two sentences, which
/// belongs to the left one.
fn sentence_of_midpoint(sentences: &[Span], pos: usize) -> Option<usize> {
    sentences.iter().position(|s| pos <= s.end)
}

fn token_covering_or_after(tokens: &[Span], pos: usize) -> usize {
    tokens.partition_point(|t| t.end <= pos)
}

/// Apply an `anchor_window` span policy: expand `[min_start, max_end)` by
/// `window_tokens` tokens on each side, then clamp so the result still
/// contains the original range (a composed span must contain every span
/// it was built from).
fn anchor_window_span(tokens: &[Span], min_start: usize, max_end: usize, window_tokens: (i64, i64), text_char_len: usize) -> Span {
    if tokens.is_empty() {
        return Span::new(min_start, max_end);
    }

    let anchor_start_tok = token_covering_or_after(tokens, min_start).min(tokens.len() - 1);
    let anchor_end_tok = token_covering_or_after(tokens, max_end.saturating_sub(1)).min(tokens.len() - 1);

    let new_start_tok = (anchor_start_tok as i64 + window_tokens.0).clamp(0, tokens.len() as i64 - 1) as usize;
    let new_end_tok = (anchor_end_tok as i64 + window_tokens.1).clamp(0, tokens.len() as i64 - 1) as usize;

    let start = tokens[new_start_tok].start.min(min_start);
    let end = tokens[new_end_tok].end.max(max_end).min(text_char_len);
    Span::new(start, end)
}

/// Apply a `sentence_union` span policy: union of the sentences spanned by
/// `[min_start, max_end)`, extended up to `max_sentence_span` sentences,
/// falling back to `anchor_window` when the text has only a single
/// sentence and the fallback is requested.
fn sentence_union_span(
    sentences: &[Span],
    min_start: usize,
    max_end: usize,
    max_sentence_span: usize,
    fallback: crate::bundle::SentenceFallback,
    tokens: &[Span],
    text_char_len: usize,
) -> Span {
    let first = sentences.iter().position(|s| s.contains(min_start) || s.start >= min_start);
    let last = sentences.iter().rposition(|s| s.contains(max_end.saturating_sub(1)) || s.end <= max_end);

    match (first, last) {
        (Some(f), Some(l)) if f <= l => {
            let l = l.min(f + max_sentence_span.saturating_sub(1));
            Span::new(sentences[f].start, sentences[l.max(f)].end.max(max_end))
        }
        _ => match fallback {
            crate::bundle::SentenceFallback::AnchorWindow => {
                anchor_window_span(tokens, min_start, max_end, (-8, 8), text_char_len)
            }
            crate::bundle::SentenceFallback::None => Span::new(min_start, max_end),
        },
    }
}

/// Bucket atomic hits by the sentence containing their midpoint; hits
/// whose midpoint falls after the last sentence (shouldn't happen for
/// well-formed offsets) are dropped.
fn bucket_by_sentence<'a>(sentences: &[Span], atomics: &'a [AtomicHit]) -> Vec<Vec<&'a AtomicHit>> {
    let mut buckets: Vec<Vec<&AtomicHit>> = vec![Vec::new(); sentences.len()];
    for hit in atomics {
        if let Some(idx) = sentence_of_midpoint(sentences, midpoint(hit)) {
            buckets[idx].push(hit);
        }
    }
    buckets
}

/// Per-child hit counts for the window of sentences `[i0, last]`, keyed by
/// declared child marker id (children with zero hits still get a `0.0`
/// entry), plus `total_children`, the sum of all counts.
fn window_counts(child_ids: &[&str], buckets: &[Vec<&AtomicHit>], i0: usize, last: usize) -> (HashMap<String, f64>, f64) {
    let mut counts: HashMap<String, f64> = child_ids.iter().map(|id| (id.to_string(), 0.0)).collect();
    for bucket in &buckets[i0..=last] {
        for hit in bucket {
            if let Some(c) = counts.get_mut(hit.marker_id.as_str()) {
                *c += 1.0;
            }
        }
    }
    let total: f64 = counts.values().sum();
    (counts, total)
}

pub(crate) fn compose(
    text_char_len: usize,
    sentences: &[Span],
    tokens: &[Span],
    atomics: &[AtomicHit],
    bundle: &Bundle,
    sink: &dyn WarningSink,
) -> Vec<ComposedHit> {
    if sentences.is_empty() {
        return Vec::new();
    }

    let buckets = bucket_by_sentence(sentences, atomics);
    let mut out = Vec::new();

    for marker_id in &bundle.composed {
        let Some(marker) = bundle.marker(marker_id) else { continue };
        if marker.kind != MarkerKind::Composed || marker.composed_of.is_empty() {
            continue;
        }

        let activation = match Activation::parse(&marker.activation) {
            Ok(a) => a,
            Err(e) => {
                sink.activation_eval_warning(marker_id, &marker.activation, &e.to_string());
                continue;
            }
        };

        let min_children = marker.min_children.unwrap_or(bundle.weights.min_children) as f64;
        let min_score = marker.min_score.unwrap_or(bundle.weights.min_score);
        let max_window = marker.max_sentence_span.max(1);

        let child_ids: Vec<&str> = marker.composed_of.iter().map(|c| c.marker_id.as_str()).collect();
        let weight_of = |cid: &str| -> f64 { marker.composed_of.iter().find(|c| c.marker_id == cid).map(|c| c.weight).unwrap_or(1.0) };
        let total_weight = {
            let sum: f64 = marker.composed_of.iter().map(|c| c.weight).sum();
            if sum > 0.0 { sum } else { 1.0 }
        };

        for i0 in 0..sentences.len() {
            for window_size in 1..=max_window {
                let last = (i0 + window_size - 1).min(sentences.len() - 1);

                let (counts, total_children) = window_counts(&child_ids, &buckets, i0, last);
                if total_children < min_children {
                    continue;
                }

                let present_weight: f64 = counts.iter().filter(|(_, &v)| v > 0.0).map(|(cid, _)| weight_of(cid)).sum();
                let score = present_weight / total_weight;
                if score < min_score {
                    continue;
                }

                let mut env = counts;
                env.insert("total_children".to_string(), total_children);
                env.insert("score".to_string(), score);
                if !activation.eval(&env) {
                    continue;
                }

                let min_start = sentences[i0].start;
                let max_end = sentences[last].end;

                let span = match &marker.span_policy {
                    SpanPolicy::AnchorWindow { window_tokens } => {
                        anchor_window_span(tokens, min_start, max_end, *window_tokens, text_char_len)
                    }
                    SpanPolicy::SentenceUnion { max_sentence_span, fallback } => sentence_union_span(
                        sentences,
                        min_start,
                        max_end,
                        *max_sentence_span,
                        *fallback,
                        tokens,
                        text_char_len,
                    ),
                    SpanPolicy::ClauseUnion => Span::new(min_start, max_end),
                };

                out.push(ComposedHit {
                    start: span.start,
                    end: span.end,
                    marker_id: marker_id.clone(),
                    family: marker.family,
                    score,
                    label: marker.label.clone(),
                });
                break;
            }
        }
    }

    out.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)).then_with(|| a.marker_id.cmp(&b.marker_id)));
    out
}
