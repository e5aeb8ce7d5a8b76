//! Resource loader and the marker data model.
//!
//! A `Bundle` is the immutable, shared, read-only result of parsing the
//! three on-disk marker files. It carries no compiled regexes or interior
//! mutability — that happens once, at [`crate::engine::Engine`]
//! construction, so many `Engine`s can share one `Bundle` (or be rebuilt
//! from it) without re-parsing JSON.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Family;

pub const MARKERS_FILE: &str = "markers_canonical.ld35.json";
pub const PROMOTION_FILE: &str = "promotion_mapping.ld35.json";
pub const WEIGHTS_FILE: &str = "weights.ld35.json";

/// One `{regex, flags}` pair from `detects`/`demote_if`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPattern {
    pub regex: String,
    #[serde(default)]
    pub flags: String,
}

/// One `composed_of` entry: a child marker id and its weight.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposedChild {
    pub marker_id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawFrame {
    concept: Option<String>,
    #[serde(default)]
    signal: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawScoring {
    weight: Option<f64>,
}

/// The four span-policy shapes a composed marker can declare.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanPolicy {
    AnchorWindow { window_tokens: (i64, i64) },
    SentenceUnion { max_sentence_span: usize, fallback: SentenceFallback },
    ClauseUnion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceFallback {
    None,
    AnchorWindow,
}

impl Default for SpanPolicy {
    fn default() -> Self {
        SpanPolicy::AnchorWindow { window_tokens: (-8, 8) }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSpanPolicy {
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    window_tokens: Option<(i64, i64)>,
    #[serde(default)]
    max_sentence_span: Option<usize>,
    #[serde(default)]
    fallback: Option<String>,
}

impl From<RawSpanPolicy> for SpanPolicy {
    fn from(raw: RawSpanPolicy) -> Self {
        match raw.mode.as_deref() {
            Some("sentence_union") => SpanPolicy::SentenceUnion {
                max_sentence_span: raw.max_sentence_span.unwrap_or(1).max(1),
                fallback: match raw.fallback.as_deref() {
                    Some("anchor_window") => SentenceFallback::AnchorWindow,
                    _ => SentenceFallback::None,
                },
            },
            Some("clause_union") => SpanPolicy::ClauseUnion,
            _ => SpanPolicy::AnchorWindow {
                window_tokens: raw.window_tokens.unwrap_or((-8, 8)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Atomic,
    Composed,
}

/// A canonical marker, atomic or composed, after indexing.
#[derive(Debug, Clone)]
pub struct Marker {
    pub id: String,
    pub family: Family,
    pub kind: MarkerKind,
    pub label: String,

    // Atomic-only fields.
    pub detects: Vec<RawPattern>,
    pub demote_if: Vec<RawPattern>,
    /// Literal terms drawn from `frame.signal` / `examples`, feeding the
    /// literal-fallback policy in the pattern compiler. Each term is longer
    /// than two characters.
    pub literal_terms: Vec<String>,
    pub declared_score: Option<f64>,

    // Composed-only fields.
    pub composed_of: Vec<ComposedChild>,
    pub activation: String,
    pub span_policy: SpanPolicy,
    /// Number of sentences the composer's sliding window walks, `1..=this`,
    /// starting at each candidate sentence. Read from `span_policy`'s
    /// `max_sentence_span` key regardless of the policy's `mode`, since the
    /// window walk and the span-union geometry are independent concerns
    /// that happen to share one declared bound.
    pub max_sentence_span: usize,
    pub min_children: Option<usize>,
    pub min_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMarker {
    id: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    detects: Vec<RawPattern>,
    #[serde(default)]
    demote_if: Vec<RawPattern>,
    #[serde(default)]
    composed_of: Vec<ComposedChild>,
    #[serde(default)]
    activation: Option<String>,
    #[serde(default)]
    span_policy: RawSpanPolicy,
    #[serde(default)]
    min_children: Option<usize>,
    #[serde(default)]
    min_score: Option<f64>,
    #[serde(default)]
    frame: RawFrame,
    #[serde(default)]
    scoring: RawScoring,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

impl RawMarker {
    fn into_marker(self) -> Option<Marker> {
        let id = self.id?;
        let family = Family::from_marker_id(&id);
        let kind = match self.kind.as_deref() {
            Some("composed") => MarkerKind::Composed,
            _ => MarkerKind::Atomic,
        };
        let label = self
            .frame
            .concept
            .clone()
            .or(self.description.clone())
            .unwrap_or_else(|| id.clone());

        let mut literal_terms: Vec<String> = Vec::new();
        literal_terms.extend(self.frame.signal.iter().cloned());
        literal_terms.extend(self.examples.iter().cloned());
        literal_terms.retain(|t| t.trim().chars().count() > 2);

        let max_sentence_span = self.span_policy.max_sentence_span.unwrap_or(1).max(1);

        Some(Marker {
            id,
            family,
            kind,
            label,
            detects: self.detects,
            demote_if: self.demote_if,
            literal_terms,
            declared_score: self.scoring.weight,
            composed_of: self.composed_of,
            activation: self.activation.unwrap_or_default(),
            span_policy: self.span_policy.into(),
            max_sentence_span,
            min_children: self.min_children,
            min_score: self.min_score,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawPromotionRule {
    marker_id: Option<String>,
    #[serde(default)]
    activate_when: Option<String>,
    #[serde(default)]
    min_score: Option<f64>,
    #[serde(default)]
    promote_to: Option<String>,
}

/// A promotion rule, keyed by the composed marker id it relabels when its
/// guard passes.
#[derive(Debug, Clone)]
pub struct PromotionRule {
    pub guard: String,
    pub min_score: f64,
    pub promote_to: Family,
}

/// Defaults read out of `weights.ld35.json`: only
/// `composed.min_children`/`composed.min_score` are read; the rest of the
/// file is free-form and ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightDefaults {
    pub min_children: usize,
    pub min_score: f64,
}

impl Default for WeightDefaults {
    fn default() -> Self {
        Self { min_children: 1, min_score: 0.6 }
    }
}

/// The immutable, loaded marker bundle: frozen after construction, shared
/// read-only by every analysis.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    pub by_id: IndexMap<String, Marker>,
    pub atomics: Vec<String>,
    pub composed: Vec<String>,
    pub promotions: IndexMap<String, PromotionRule>,
    pub weights: WeightDefaults,
}

impl Bundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.by_id.get(id)
    }

    /// Load a bundle directory: any subset of the three files may be
    /// absent (empty structure, not an error); a present but unparseable
    /// file is a fatal `Error`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let markers_value = read_optional_json(&dir.join(MARKERS_FILE))?;
        let promotion_value = read_optional_json(&dir.join(PROMOTION_FILE))?;
        let weights_value = read_optional_json(&dir.join(WEIGHTS_FILE))?;

        let raw_markers = markers_value
            .map(extract_marker_array)
            .unwrap_or_default();
        let raw_promotions = promotion_value
            .as_ref()
            .and_then(|v| v.get("promotions"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(Self::from_raw(raw_markers, raw_promotions, weights_value))
    }

    /// Build a bundle directly from already-parsed JSON values; used by
    /// `from_dir` and directly by tests that want to avoid touching disk.
    pub fn from_values(
        markers: Value,
        promotion: Option<Value>,
        weights: Option<Value>,
    ) -> Self {
        let raw_markers = extract_marker_array(markers);
        let raw_promotions = promotion
            .as_ref()
            .and_then(|v| v.get("promotions"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Self::from_raw(raw_markers, raw_promotions, weights)
    }

    fn from_raw(raw_markers: Vec<Value>, raw_promotions: Vec<Value>, weights_value: Option<Value>) -> Self {
        let mut by_id: IndexMap<String, Marker> = IndexMap::new();
        let mut atomics = Vec::new();
        let mut composed = Vec::new();

        // First occurrence wins; entries without an id are silently dropped.
        for value in raw_markers {
            let raw: RawMarker = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let Some(marker) = raw.into_marker() else { continue };
            if by_id.contains_key(&marker.id) {
                continue;
            }
            match marker.kind {
                MarkerKind::Atomic => atomics.push(marker.id.clone()),
                MarkerKind::Composed => composed.push(marker.id.clone()),
            }
            by_id.insert(marker.id.clone(), marker);
        }

        let mut promotions = IndexMap::new();
        for value in raw_promotions {
            let raw: RawPromotionRule = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let Some(marker_id) = raw.marker_id else { continue };
            let Some(promote_to) = raw.promote_to else { continue };
            promotions.insert(
                marker_id,
                PromotionRule {
                    guard: raw.activate_when.unwrap_or_default(),
                    min_score: raw.min_score.unwrap_or(0.0),
                    promote_to: Family::from_prefix(&promote_to),
                },
            );
        }

        let weights = weights_value
            .as_ref()
            .map(parse_weight_defaults)
            .unwrap_or_default();

        Self { by_id, atomics, composed, promotions, weights }
    }
}

fn parse_weight_defaults(value: &Value) -> WeightDefaults {
    let composed = value.get("composed");
    let min_children = composed
        .and_then(|c| c.get("min_children"))
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(1);
    let min_score = composed
        .and_then(|c| c.get("min_score"))
        .and_then(Value::as_f64)
        .unwrap_or(0.6);
    WeightDefaults { min_children, min_score }
}

fn extract_marker_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("markers") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn read_optional_json(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| Error::Json { path: path.to_path_buf(), source })?;
    Ok(Some(value))
}
