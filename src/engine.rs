//! Orchestrator: wires the bundle, compiled patterns, and every pipeline
//! stage into one immutable, `Send + Sync` entry point.

use std::path::Path;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::bundle::Bundle;
use crate::compose::compose;
use crate::config::Limits;
use crate::detect::detect_atomics;
use crate::error::Result;
use crate::pattern::{compile_bundle, CompiledAtomic};
use crate::promote::promote;
use crate::resolve::resolve_overlaps;
use crate::sink::{TracingSink, WarningSink};
use crate::types::{Annotation, AnnotationResult, Metadata};

/// A compiled, immutable analysis engine. Build once per bundle and share
/// across threads (`Engine` is `Send + Sync`, like [`Bundle`] and
/// `CompiledAtomic`'s `fancy_regex::Regex`/`aho_corasick::AhoCorasick`
/// handles it wraps); `analyze` takes `&self` and is pure with respect to
/// its input text, so many callers can analyze concurrently against one
/// `Engine`.
pub struct Engine {
    bundle: Bundle,
    compiled: IndexMap<String, CompiledAtomic>,
    sink: Box<dyn WarningSink>,
}

impl Engine {
    /// Load a bundle directory and compile it with the default [`Limits`]
    /// and a [`TracingSink`].
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let bundle = Bundle::from_dir(dir)?;
        Ok(Self::from_bundle(bundle, Limits::default(), Box::new(TracingSink)))
    }

    /// Compile an already-loaded [`Bundle`] with explicit limits and sink.
    pub fn from_bundle(bundle: Bundle, limits: Limits, sink: Box<dyn WarningSink>) -> Self {
        let compiled = compile_bundle(&bundle, &limits, sink.as_ref());
        Self { bundle, compiled, sink }
    }

    /// Run the full pipeline over `text`: atomic detection, composition,
    /// promotion, and deterministic overlap resolution.
    pub fn analyze(&self, text: &str) -> AnnotationResult {
        let offsets = crate::offsets::CodepointIndex::build(text);
        let sentences = crate::segment::sentences(text);
        let tokens = crate::segment::tokens(text);

        let atomics = detect_atomics(text, &offsets, &self.compiled, &self.bundle, self.sink.as_ref());
        let atomic_count = atomics.len();

        let mut composed = compose(offsets.char_len(), &sentences, &tokens, &atomics, &self.bundle, self.sink.as_ref());
        let composed_count = composed.len();
        promote(&mut composed, &self.bundle, self.sink.as_ref());

        let candidates: Vec<Annotation> = atomics
            .into_iter()
            .map(|h| Annotation { start: h.start, end: h.end, marker_id: h.marker_id, family: h.family, score: h.score, label: h.label })
            .chain(composed.into_iter().map(|h| Annotation {
                start: h.start,
                end: h.end,
                marker_id: h.marker_id,
                family: h.family,
                score: h.score,
                label: h.label,
            }))
            .collect();

        let annotations = resolve_overlaps(candidates);
        let final_count = annotations.len();

        AnnotationResult {
            text: text.to_string(),
            annotations,
            metadata: Metadata { atomic_count, composed_count, final_count },
        }
    }
}

/// Stable content hash of an input text, useful for caching `analyze`
/// results keyed by input rather than the text itself.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
