//! Rule-compiled text-marker annotation core.
//!
//! Loads an author-supplied marker bundle (canonical markers, a promotion
//! mapping, and composed-marker weight defaults), compiles its patterns
//! once, and analyzes text against it: atomic regex detection,
//! sentence/token segmentation, composed-marker activation, family
//! promotion, and deterministic overlap resolution, in that order. See
//! [`Engine`] for the entry point.

mod bundle;
mod compose;
mod config;
mod detect;
mod engine;
mod error;
mod expr;
mod literal;
mod offsets;
mod pattern;
mod promote;
mod resolve;
mod segment;
mod sink;
mod types;

pub use bundle::{Bundle, ComposedChild, Marker, MarkerKind, PromotionRule, RawPattern, SentenceFallback, SpanPolicy, WeightDefaults};
pub use config::Limits;
pub use engine::{content_hash, Engine};
pub use error::{Error, Result};
pub use segment::{sentence_index_of, sentences, tokens};
pub use sink::{NullSink, RecordingSink, TracingSink, WarningSink};
pub use types::{Annotation, AnnotationResult, Family, Metadata, Span};
