//! Observability channel for the crate's non-fatal failure taxonomy.
//!
//! The core never panics and never mutates global state to report a
//! problem; instead every non-fatal event is routed through a
//! `WarningSink` trait object the caller supplies. This keeps `Engine`
//! a plain value, with no hidden global state, while still letting
//! callers wire it into whatever logging stack they run.

/// One variant per non-fatal failure mode. Bundle load failure is
/// deliberately absent here — it is fatal and returned as a `Result::Err`.
pub trait WarningSink: Send + Sync {
    /// A single `detect`/`demote_if` regex on `marker_id` failed to compile;
    /// that one pattern is skipped, the marker's other patterns still run.
    fn pattern_compile_warning(&self, marker_id: &str, pattern: &str, cause: &str) {
        let _ = (marker_id, pattern, cause);
    }

    /// An activation or promotion guard expression failed to parse or
    /// evaluate; the expression is treated as `false`.
    fn activation_eval_warning(&self, marker_id: &str, expr: &str, cause: &str) {
        let _ = (marker_id, expr, cause);
    }

    /// A detector produced a span outside `0..=len(text)` or with
    /// `start >= end`; that marker's contribution at this site is dropped.
    fn input_range_violation(&self, marker_id: &str, start: usize, end: usize, text_len: usize) {
        let _ = (marker_id, start, end, text_len);
    }
}

/// Default sink: forwards every event to `tracing` as a structured `warn!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn pattern_compile_warning(&self, marker_id: &str, pattern: &str, cause: &str) {
        tracing::warn!(marker_id, pattern, cause, "pattern failed to compile, skipping");
    }

    fn activation_eval_warning(&self, marker_id: &str, expr: &str, cause: &str) {
        tracing::warn!(marker_id, expr, cause, "activation expression rejected, treating as false");
    }

    fn input_range_violation(&self, marker_id: &str, start: usize, end: usize, text_len: usize) {
        tracing::warn!(
            marker_id,
            start,
            end,
            text_len,
            "detector produced an out-of-range span, dropping this hit"
        );
    }
}

/// Discards every event. Useful for callers that haven't initialized a
/// `tracing` subscriber and don't want one implicitly set up for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl WarningSink for NullSink {}

/// Test/debug sink that records every event in order instead of logging it,
/// so assertions can check exactly what the pipeline warned about.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: std::sync::Mutex<Vec<String>>,
}

impl WarningSink for RecordingSink {
    fn pattern_compile_warning(&self, marker_id: &str, pattern: &str, cause: &str) {
        self.events.lock().unwrap().push(format!(
            "pattern_compile_warning({marker_id}, {pattern}, {cause})"
        ));
    }

    fn activation_eval_warning(&self, marker_id: &str, expr: &str, cause: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("activation_eval_warning({marker_id}, {expr}, {cause})"));
    }

    fn input_range_violation(&self, marker_id: &str, start: usize, end: usize, text_len: usize) {
        self.events.lock().unwrap().push(format!(
            "input_range_violation({marker_id}, {start}, {end}, {text_len})"
        ));
    }
}
