//! The shared data model: annotations, spans, and families.

use std::cmp::Ordering;

/// Coarse category prefix of a marker id. Any prefix not in this set maps
/// to `Sem`; every marker's family is always one of
/// `{ATO, SEM, CLU, MEMA, DEESC}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ato,
    Sem,
    Clu,
    Mema,
    Deesc,
}

impl Family {
    /// Parse the family prefix of a marker id (`"SEM_FOO"` → `Sem`).
    pub fn from_marker_id(marker_id: &str) -> Family {
        let prefix = marker_id.split('_').next().unwrap_or(marker_id);
        Family::from_prefix(prefix)
    }

    pub fn from_prefix(prefix: &str) -> Family {
        match prefix.to_ascii_uppercase().as_str() {
            "ATO" => Family::Ato,
            "CLU" => Family::Clu,
            "MEMA" => Family::Mema,
            "DEESC" => Family::Deesc,
            _ => Family::Sem,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Ato => "ATO",
            Family::Sem => "SEM",
            Family::Clu => "CLU",
            Family::Mema => "MEMA",
            Family::Deesc => "DEESC",
        }
    }

    /// Overlap-resolver priority rank: lower wins. Unknown families are
    /// handled by `from_prefix` mapping to `Sem` already, so this is total
    /// over the enum.
    pub fn rank(&self) -> u8 {
        match self {
            Family::Sem => 0,
            Family::Clu => 1,
            Family::Ato => 2,
            Family::Mema => 3,
            Family::Deesc => 4,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open `[start, end)` codepoint span over the analyzed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }
}

/// A final, caller-facing annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub marker_id: String,
    pub family: Family,
    pub score: f64,
    pub label: String,
}

impl Annotation {
    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Counts reported back to the caller alongside the final annotation list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metadata {
    pub atomic_count: usize,
    pub composed_count: usize,
    pub final_count: usize,
}

/// The wire contract: one `analyze` call's full output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationResult {
    pub text: String,
    pub annotations: Vec<Annotation>,
    pub metadata: Metadata,
}

/// Deterministic ordering used to sort the final annotation stream:
/// `start` ascending, ties broken lexicographically by `marker_id` so the
/// output is stable under permutation of equally-ranked input.
pub(crate) fn annotation_order(a: &Annotation, b: &Annotation) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| a.end.cmp(&b.end))
        .then_with(|| a.marker_id.cmp(&b.marker_id))
}
