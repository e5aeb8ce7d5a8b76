//! Tunables for the pattern compiler.
//!
//! Hoists the magic numbers that would otherwise be scattered through the
//! compiler into one place; there are exactly two knobs worth exposing.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Fed into `fancy_regex::RegexBuilder::backtrack_limit` for every
    /// compiled detect/demote/literal-fallback pattern. Marker bundles are
    /// author-supplied data, not trusted code, so every pattern is fenced
    /// against catastrophic backtracking rather than allowed to run
    /// unbounded.
    pub regex_backtrack_limit: usize,
    /// Minimum literal length extracted from a pattern to seed the
    /// Aho-Corasick pre-filter.
    pub literal_min_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            regex_backtrack_limit: 1_000_000,
            literal_min_len: 3,
        }
    }
}
