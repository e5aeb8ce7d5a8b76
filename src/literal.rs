use regex_syntax::{hir::literal::Extractor, parse};

/// Extract literal substrings from a detect/demote pattern for use as
/// Aho-Corasick pre-filter candidates in the pattern compiler. Returns
/// literals of at least `min_len` bytes, or an empty vec if none are
/// found — the marker then becomes an "always candidate" whose regex runs
/// on every text unconditionally.
///
/// This is a performance-only optimization: a marker never loses a match
/// because its literals were missed, since `always_candidate` markers
/// simply skip the pre-filter and scan directly. If the pattern can't be
/// parsed by `regex_syntax` (author-supplied `fancy_regex` syntax it
/// doesn't understand), it falls back to the always-candidate path.
pub(crate) fn extract_literals(pattern: &str, min_len: usize) -> Vec<String> {
    let hir = match parse(pattern) {
        Ok(h) => h,
        Err(_) => return Vec::new(),
    };

    let mut extractor = Extractor::new();
    extractor.kind(regex_syntax::hir::literal::ExtractKind::Prefix);

    let seq = extractor.extract(&hir);
    let literals: Vec<String> = seq
        .literals()
        .into_iter()
        .flatten()
        .filter_map(|lit| {
            let s = std::str::from_utf8(lit.as_bytes()).ok()?;
            if s.len() >= min_len {
                Some(s.to_lowercase())
            } else {
                None
            }
        })
        .collect();

    literals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_literal() {
        let lits = extract_literals("maybe", 3);
        assert_eq!(lits, vec!["maybe"]);
    }

    #[test]
    fn alternation() {
        let lits = extract_literals("maybe|perhaps", 3);
        assert!(lits.contains(&"maybe".to_string()));
        assert!(lits.contains(&"perhaps".to_string()));
    }

    #[test]
    fn too_short_returns_empty() {
        let lits = extract_literals(r"\d+\.\d+", 3);
        assert!(lits.is_empty());
    }
}
