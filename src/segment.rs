//! Text segmenter: sentence spans and token spans.
//!
//! Offsets throughout this crate are codepoint offsets, so every span
//! here is counted in `char`s, not bytes.

use unicode_segmentation::UnicodeSegmentation;

use crate::types::Span;

const ENDERS: &[char] = &['.', '!', '?', '…'];
const CLOSING: &[char] = &['"', '\'', '»', ')', ']', '}'];

/// Split `text` into sentence spans. An end-of-sentence is any of `.!?…`,
/// optionally followed by closing quotes/brackets, then whitespace or
/// end-of-text; a double newline also terminates a sentence. The spans
/// cover the whole input: consecutive spans abut and the last one ends at
/// `len(text)` (codepoints). If no enders are found, one span covering the
/// whole text is returned.
pub fn sentences(text: &str) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < n {
        let ch = chars[i];

        if ENDERS.contains(&ch) {
            let mut j = i + 1;
            while j < n && CLOSING.contains(&chars[j]) {
                j += 1;
            }
            if j >= n || chars[j].is_whitespace() {
                out.push(Span::new(start, j));
                start = j;
                i = j;
                continue;
            }
        }

        if ch == '\n' {
            let next = chars.get(i + 1).copied();
            if next == Some('\n') || next == Some('\r') {
                out.push(Span::new(start, i));
                start = i + 1;
                i += 1;
                continue;
            }
        }

        i += 1;
    }

    if start < n {
        out.push(Span::new(start, n));
    }

    if out.is_empty() {
        out.push(Span::new(0, n));
    }

    out
}

/// Non-overlapping Unicode word-character runs (a `\w+` equivalent).
/// Empty input yields an empty list.
pub fn tokens(text: &str) -> Vec<Span> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut idx = 0usize;

    for word in text.split_word_bounds() {
        let len = word.chars().count();
        let is_word_like = word.chars().next().map(is_word_char).unwrap_or(false);
        if is_word_like {
            if run_start.is_none() {
                run_start = Some(idx);
            }
        } else if let Some(s) = run_start.take() {
            out.push(Span::new(s, idx));
        }
        idx += len;
    }
    if let Some(s) = run_start {
        out.push(Span::new(s, idx));
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Find the index of the sentence containing `pos` under half-open
/// `[start, end)` semantics; `None` if `pos` falls after the last
/// sentence or the list is empty.
pub fn sentence_index_of(sentences: &[Span], pos: usize) -> Option<usize> {
    sentences.iter().position(|s| s.contains(pos))
}
