//! Byte ↔ codepoint offset conversion.
//!
//! `fancy_regex` and `aho_corasick` report match positions as byte offsets
//! into the `&str` they scanned. Every other part of this crate (segments,
//! tokens, the final `Annotation`) works in codepoint offsets, since those
//! are what a caller can safely index into a `chars()` view of the text
//! with. `CodepointIndex` is the one seam where that conversion happens,
//! built once per `analyze` call.

pub(crate) struct CodepointIndex {
    /// `byte_offsets[i]` is the byte offset at which the `i`-th codepoint
    /// starts. Has `char_len() + 1` entries; the last is `text.len()`.
    byte_offsets: Vec<usize>,
}

impl CodepointIndex {
    pub fn build(text: &str) -> Self {
        let mut byte_offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        byte_offsets.push(text.len());
        Self { byte_offsets }
    }

    pub fn char_len(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    /// Map a byte offset that falls on a char boundary to its codepoint
    /// index. Regex/AC match boundaries are always char boundaries for
    /// well-formed UTF-8 input, so this never needs to round.
    pub fn byte_to_char(&self, byte_idx: usize) -> usize {
        match self.byte_offsets.binary_search(&byte_idx) {
            Ok(i) => i,
            Err(i) => i, // not a boundary (shouldn't happen); clamp to nearest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_offsets_are_identity() {
        let idx = CodepointIndex::build("hello");
        assert_eq!(idx.char_len(), 5);
        assert_eq!(idx.byte_to_char(0), 0);
        assert_eq!(idx.byte_to_char(5), 5);
    }

    #[test]
    fn multibyte_offsets_collapse_to_codepoints() {
        let text = "café au lait";
        let idx = CodepointIndex::build(text);
        // "café" is 4 codepoints but 5 bytes (é is 2 bytes in UTF-8).
        assert_eq!(idx.char_len(), text.chars().count());
        let space_byte = text.find(' ').unwrap();
        assert_eq!(idx.byte_to_char(space_byte), 4);
    }
}
