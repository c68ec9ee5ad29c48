//! Accent- and case-insensitive folding for indexable text and query terms.
//!
//! `fold` maps its input codepoint-by-codepoint: every accented character is
//! canonically decomposed and reduced to its lowercased base letter, so the
//! folded string always has exactly as many chars as the input and char
//! position `i` refers to the same logical character in both. Byte offsets
//! are NOT preserved (a two-byte `á` folds to a one-byte `a`), which is why
//! match offsets found in folded text must travel through [`align_offset`]
//! before slicing the raw text.
//!
//! Combining marks that appear as standalone codepoints in the source are
//! passed through unchanged; dropping them would shift every later position.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fold one character to its lowercased base form.
#[must_use]
pub fn fold_char(c: char) -> char {
    if is_combining_mark(c) {
        return c;
    }
    // The first codepoint of a canonical decomposition is the starter.
    let base = c.nfd().next().unwrap_or(c);
    base.to_lowercase().next().unwrap_or(base)
}

/// Fold a string. Pure, total, idempotent, and char-length-preserving.
#[must_use]
pub fn fold(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

/// Fold a string while blanking out the given byte ranges of the input.
///
/// Used to keep code blocks out of the searchable body text without
/// disturbing positional alignment: masked characters become spaces, so the
/// folded string still lines up char-for-char with the raw text.
#[must_use]
pub fn fold_masked(s: &str, masked: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(s.len());
    let mut ranges = masked.iter().copied().peekable();
    for (byte_idx, c) in s.char_indices() {
        while let Some(&(_, end)) = ranges.peek() {
            if end <= byte_idx {
                ranges.next();
            } else {
                break;
            }
        }
        let in_mask = ranges
            .peek()
            .is_some_and(|&(start, end)| byte_idx >= start && byte_idx < end);
        if in_mask && c != '\n' {
            out.push(' ');
        } else {
            out.push(fold_char(c));
        }
    }
    out
}

/// Translate a byte offset in the folded string to the byte offset of the
/// same character in the raw string.
///
/// Offsets past the end of either string clamp to `raw.len()`. Relies on the
/// 1:1 char mapping guaranteed by [`fold`].
#[must_use]
pub fn align_offset(norm: &str, raw: &str, norm_byte: usize) -> usize {
    if norm_byte >= norm.len() {
        return raw.len();
    }
    let char_pos = norm[..norm_byte].chars().count();
    raw.char_indices()
        .nth(char_pos)
        .map_or(raw.len(), |(idx, _)| idx)
}

/// Byte offset of the char `count` chars after `from` (clamped to the end).
#[must_use]
pub fn advance_chars(s: &str, from: usize, count: usize) -> usize {
    s[from..]
        .char_indices()
        .nth(count)
        .map_or(s.len(), |(idx, _)| from + idx)
}

/// Byte offset of the char `count` chars before `from` (clamped to zero).
#[must_use]
pub fn retreat_chars(s: &str, from: usize, count: usize) -> usize {
    let mut boundaries: Vec<usize> = Vec::with_capacity(count);
    for (idx, _) in s[..from].char_indices().rev().take(count) {
        boundaries.push(idx);
    }
    boundaries.last().copied().unwrap_or(if count == 0 { from } else { 0 })
}
