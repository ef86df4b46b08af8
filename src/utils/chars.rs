//! Char-offset helpers for text node values
//!
//! All text offsets in the editing core count Unicode scalar values,
//! never bytes, so the same offsets are valid on both trees and inside
//! undo records regardless of the text's encoding width.

/// Length of a string in chars
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Inserts `what` at char offset `at`, or `None` when out of range
pub fn char_splice(s: &str, at: usize, what: &str) -> Option<String> {
    let byte = byte_offset(s, at)?;
    let mut out = String::with_capacity(s.len() + what.len());
    out.push_str(&s[..byte]);
    out.push_str(what);
    out.push_str(&s[byte..]);
    Some(out)
}

/// Removes `len` chars starting at char offset `at`, or `None` when the
/// range exceeds the string
pub fn char_range_remove(s: &str, at: usize, len: usize) -> Option<String> {
    let start = byte_offset(s, at)?;
    let end = byte_offset(s, at + len)?;
    let mut out = String::with_capacity(s.len() - (end - start));
    out.push_str(&s[..start]);
    out.push_str(&s[end..]);
    Some(out)
}

/// Byte offset of char offset `at`; `at` may equal the char length
fn byte_offset(s: &str, at: usize) -> Option<usize> {
    let mut count = 0;
    for (i, _) in s.char_indices() {
        if count == at {
            return Some(i);
        }
        count += 1;
    }
    (at == count).then_some(s.len())
}
