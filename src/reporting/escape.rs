//! Reversible escaping for characters XML 1.0 cannot carry
//!
//! Markup characters are handled by quick-xml. What remains are control
//! characters (Linux filenames and decoder output may contain them), carriage
//! returns (which XML parsers normalize away) and U+FFFE/U+FFFF. Those are
//! written as `\u{hex}`. A backslash is doubled only where it would otherwise
//! be read back as the start of an escape, so ordinary paths and messages are
//! written unchanged.

use std::borrow::Cow;
use std::fmt::Write;

/// Whether `c` can appear literally in XML 1.0 character data and survive a
/// parse unchanged
fn is_literal(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{20}'..='\u{fffd}' | '\u{10000}'..='\u{10ffff}')
}

/// Escape `text` so it can be written as XML character data
pub fn encode(text: &str) -> Cow<'_, str> {
    if text.chars().all(|c| is_literal(c) && c != '\\') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        if c == '\\' {
            out.push('\\');
            if starts_escape(&text[i + 1..]) {
                out.push('\\');
            }
        } else if is_literal(c) {
            out.push(c);
        } else {
            let _ = write!(out, "\\u{{{:x}}}", c as u32);
        }
    }
    Cow::Owned(out)
}

/// Whether the encoded form of `rest` begins with something `decode` would
/// treat as an escape after a backslash
fn starts_escape(rest: &str) -> bool {
    match rest.chars().next() {
        Some('\\') => true,
        Some(c) if !is_literal(c) => true,
        _ => rest.starts_with("u{"),
    }
}

/// Undo [`encode`]
///
/// A backslash that does not start a valid escape is kept as is, so text
/// written by other tools passes through.
pub fn decode(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if let Some(after) = tail.strip_prefix('\\') {
            out.push('\\');
            rest = after;
        } else if let Some((c, after)) = unicode_escape(tail) {
            out.push(c);
            rest = after;
        } else {
            out.push('\\');
            rest = tail;
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Parse `u{hex}` at the start of `tail`, returning the character and the
/// remaining text
fn unicode_escape(tail: &str) -> Option<(char, &str)> {
    let body = tail.strip_prefix("u{")?;
    let end = body.find('}')?;
    let hex = &body[..end];
    if hex.is_empty() || hex.len() > 6 {
        return None;
    }
    let c = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)?;
    Some((c, &body[end + 1..]))
}
