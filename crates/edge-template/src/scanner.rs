//! Directive and expression scanners.
//!
//! Three small scanners recognize the surface syntax of an edge template:
//!
//! - [`scan_tag`] reads `@name` or `@name('argument')` after an `@`.
//! - [`scan_section`] reads the body of a `@section(...)` up to its `@end`.
//! - [`scan_expression`] reads a `{{ expression }}` marker.
//!
//! All positions are byte offsets into the full source, so errors raised by
//! the compiler point at the right place.

use edge_core::error::EdgeError;

/// The closing directive of a section body.
pub const END_TAG: &str = "end";

/// A parsed directive occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// The directive name, e.g. `layout`, `section`, `!section`, `end`.
    pub name: String,
    /// The quoted argument, if the name was followed by a well-formed `('...')`.
    pub argument: Option<String>,
    /// Byte offset just past the tag (past `)` when an argument was read).
    pub end: usize,
}

impl Tag {
    /// Returns `true` if this is the `@end` closer.
    ///
    /// Only the exact name counts; `@append` or `@legend` are not closers.
    pub fn is_end(&self) -> bool {
        self.name == END_TAG
    }
}

const fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// Scans a tag starting at `pos`, the byte just after an `@` introducer.
///
/// Returns `None` when no tag name follows (an e-mail address, a lone `@`),
/// in which case the `@` is literal text. A name followed by something other
/// than a well-formed `('argument')` yields a tag without an argument whose
/// `end` stops after the name; callers decide whether that is an error.
pub fn scan_tag(source: &str, pos: usize) -> Option<Tag> {
    let rest = &source[pos..];
    let bang = usize::from(rest.starts_with('!'));
    let name_len = rest[bang..]
        .find(|c: char| !is_name_char(c))
        .unwrap_or(rest.len() - bang);
    if name_len == 0 {
        return None;
    }

    let name_end = pos + bang + name_len;
    let name = source[pos..name_end].to_string();

    match scan_argument(source, name_end) {
        Some((argument, end)) => Some(Tag {
            name,
            argument: Some(argument),
            end,
        }),
        None => Some(Tag {
            name,
            argument: None,
            end: name_end,
        }),
    }
}

/// Reads `( 'argument' )` starting exactly at `pos`.
///
/// Accepts single or double quotes and whitespace around the quoted string.
/// Quotes cannot be escaped.
fn scan_argument(source: &str, pos: usize) -> Option<(String, usize)> {
    let rest = source[pos..].strip_prefix('(')?;
    let inner = rest.trim_start();
    let quote = inner.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &inner[1..];
    let close = body.find(quote)?;
    let argument = body[..close].to_string();

    let after_quote = &body[close + 1..];
    let tail = after_quote.trim_start().strip_prefix(')')?;
    Some((argument, source.len() - tail.len()))
}

/// Scans a section body starting at `pos`, just after the `@section('name')`
/// header.
///
/// Returns the raw body (without the `@end` marker) and the byte offset just
/// past `@end`.
///
/// # Errors
///
/// Returns `MalformedDirective` if the body contains another `@section` or
/// if the input ends before `@end`.
pub fn scan_section(source: &str, pos: usize) -> Result<(String, usize), EdgeError> {
    for (offset, ch) in source[pos..].char_indices() {
        if ch != '@' {
            continue;
        }
        let at = pos + offset;
        if let Some(tag) = scan_tag(source, at + 1) {
            if tag.is_end() {
                return Ok((source[pos..at].to_string(), tag.end));
            }
            if tag.name == "section" {
                return Err(EdgeError::malformed(
                    "@section cannot be nested inside another @section",
                    at,
                ));
            }
        }
    }

    Err(EdgeError::malformed(
        "unterminated @section: expected '@end'",
        pos,
    ))
}

/// Scans an expression marker starting at `pos`, which must point at a `{`.
///
/// Returns `Ok(None)` if the text at `pos` is not `{{` (a lone brace is
/// literal text). Otherwise returns the trimmed expression and the byte
/// offset just past the closing `}}`. Quoted strings inside the expression
/// may contain `}}` and backslash-escaped quotes.
///
/// # Errors
///
/// Returns `MalformedDirective` for an unclosed marker or an empty expression.
pub fn scan_expression(source: &str, pos: usize) -> Result<Option<(String, usize)>, EdgeError> {
    if !source[pos..].starts_with("{{") {
        return Ok(None);
    }

    let start = pos + 2;
    let mut quote: Option<char> = None;
    let mut chars = source[start..].char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match (quote, ch) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '}') if matches!(chars.peek(), Some((_, '}'))) => {
                let close = start + offset;
                let expression = source[start..close].trim();
                if expression.is_empty() {
                    return Err(EdgeError::malformed("empty expression", pos));
                }
                return Ok(Some((expression.to_string(), close + 2)));
            }
            (None, _) => {}
        }
    }

    Err(EdgeError::malformed(
        "unclosed expression: expected '}}'",
        pos,
    ))
}
