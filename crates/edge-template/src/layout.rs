//! Layout inheritance support.
//!
//! A child template names its parent with `@layout('name')` and supplies
//! named blocks with `@section('name') ... @end`. The layout marks where
//! those blocks go with `@!section('name')` placeholders.
//!
//! ## Example
//!
//! ```text
//! main.edge
//! <html><body>@!section('body')</body></html>
//!
//! home.edge
//! @layout('main')
//! @section('body')
//!   <h1>{{ title }}</h1>
//! @end
//! ```
//!
//! Rendering `home` with `title = "hello"` produces
//! `<html><body><h1>hello</h1></body></html>`.
//!
//! The compiler merges the section bodies into the layout text with
//! [`merge_sections`] and compiles the result again, so expressions inside a
//! section are evaluated against the child's render context.

use std::collections::HashMap;

use crate::scanner::{scan_tag, Tag};

/// The directive name of a layout placeholder.
pub const PLACEHOLDER: &str = "!section";

/// Replaces every `@!section('name')` in `parent` with `sections[name]`.
///
/// Placeholders with no matching section are replaced with nothing. Section
/// bodies are inserted verbatim and are not scanned for further placeholders.
pub fn merge_sections(parent: &str, sections: &HashMap<String, String>) -> String {
    let mut merged = String::with_capacity(parent.len());
    let mut pos = 0;

    while let Some(offset) = parent[pos..].find('@') {
        let at = pos + offset;
        merged.push_str(&parent[pos..at]);

        match scan_tag(parent, at + 1) {
            Some(Tag {
                name,
                argument: Some(section),
                end,
            }) if name == PLACEHOLDER => {
                match sections.get(&section) {
                    Some(body) => merged.push_str(body),
                    None => tracing::debug!(%section, "layout placeholder has no matching section"),
                }
                pos = end;
            }
            _ => {
                merged.push('@');
                pos = at + 1;
            }
        }
    }

    merged.push_str(&parent[pos..]);
    merged
}

/// Lists the placeholder names in a layout, in order of appearance.
pub fn placeholders(parent: &str) -> Vec<String> {
    parent
        .match_indices('@')
        .filter_map(|(at, _)| scan_tag(parent, at + 1))
        .filter(|tag| tag.name == PLACEHOLDER)
        .filter_map(|tag| tag.argument)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_merge_replaces_placeholder() {
        let merged = merge_sections("<h1>@!section('title')</h1>", &sections(&[("title", "hello")]));
        assert_eq!(merged, "<h1>hello</h1>");
    }

    #[test]
    fn test_merge_missing_section_is_empty() {
        let merged = merge_sections("a@!section('nope')b", &sections(&[]));
        assert_eq!(merged, "ab");
    }

    #[test]
    fn test_merge_keeps_other_at_signs() {
        let parent = "mail me@example.com @!section @!section('x') @media";
        let merged = merge_sections(parent, &sections(&[("x", "X")]));
        assert_eq!(merged, "mail me@example.com @!section X @media");
    }

    #[test]
    fn test_merge_repeated_placeholder() {
        let merged = merge_sections(
            "@!section('x')|@!section(\"x\")",
            &sections(&[("x", "{{ v }}")]),
        );
        assert_eq!(merged, "{{ v }}|{{ v }}");
    }

    #[test]
    fn test_section_names_are_case_sensitive() {
        let merged = merge_sections("@!section('Title')", &sections(&[("title", "x")]));
        assert_eq!(merged, "");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("@!section('head') x @!section('body') @section('no')"),
            vec!["head".to_string(), "body".to_string()]
        );
    }
}
