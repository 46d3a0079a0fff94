//! Snippet sanitization.
//!
//! Server snippets are highlighted with `<mark>`, but their text comes from
//! document content. Only bare `<mark>`/`</mark>` survive; everything else is
//! escaped, and tags are rebalanced so a highlight never leaks past the
//! snippet.

use std::sync::LazyLock;

use regex::Regex;

/// Bare highlight tag, opening or closing, any case.
#[allow(clippy::expect_used)]
static MARK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)mark>").expect("mark tag regex is valid") // Static pattern, safe to panic
});

const OPEN: &str = "<mark>";
const CLOSE: &str = "</mark>";

/// Restricts `snippet` to the `<mark>` allow-list.
///
/// - bare `<mark>` / `</mark>` (any case) are kept, normalized to lowercase;
/// - tags with attributes and all other markup are escaped as text;
/// - a stray `</mark>` is dropped, a nested `<mark>` is dropped, and a
///   highlight still open at the end is closed.
#[must_use]
pub fn sanitize_snippet(snippet: &str) -> String {
    let mut out = String::with_capacity(snippet.len() + 16);
    let mut open = false;
    let mut last = 0;

    for caps in MARK_TAG.captures_iter(snippet) {
        let Some(tag) = caps.get(0) else { continue };
        escape_into(&mut out, &snippet[last..tag.start()]);
        last = tag.end();

        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        match (closing, open) {
            (false, false) => {
                out.push_str(OPEN);
                open = true;
            }
            (true, true) => {
                out.push_str(CLOSE);
                open = false;
            }
            // nested open or stray close
            _ => {}
        }
    }

    escape_into(&mut out, &snippet[last..]);
    if open {
        out.push_str(CLOSE);
    }
    out
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_highlight_is_kept() {
        assert_eq!(
            sanitize_snippet("a <mark>quarterly</mark> report"),
            "a <mark>quarterly</mark> report"
        );
    }

    #[test]
    fn test_script_is_escaped() {
        assert_eq!(
            sanitize_snippet("<script>alert(1)</script> <mark>hit</mark>"),
            "&lt;script&gt;alert(1)&lt;/script&gt; <mark>hit</mark>"
        );
    }

    #[test]
    fn test_mark_with_attributes_is_escaped() {
        let out = sanitize_snippet(r#"<mark onclick="x()">hit</mark>"#);
        assert_eq!(out, "&lt;mark onclick=&quot;x()&quot;&gt;hit");
    }

    #[test]
    fn test_unclosed_highlight_is_closed() {
        assert_eq!(sanitize_snippet("<MARK>open"), "<mark>open</mark>");
    }

    #[test]
    fn test_stray_close_and_nested_open_are_dropped() {
        assert_eq!(
            sanitize_snippet("x</mark> <mark>a<mark>b</mark>"),
            "x <mark>ab</mark>"
        );
    }

    #[test]
    fn test_ampersand_and_quotes_escaped() {
        assert_eq!(sanitize_snippet("R&D 'q'"), "R&amp;D &#39;q&#39;");
    }
}
