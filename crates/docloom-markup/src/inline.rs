//! Inline cross-reference syntax.
//!
//! Scans text runs for `:ref[target]` mentions, optionally followed by
//! `{text="display text"}`. Mentions become [`XrefMention`] inlines and are
//! resolved only after every page has expanded.

use docloom_model::{Inline, XrefMention};

/// Split a text run into plain text and cross-reference mentions.
pub(crate) fn scan_text(text: &str) -> Vec<Inline> {
    let mut result = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        match parse_mention(remaining) {
            Some((mention, start, end)) => {
                if start > 0 {
                    result.push(Inline::Text(remaining[..start].to_owned()));
                }
                result.push(Inline::Xref(mention));
                remaining = &remaining[end..];
            }
            None => {
                result.push(Inline::Text(remaining.to_owned()));
                break;
            }
        }
    }

    result
}

/// Find the first `:ref[...]` mention in a text run.
///
/// Returns the mention plus its byte range. Double-colon forms (`::ref[`)
/// are not mentions.
fn parse_mention(s: &str) -> Option<(XrefMention, usize, usize)> {
    let mut search = 0;

    while let Some(pos) = s[search..].find(":ref[") {
        let start = search + pos;

        if start > 0 && s.as_bytes()[start - 1] == b':' {
            search = start + 1;
            continue;
        }

        let after_name = &s[start + 4..];
        let (target, consumed) = parse_brackets(after_name);
        if consumed == 0 {
            // Unclosed bracket; nothing after this can match either.
            return None;
        }
        if target.is_empty() {
            search = start + 4 + consumed;
            continue;
        }

        let after_content = &s[start + 4 + consumed..];
        let (attrs, attrs_consumed) = parse_braces(after_content);
        let text = attr_value(&attrs, "text").unwrap_or_else(|| target.clone());

        let mention = XrefMention {
            id: None,
            target,
            text,
            resolved: None,
        };
        return Some((mention, start, start + 4 + consumed + attrs_consumed));
    }

    None
}

/// Parse content from brackets: `[content]`
///
/// Returns (content, `bytes_consumed`), handling nesting.
fn parse_brackets(s: &str) -> (String, usize) {
    delimited(s, '[', ']')
}

/// Parse attributes from braces: `{key="value"}`
///
/// Returns (`attrs_str` without braces, `bytes_consumed`).
fn parse_braces(s: &str) -> (String, usize) {
    delimited(s, '{', '}')
}

fn delimited(s: &str, open: char, close: char) -> (String, usize) {
    if !s.starts_with(open) {
        return (String::new(), 0);
    }

    let mut depth = 0;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return (s[open.len_utf8()..i].to_owned(), i + close.len_utf8());
            }
        }
    }

    (String::new(), 0)
}

/// Extract a `key="value"` attribute.
fn attr_value(attrs: &str, key: &str) -> Option<String> {
    let marker = format!("{key}=\"");
    let start = attrs.find(&marker)? + marker.len();
    let end = attrs[start..].find('"')? + start;
    Some(attrs[start..end].to_owned())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn xref(target: &str, text: &str) -> Inline {
        Inline::Xref(XrefMention {
            id: None,
            target: target.to_owned(),
            text: text.to_owned(),
            resolved: None,
        })
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(
            scan_text("no mentions here"),
            vec![Inline::Text("no mentions here".to_owned())]
        );
    }

    #[test]
    fn test_single_mention() {
        assert_eq!(
            scan_text("see :ref[usage] for details"),
            vec![
                Inline::Text("see ".to_owned()),
                xref("usage", "usage"),
                Inline::Text(" for details".to_owned()),
            ]
        );
    }

    #[test]
    fn test_mention_with_display_text() {
        assert_eq!(
            scan_text(r#":ref[guide.md#usage]{text="the usage section"}"#),
            vec![xref("guide.md#usage", "the usage section")]
        );
    }

    #[test]
    fn test_multiple_mentions() {
        let inlines = scan_text(":ref[a] and :ref[b]");
        assert_eq!(inlines.len(), 3);
        assert_eq!(inlines[0], xref("a", "a"));
        assert_eq!(inlines[2], xref("b", "b"));
    }

    #[test]
    fn test_double_colon_not_a_mention() {
        assert_eq!(
            scan_text("::ref[not-one]"),
            vec![Inline::Text("::ref[not-one]".to_owned())]
        );
    }

    #[test]
    fn test_unclosed_bracket_is_text() {
        assert_eq!(
            scan_text(":ref[unclosed"),
            vec![Inline::Text(":ref[unclosed".to_owned())]
        );
    }

    #[test]
    fn test_empty_target_skipped() {
        assert_eq!(
            scan_text(":ref[] next"),
            vec![Inline::Text(":ref[] next".to_owned())]
        );
    }

    #[test]
    fn test_nested_brackets_in_target() {
        let inlines = scan_text(":ref[items[0]]");
        assert_eq!(inlines, vec![xref("items[0]", "items[0]")]);
    }
}
