//! Heading slugs.
//!
//! Anchor identifiers derived from heading text: lowercased, alphanumeric
//! runs joined by single dashes. Deterministic so identical headings slug
//! identically on every build.

/// Slugify heading text into an anchor identifier.
///
/// Returns an empty string when the text contains no alphanumeric
/// characters; the caller reports that as a diagnostic.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_heading() {
        assert_eq!(slugify("Usage"), "usage");
    }

    #[test]
    fn test_spaces_become_dashes() {
        assert_eq!(slugify("Getting Started"), "getting-started");
    }

    #[test]
    fn test_punctuation_collapses() {
        assert_eq!(slugify("What's new?  (2026)"), "what-s-new-2026");
    }

    #[test]
    fn test_leading_trailing_stripped() {
        assert_eq!(slugify("  Hello!  "), "hello");
    }

    #[test]
    fn test_unicode_kept() {
        assert_eq!(slugify("Überblick"), "überblick");
    }

    #[test]
    fn test_only_punctuation_is_empty() {
        assert_eq!(slugify("!?!"), "");
    }
}
