//! Cross-reference requests and target specifiers.
//!
//! A mention that cannot be resolved during expansion (its target may live on
//! a page processed later) becomes a [`CrossRefRequest`]. The resolver
//! consumes requests against the completed anchor registry after every page
//! has expanded.

use std::fmt;

/// Parsed target specifier: `identifier` or `page-path#identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// Explicit page disambiguator, if written.
    pub page: Option<String>,
    /// Anchor identifier.
    pub id: String,
}

impl TargetSpec {
    /// Parse a specifier as written in a `:ref[...]` mention.
    ///
    /// Everything before the first `#` is the page path; a specifier without
    /// `#` searches every page.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('#') {
            Some((page, id)) if !page.is_empty() => Self {
                page: Some(page.to_owned()),
                id: id.to_owned(),
            },
            Some((_, id)) => Self {
                page: None,
                id: id.to_owned(),
            },
            None => Self {
                page: None,
                id: spec.to_owned(),
            },
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.page {
            Some(page) => write!(f, "{page}#{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A pending cross-reference, resolved exactly once.
///
/// The `id` doubles as appearance order within the page, which fixes the
/// processing order for reproducible diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossRefRequest {
    /// Mention identifier, unique within the page, in appearance order.
    pub id: u32,
    /// Parsed target specifier.
    pub target: TargetSpec,
    /// Display text of the mention.
    pub text: String,
}

/// A resolved link written back into the AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// Source path of the page owning the anchor.
    pub page: String,
    /// Final anchor identifier on that page.
    pub anchor: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_identifier() {
        let spec = TargetSpec::parse("usage");
        assert_eq!(spec.page, None);
        assert_eq!(spec.id, "usage");
    }

    #[test]
    fn test_parse_with_page_disambiguator() {
        let spec = TargetSpec::parse("guide.md#usage");
        assert_eq!(spec.page.as_deref(), Some("guide.md"));
        assert_eq!(spec.id, "usage");
    }

    #[test]
    fn test_parse_leading_hash_means_no_page() {
        let spec = TargetSpec::parse("#usage");
        assert_eq!(spec.page, None);
        assert_eq!(spec.id, "usage");
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(TargetSpec::parse("guide.md#usage").to_string(), "guide.md#usage");
        assert_eq!(TargetSpec::parse("usage").to_string(), "usage");
    }
}
