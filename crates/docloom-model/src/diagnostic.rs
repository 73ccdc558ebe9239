//! Build diagnostics.
//!
//! Diagnostics carry a category from a fixed closed set, the page they were
//! raised on and a message. The log is append-only and thread-safe; every
//! push surfaces immediately through `tracing` and the whole log is evaluated
//! once by the strict gate at build end.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// Diagnostic category. The set is closed; the strict gate operates on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Malformed or unresolvable documentation block.
    DocsBlock,
    /// Bulk-enumeration issue.
    AutodocsBlock,
    /// Ambiguous or missing cross-reference.
    CrossReferences,
    /// Doctest mismatch or doctest execution failure.
    Doctest,
    /// Failing `example` block.
    ExampleBlock,
    /// Failing `eval` block.
    EvalBlock,
    /// Failing `setup` block.
    SetupBlock,
    /// External link failure (reported by external stages).
    Linkcheck,
    /// Directive parse or setup failure.
    ParseError,
    /// Documentation coverage gap.
    MissingDocs,
}

impl Category {
    /// Every category, in stable order.
    pub const ALL: [Self; 10] = [
        Self::DocsBlock,
        Self::AutodocsBlock,
        Self::CrossReferences,
        Self::Doctest,
        Self::ExampleBlock,
        Self::EvalBlock,
        Self::SetupBlock,
        Self::Linkcheck,
        Self::ParseError,
        Self::MissingDocs,
    ];

    /// Canonical configuration name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocsBlock => "docs_block",
            Self::AutodocsBlock => "autodocs_block",
            Self::CrossReferences => "cross_references",
            Self::Doctest => "doctest",
            Self::ExampleBlock => "example_block",
            Self::EvalBlock => "eval_block",
            Self::SetupBlock => "setup_block",
            Self::Linkcheck => "linkcheck",
            Self::ParseError => "parse_error",
            Self::MissingDocs => "missing_docs",
        }
    }

    /// Parse a configuration name back into a category.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded build issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category from the closed set.
    pub category: Category,
    /// Source page the issue was raised on.
    pub page: PathBuf,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    #[must_use]
    pub fn new(category: Category, page: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            category,
            page: page.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.category,
            self.page.display(),
            self.message
        )
    }
}

/// Append-only diagnostic log.
///
/// Thread-safe so parallel expansion workers can report through one log.
/// Entries are never removed or reordered once appended.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic, surfacing it immediately.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push(&self, diagnostic: Diagnostic) {
        tracing::warn!(
            category = %diagnostic.category,
            page = %diagnostic.page.display(),
            "{}",
            diagnostic.message
        );
        self.entries.lock().unwrap().push(diagnostic);
    }

    /// Append a batch of diagnostics in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    /// Snapshot of all entries in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().unwrap().clone()
    }

    /// Distinct categories present in the log.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.category)
            .collect()
    }

    /// Entries with the given category.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn with_category(&self, category: Category) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    /// Number of entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True if no diagnostic has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    static_assertions::assert_impl_all!(DiagnosticLog: Send, Sync);

    #[test]
    fn test_category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_name("nonsense"), None);
    }

    #[test]
    fn test_push_preserves_order() {
        let log = DiagnosticLog::new();
        log.push(Diagnostic::new(Category::Doctest, "a.md", "first"));
        log.push(Diagnostic::new(Category::DocsBlock, "b.md", "second"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
    }

    #[test]
    fn test_categories_deduplicate() {
        let log = DiagnosticLog::new();
        log.push(Diagnostic::new(Category::Doctest, "a.md", "x"));
        log.push(Diagnostic::new(Category::Doctest, "b.md", "y"));
        log.push(Diagnostic::new(Category::CrossReferences, "a.md", "z"));

        let categories = log.categories();
        assert_eq!(categories.len(), 2);
        assert!(categories.contains(&Category::Doctest));
        assert!(categories.contains(&Category::CrossReferences));
    }

    #[test]
    fn test_with_category_filters() {
        let log = DiagnosticLog::new();
        log.push(Diagnostic::new(Category::Doctest, "a.md", "x"));
        log.push(Diagnostic::new(Category::EvalBlock, "a.md", "y"));

        let doctests = log.with_category(Category::Doctest);
        assert_eq!(doctests.len(), 1);
        assert_eq!(doctests[0].message, "x");
    }

    #[test]
    fn test_display_format() {
        let diagnostic = Diagnostic::new(Category::CrossReferences, Path::new("guide.md"), "no anchor 'usage'");
        assert_eq!(
            diagnostic.to_string(),
            "[cross_references] guide.md: no anchor 'usage'"
        );
    }
}
