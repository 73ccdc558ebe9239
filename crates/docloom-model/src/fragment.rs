//! Code fragments and evaluation context handles.
//!
//! Fragments are produced during expansion (or collected from raw content in
//! doctest-only mode) and consumed by the doctest engine. The recorded
//! expectation keeps its source span so fix mode can rewrite it in place.

/// Opaque handle to an evaluation context owned by the code evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// 1-based inclusive line range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    /// First line of the span.
    pub start: usize,
    /// Last line of the span.
    pub end: usize,
}

impl LineSpan {
    /// Create a span. `end` is clamped to `start`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of lines covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Spans always cover at least one line.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// One statement/output pair of a transcript expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptStep {
    /// Statement text (without the prompt).
    pub input: String,
    /// Expected output recorded after the statement. May be empty.
    pub expected: String,
}

/// Recorded expectation of a doctest fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// No recorded output; the fragment runs for crash detection only.
    None,
    /// Exact-match text following the `# output` separator.
    Exact {
        /// Expected text.
        text: String,
        /// Span of the expected text in the source file.
        span: LineSpan,
    },
    /// Alternating statement/output transcript.
    Transcript {
        /// Steps in source order.
        steps: Vec<TranscriptStep>,
        /// Span of the whole transcript body in the source file.
        span: LineSpan,
    },
}

impl Expectation {
    /// True if the fragment carries recorded output to compare against.
    #[must_use]
    pub fn is_recorded(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Where a fragment's source text lives.
///
/// Fix mode can only rewrite expectations whose text is in the page file
/// itself; fragments inside provider docstrings keep their diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FragmentOrigin {
    /// Directly in the page source file; spans are file lines.
    #[default]
    Page,
    /// Inside a docstring; the location string names the docstring source.
    Docstring(String),
}

/// An executable code fragment with an optional recorded expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    /// Code to execute. Empty for pure transcripts.
    pub code: String,
    /// Recorded expectation.
    pub expectation: Expectation,
    /// Fragment name; named fragments on one page share a context.
    pub name: Option<String>,
    /// 1-based line of the opening fence.
    pub line: usize,
    /// Where the fragment text lives.
    pub origin: FragmentOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_span_clamps_end() {
        let span = LineSpan::new(10, 3);
        assert_eq!(span.end, 10);
        assert_eq!(span.len(), 1);
    }

    #[test]
    fn test_expectation_recorded() {
        assert!(!Expectation::None.is_recorded());
        let exact = Expectation::Exact {
            text: "2".to_owned(),
            span: LineSpan::new(4, 4),
        };
        assert!(exact.is_recorded());
    }
}
