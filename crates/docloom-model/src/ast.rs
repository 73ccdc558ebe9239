//! Document AST.
//!
//! A closed set of block and inline node kinds produced by the markup parser
//! and rewritten during expansion and cross-reference resolution. Directive
//! nodes carry validated payloads; anything the parser could not validate is
//! reported as a parse issue, never deferred to dispatch.

use crate::xref::ResolvedLink;

/// Block-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Section heading. Registers an anchor during expansion.
    Heading(Heading),
    /// Plain paragraph.
    Paragraph(Vec<Inline>),
    /// Fenced or indented code block with no directive meaning.
    Code(CodeBlock),
    /// Flat list (ordered or bulleted).
    List(ListBlock),
    /// Footnote definition. Registers an anchor during expansion.
    Footnote(Footnote),
    /// Unexpanded directive. Replaced by [`Block::Expansion`] nodes.
    Directive(Directive),
    /// Content produced by expanding a directive.
    Expansion(Expansion),
    /// Thematic break.
    Rule,
}

/// Section heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading level, 1-6.
    pub level: u8,
    /// Heading content.
    pub inlines: Vec<Inline>,
    /// Registered anchor identifier (set during expansion).
    pub anchor: Option<String>,
    /// 1-based source line.
    pub line: usize,
}

/// Code block carrying its fence info string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language from the fence info string, if any.
    pub language: Option<String>,
    /// Code text without the fence markers.
    pub text: String,
    /// 1-based line of the opening fence.
    pub line: usize,
}

/// Flat list block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBlock {
    /// True for numbered lists.
    pub ordered: bool,
    /// One inline run per item.
    pub items: Vec<Vec<Inline>>,
}

/// Footnote definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footnote {
    /// Footnote label as written in the source.
    pub label: String,
    /// Footnote content.
    pub inlines: Vec<Inline>,
    /// Registered anchor identifier (set during expansion).
    pub anchor: Option<String>,
    /// 1-based source line.
    pub line: usize,
}

/// Inline-level node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// Plain text run.
    Text(String),
    /// Inline code span.
    Code(String),
    /// Emphasized span.
    Emphasis(Vec<Inline>),
    /// Strong span.
    Strong(Vec<Inline>),
    /// Regular hyperlink.
    Link {
        /// Link content.
        text: Vec<Inline>,
        /// Destination URL as written.
        url: String,
    },
    /// Cross-reference mention, resolved after all pages have expanded.
    Xref(XrefMention),
}

/// A `:ref[target]` mention awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefMention {
    /// Request identifier, assigned during expansion. `None` until then.
    pub id: Option<u32>,
    /// Target specifier as written (`identifier` or `page#identifier`).
    pub target: String,
    /// Display text (the target specifier unless overridden).
    pub text: String,
    /// Concrete link, filled in by the resolver on a unique match.
    pub resolved: Option<ResolvedLink>,
}

/// Ordering policy for bulk documentation enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingOrder {
    /// Provider declaration order (the default).
    #[default]
    Declaration,
    /// Lexicographic by binding name.
    Name,
}

/// Directive node with a validated payload.
///
/// The set is closed: the parser either produces one of these variants or a
/// parse issue. Expansion dispatches by matching, so an unknown directive can
/// never reach the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Single-symbol documentation block: one fully-qualified binding per line.
    Docs {
        /// Bindings to document, in source order.
        bindings: Vec<String>,
        /// 1-based line of the opening fence.
        line: usize,
    },
    /// Bulk documentation block over all bindings of a module.
    AutoDocs {
        /// Module whose bindings are enumerated.
        module: String,
        /// Enumeration order.
        order: BindingOrder,
        /// Optional filter pattern applied to binding names.
        filter: Option<String>,
        /// 1-based line of the opening fence.
        line: usize,
    },
    /// Evaluated code block rendered as code plus captured output.
    Example {
        /// Optional block name (shown in failure messages).
        name: Option<String>,
        /// Code to execute in the page context.
        code: String,
        /// 1-based line of the opening fence.
        line: usize,
    },
    /// Evaluated code block rendered as output only.
    Eval {
        /// Code to execute in the page context.
        code: String,
        /// 1-based line of the opening fence.
        line: usize,
    },
    /// Evaluated code block with no rendered output (state setup).
    Setup {
        /// Optional block name (shown in failure messages).
        name: Option<String>,
        /// Code to execute in the page context.
        code: String,
        /// 1-based line of the opening fence.
        line: usize,
    },
}

impl Directive {
    /// Short label used in diagnostics and failure placeholders.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Docs { .. } => "docs",
            Self::AutoDocs { .. } => "autodocs",
            Self::Example { .. } => "example",
            Self::Eval { .. } => "eval",
            Self::Setup { .. } => "setup",
        }
    }

    /// 1-based source line of the directive.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Docs { line, .. }
            | Self::AutoDocs { line, .. }
            | Self::Example { line, .. }
            | Self::Eval { line, .. }
            | Self::Setup { line, .. } => *line,
        }
    }
}

/// Content produced by expanding a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// One documented binding from a docs or autodocs block.
    Docs(DocsEntry),
    /// Rendered code-plus-output from an evaluated block.
    Example(ExampleOutput),
    /// Placeholder for a directive that failed to expand.
    Failure(FailureNote),
}

/// Documentation entry for a single binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsEntry {
    /// Canonical binding name.
    pub binding: String,
    /// Anchor registered under the canonical name.
    pub anchor: String,
    /// Source location reported by the documentation provider.
    pub location: String,
    /// Docstring parsed into blocks.
    pub body: Vec<Block>,
}

/// Captured result of an evaluated code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleOutput {
    /// Executed code, shown for `example` blocks, hidden for `eval`.
    pub code: Option<String>,
    /// Captured stream output.
    pub output: String,
    /// Rendering of the final expression value, if any.
    pub value: Option<String>,
}

/// Placeholder left in place of a failed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNote {
    /// Directive label (`docs`, `example`, ...).
    pub directive: &'static str,
    /// Failure message, mirrored in the diagnostic log.
    pub message: String,
}

/// Flatten an inline run to plain text.
///
/// Used for heading slugs and navigation titles.
#[must_use]
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    collect_text(inlines, &mut out);
    out
}

fn collect_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(t) | Inline::Code(t) => out.push_str(t),
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Link { text: inner, .. } => {
                collect_text(inner, out);
            }
            Inline::Xref(x) => out.push_str(&x.text),
        }
    }
}
