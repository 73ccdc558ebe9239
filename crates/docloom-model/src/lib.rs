//! Document model for docloom.
//!
//! Owns the page tree, anchor registry and diagnostic log for one build.
//! Everything here is data plus the invariants guarding it; the stages that
//! mutate a [`Document`] live in `docloom-engine`.
//!
//! # Lifecycle
//!
//! Pages are created at discovery. Expansion mutates page ASTs, populates
//! the anchor registry and emits cross-reference requests and code
//! fragments. The doctest engine consumes fragments; the resolver consumes
//! requests against the completed registry and rewrites ASTs in place.
//! Diagnostics accumulate throughout and are evaluated once by the strict
//! gate at build end.

mod anchor;
mod ast;
mod diagnostic;
mod document;
mod fragment;
mod nav;
mod page;
mod xref;

pub use anchor::{Anchor, AnchorError, AnchorKind, AnchorRegistry};
pub use ast::{
    BindingOrder, Block, CodeBlock, Directive, DocsEntry, ExampleOutput, Expansion, FailureNote,
    Footnote, Heading, Inline, ListBlock, XrefMention, plain_text,
};
pub use diagnostic::{Category, Diagnostic, DiagnosticLog};
pub use document::{Document, DoctestSummary};
pub use fragment::{
    CodeFragment, ContextHandle, Expectation, FragmentOrigin, LineSpan, TranscriptStep,
};
pub use nav::{NavItem, Navigation};
pub use page::{Page, source_path_to_url};
pub use xref::{CrossRefRequest, ResolvedLink, TargetSpec};
