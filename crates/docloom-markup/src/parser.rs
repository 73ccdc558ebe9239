//! Built-in markdown parser.
//!
//! Walks pulldown-cmark events and builds the document AST. Directive
//! fences become validated [`Directive`] nodes (or degrade to plain code
//! with a recorded issue), text runs are scanned for `:ref[...]` mentions,
//! and footnote references become cross-reference mentions targeting the
//! footnote's anchor.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use docloom_model::{Block, CodeBlock, Footnote, Heading, Inline, ListBlock};

use crate::directive::{FenceKind, ParseIssue, build_directive, classify_fence};
use crate::inline::scan_text;

/// Result of parsing one page.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Parsed blocks in source order.
    pub blocks: Vec<Block>,
    /// Parse issues (malformed directives and the like).
    pub issues: Vec<ParseIssue>,
}

/// Markup parser collaborator.
///
/// The engine only depends on this trait; [`MarkdownParser`] is the
/// built-in implementation.
pub trait MarkupParser: Send + Sync {
    /// Parse source text into blocks plus any parse issues.
    fn parse(&self, text: &str) -> ParseOutcome;
}

/// Built-in markdown parser over pulldown-cmark.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl MarkdownParser {
    /// Create a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn parser_options() -> Options {
        Options::ENABLE_FOOTNOTES
    }
}

impl MarkupParser for MarkdownParser {
    fn parse(&self, text: &str) -> ParseOutcome {
        let lines = LineIndex::new(text);
        let parser = Parser::new_ext(text, Self::parser_options());
        let mut builder = Builder::new(lines);

        for (event, range) in parser.into_offset_iter() {
            builder.event(event, range.start);
        }

        builder.finish()
    }
}

/// Maps byte offsets to 1-based line numbers.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

/// Inline container being assembled.
enum Frame {
    Base(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Link { url: String, inlines: Vec<Inline> },
}

impl Frame {
    fn inlines_mut(&mut self) -> &mut Vec<Inline> {
        match self {
            Self::Base(inlines)
            | Self::Emphasis(inlines)
            | Self::Strong(inlines)
            | Self::Link { inlines, .. } => inlines,
        }
    }
}

/// Block container being assembled.
enum BlockCtx {
    Paragraph,
    Heading { level: u8, line: usize },
    FootnoteDef { label: String, line: usize },
    List { ordered: bool, items: Vec<Vec<Inline>> },
    Item,
}

/// Fenced or indented code block being accumulated.
struct CodeAccum {
    info: String,
    text: String,
    line: usize,
}

struct Builder {
    lines: LineIndex,
    blocks: Vec<Block>,
    issues: Vec<ParseIssue>,
    frames: Vec<Frame>,
    ctx: Vec<BlockCtx>,
    code: Option<CodeAccum>,
}

impl Builder {
    fn new(lines: LineIndex) -> Self {
        Self {
            lines,
            blocks: Vec::new(),
            issues: Vec::new(),
            frames: Vec::new(),
            ctx: Vec::new(),
            code: None,
        }
    }

    fn finish(self) -> ParseOutcome {
        ParseOutcome {
            blocks: self.blocks,
            issues: self.issues,
        }
    }

    fn event(&mut self, event: Event<'_>, offset: usize) {
        match event {
            Event::Start(tag) => self.start(tag, offset),
            Event::End(tag) => self.end(tag),
            Event::Text(t) => self.text(&t),
            Event::Code(t) => self.push_inline(Inline::Code(t.into_string())),
            Event::SoftBreak => self.push_inline(Inline::Text(" ".to_owned())),
            Event::HardBreak => self.push_inline(Inline::Text("\n".to_owned())),
            Event::FootnoteReference(label) => {
                self.push_inline(Inline::Xref(docloom_model::XrefMention {
                    id: None,
                    target: format!("fn-{label}"),
                    text: label.into_string(),
                    resolved: None,
                }));
            }
            Event::Rule => self.blocks.push(Block::Rule),
            Event::InlineHtml(html) => self.push_inline(Inline::Text(html.into_string())),
            // Raw block HTML, task markers and math carry no model meaning.
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, offset: usize) {
        match tag {
            Tag::Paragraph => {
                // Paragraph breaks inside items and footnotes just separate
                // the collected text.
                if self.in_flat_context() {
                    self.separate();
                } else {
                    self.ctx.push(BlockCtx::Paragraph);
                    self.frames.push(Frame::Base(Vec::new()));
                }
            }
            Tag::Heading { level, .. } => {
                self.ctx.push(BlockCtx::Heading {
                    level: heading_level_to_num(level),
                    line: self.lines.line_of(offset),
                });
                self.frames.push(Frame::Base(Vec::new()));
            }
            Tag::FootnoteDefinition(label) => {
                self.ctx.push(BlockCtx::FootnoteDef {
                    label: label.into_string(),
                    line: self.lines.line_of(offset),
                });
                self.frames.push(Frame::Base(Vec::new()));
            }
            Tag::List(start) => {
                self.ctx.push(BlockCtx::List {
                    ordered: start.is_some(),
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.ctx.push(BlockCtx::Item);
                self.frames.push(Frame::Base(Vec::new()));
            }
            Tag::CodeBlock(kind) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.into_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeAccum {
                    info,
                    text: String::new(),
                    line: self.lines.line_of(offset),
                });
            }
            Tag::Emphasis => self.frames.push(Frame::Emphasis(Vec::new())),
            Tag::Strong => self.frames.push(Frame::Strong(Vec::new())),
            Tag::Link { dest_url, .. } => self.frames.push(Frame::Link {
                url: dest_url.into_string(),
                inlines: Vec::new(),
            }),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if !self.in_flat_context() {
                    let inlines = self.pop_base();
                    self.ctx.pop();
                    self.blocks.push(Block::Paragraph(inlines));
                }
            }
            TagEnd::Heading(_) => {
                let inlines = self.pop_base();
                if let Some(BlockCtx::Heading { level, line }) = self.ctx.pop() {
                    self.blocks.push(Block::Heading(Heading {
                        level,
                        inlines,
                        anchor: None,
                        line,
                    }));
                }
            }
            TagEnd::FootnoteDefinition => {
                let inlines = self.pop_base();
                if let Some(BlockCtx::FootnoteDef { label, line }) = self.ctx.pop() {
                    self.blocks.push(Block::Footnote(Footnote {
                        label,
                        inlines,
                        anchor: None,
                        line,
                    }));
                }
            }
            TagEnd::Item => {
                let inlines = self.pop_base();
                self.ctx.pop();
                if let Some(BlockCtx::List { items, .. }) = self.innermost_list() {
                    items.push(inlines);
                }
            }
            TagEnd::List(_) => {
                if let Some(BlockCtx::List { ordered, items }) = self.ctx.pop() {
                    // Nested lists fold their items into the enclosing list.
                    match self.innermost_list() {
                        Some(BlockCtx::List { items: outer, .. }) => outer.extend(items),
                        _ => self.blocks.push(Block::List(ListBlock { ordered, items })),
                    }
                }
            }
            TagEnd::CodeBlock => self.finish_code(),
            TagEnd::Emphasis => {
                if let Some(Frame::Emphasis(inlines)) = self.frames.pop() {
                    self.push_inline(Inline::Emphasis(inlines));
                }
            }
            TagEnd::Strong => {
                if let Some(Frame::Strong(inlines)) = self.frames.pop() {
                    self.push_inline(Inline::Strong(inlines));
                }
            }
            TagEnd::Link => {
                if let Some(Frame::Link { url, inlines }) = self.frames.pop() {
                    self.push_inline(Inline::Link { text: inlines, url });
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code {
            code.text.push_str(text);
            return;
        }
        for inline in scan_text(text) {
            self.push_inline(inline);
        }
    }

    fn finish_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };

        match classify_fence(&code.info) {
            FenceKind::Plain { language } => self.blocks.push(Block::Code(CodeBlock {
                language,
                text: code.text,
                line: code.line,
            })),
            FenceKind::Doctest => self.blocks.push(Block::Code(CodeBlock {
                language: Some(code.info),
                text: code.text,
                line: code.line,
            })),
            FenceKind::Directive(keyword) => {
                match build_directive(keyword, &code.text, code.line) {
                    Ok(directive) => self.blocks.push(Block::Directive(directive)),
                    Err(issue) => {
                        // Degrade to plain code so the page still renders.
                        self.issues.push(issue);
                        self.blocks.push(Block::Code(CodeBlock {
                            language: None,
                            text: code.text,
                            line: code.line,
                        }));
                    }
                }
            }
        }
    }

    /// True when inlines are being collected across paragraph boundaries
    /// (list items, footnote definitions).
    fn in_flat_context(&self) -> bool {
        matches!(
            self.ctx.last(),
            Some(BlockCtx::Item | BlockCtx::FootnoteDef { .. })
        )
    }

    /// Add a space between flattened paragraphs.
    fn separate(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            let inlines = frame.inlines_mut();
            if !inlines.is_empty() {
                inlines.push(Inline::Text(" ".to_owned()));
            }
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        if self.frames.is_empty() {
            // Stray inline content outside any container opens a paragraph.
            self.ctx.push(BlockCtx::Paragraph);
            self.frames.push(Frame::Base(Vec::new()));
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.inlines_mut().push(inline);
        }
    }

    fn pop_base(&mut self) -> Vec<Inline> {
        // Unclosed emphasis/link frames collapse into their parent.
        loop {
            match self.frames.pop() {
                None => return Vec::new(),
                Some(Frame::Base(inlines)) => return inlines,
                Some(
                    Frame::Emphasis(inner)
                    | Frame::Strong(inner)
                    | Frame::Link { inlines: inner, .. },
                ) => {
                    for inline in inner {
                        self.push_inline(inline);
                    }
                }
            }
        }
    }

    fn innermost_list(&mut self) -> Option<&mut BlockCtx> {
        self.ctx
            .iter_mut()
            .rev()
            .find(|c| matches!(c, BlockCtx::List { .. }))
    }
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use docloom_model::{Directive, plain_text};
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(text: &str) -> ParseOutcome {
        MarkdownParser::new().parse(text)
    }

    #[test]
    fn test_heading_with_line() {
        let outcome = parse("intro\n\n## Usage\n");
        assert_eq!(outcome.blocks.len(), 2);
        let Block::Heading(h) = &outcome.blocks[1] else {
            panic!("expected heading, got {:?}", outcome.blocks[1]);
        };
        assert_eq!(h.level, 2);
        assert_eq!(plain_text(&h.inlines), "Usage");
        assert_eq!(h.line, 3);
        assert_eq!(h.anchor, None);
    }

    #[test]
    fn test_paragraph_with_styles() {
        let outcome = parse("plain *em* **strong** `code`");
        let Block::Paragraph(inlines) = &outcome.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&inlines[1], Inline::Emphasis(_)));
        assert!(matches!(&inlines[3], Inline::Strong(_)));
        assert!(inlines.iter().any(|i| matches!(i, Inline::Code(c) if c == "code")));
    }

    #[test]
    fn test_xref_mention_in_paragraph() {
        let outcome = parse("see :ref[usage] here");
        let Block::Paragraph(inlines) = &outcome.blocks[0] else {
            panic!("expected paragraph");
        };
        let Inline::Xref(mention) = &inlines[1] else {
            panic!("expected xref, got {:?}", inlines[1]);
        };
        assert_eq!(mention.target, "usage");
        assert!(mention.id.is_none());
    }

    #[test]
    fn test_docs_directive() {
        let outcome = parse("```docs\npkg.alpha\npkg.beta\n```\n");
        assert_eq!(outcome.issues.len(), 0);
        let Block::Directive(Directive::Docs { bindings, line }) = &outcome.blocks[0] else {
            panic!("expected docs directive, got {:?}", outcome.blocks[0]);
        };
        assert_eq!(bindings, &["pkg.alpha", "pkg.beta"]);
        assert_eq!(*line, 1);
    }

    #[test]
    fn test_malformed_directive_degrades() {
        let outcome = parse("```docs\n```\n");
        assert_eq!(outcome.issues.len(), 1);
        assert!(outcome.issues[0].message.contains("no bindings"));
        assert!(matches!(&outcome.blocks[0], Block::Code(_)));
    }

    #[test]
    fn test_example_directive_keeps_code() {
        let outcome = parse("```example plotting\ndraw()\n```\n");
        let Block::Directive(Directive::Example { name, code, .. }) = &outcome.blocks[0] else {
            panic!("expected example directive");
        };
        assert_eq!(name.as_deref(), Some("plotting"));
        assert_eq!(code, "draw()\n");
    }

    #[test]
    fn test_doctest_block_stays_code() {
        let outcome = parse("```doctest\n1 + 1\n# output\n2\n```\n");
        let Block::Code(code) = &outcome.blocks[0] else {
            panic!("expected code block");
        };
        assert_eq!(code.language.as_deref(), Some("doctest"));
        assert!(code.text.contains("# output"));
    }

    #[test]
    fn test_plain_code_block() {
        let outcome = parse("```rust\nfn main() {}\n```\n");
        let Block::Code(code) = &outcome.blocks[0] else {
            panic!("expected code block");
        };
        assert_eq!(code.language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_unlabeled_code_block() {
        let outcome = parse("```\nraw\n```\n");
        let Block::Code(code) = &outcome.blocks[0] else {
            panic!("expected code block");
        };
        assert_eq!(code.language, None);
    }

    #[test]
    fn test_footnote_definition_and_reference() {
        let outcome = parse("text[^note]\n\n[^note]: the footnote\n");
        let Block::Paragraph(inlines) = &outcome.blocks[0] else {
            panic!("expected paragraph");
        };
        let Some(Inline::Xref(mention)) = inlines.iter().find(|i| matches!(i, Inline::Xref(_)))
        else {
            panic!("expected footnote reference");
        };
        assert_eq!(mention.target, "fn-note");

        let Some(Block::Footnote(footnote)) = outcome
            .blocks
            .iter()
            .find(|b| matches!(b, Block::Footnote(_)))
        else {
            panic!("expected footnote definition");
        };
        assert_eq!(footnote.label, "note");
        assert_eq!(plain_text(&footnote.inlines), "the footnote");
    }

    #[test]
    fn test_list_items() {
        let outcome = parse("- one\n- two\n");
        let Block::List(list) = &outcome.blocks[0] else {
            panic!("expected list");
        };
        assert!(!list.ordered);
        assert_eq!(list.items.len(), 2);
        assert_eq!(plain_text(&list.items[1]), "two");
    }

    #[test]
    fn test_ordered_list() {
        let outcome = parse("1. first\n2. second\n");
        let Block::List(list) = &outcome.blocks[0] else {
            panic!("expected list");
        };
        assert!(list.ordered);
    }

    #[test]
    fn test_rule() {
        let outcome = parse("a\n\n---\n\nb\n");
        assert!(outcome.blocks.iter().any(|b| matches!(b, Block::Rule)));
    }

    #[test]
    fn test_directive_line_numbers_after_content() {
        let outcome = parse("# Title\n\ntext\n\n```eval\n1 + 1\n```\n");
        let Some(Block::Directive(d)) = outcome
            .blocks
            .iter()
            .find(|b| matches!(b, Block::Directive(_)))
        else {
            panic!("expected directive");
        };
        assert_eq!(d.line(), 5);
    }
}
