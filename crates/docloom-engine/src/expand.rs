//! Expansion engine.
//!
//! Walks each page's AST and replaces directive nodes with content:
//! documentation blocks pull docstrings from the provider, evaluated blocks
//! run in a per-page context, headings and footnotes register anchors, and
//! cross-reference mentions are queued for the resolver. A failing
//! directive leaves a placeholder and a diagnostic; the rest of the page
//! still expands.
//!
//! Pages expand independently (in parallel when configured). The anchor
//! registry serializes registrations internally; per-page diagnostics are
//! buffered and appended in page order so the log is reproducible
//! regardless of worker scheduling.

use std::path::PathBuf;

use rayon::prelude::*;

use docloom_config::BuildConfig;
use docloom_markup::{doctest, doctest_fence_name, slugify};
use docloom_model::{
    AnchorKind, AnchorRegistry, Block, Category, CodeBlock, CodeFragment, ContextHandle,
    CrossRefRequest, Diagnostic, Directive, DocsEntry, Document, ExampleOutput, Expansion,
    FailureNote, FragmentOrigin, Inline, Page, TargetSpec, plain_text,
};
use docloom_providers::{BindingPolicy, EvalOutput};

use crate::error::StageError;
use crate::pipeline::{Stage, StageContext};
use crate::workdir::{ensure_workdir, workdir_for};

/// Directive expansion stage.
pub struct ExpandStage;

impl Stage for ExpandStage {
    fn name(&self) -> &'static str {
        "expand"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["discover"]
    }

    fn run(&mut self, doc: &mut Document, cx: &StageContext) -> Result<(), StageError> {
        let config = &doc.config;
        let anchors = &doc.anchors;
        let pages = &mut doc.pages;

        let page_diagnostics: Vec<Vec<Diagnostic>> = if config.parallel {
            pages
                .par_iter_mut()
                .enumerate()
                .map(|(idx, page)| expand_page(idx, page, anchors, config, cx))
                .collect()
        } else {
            pages
                .iter_mut()
                .enumerate()
                .map(|(idx, page)| expand_page(idx, page, anchors, config, cx))
                .collect()
        };

        for diagnostics in page_diagnostics {
            doc.diagnostics.extend(diagnostics);
        }
        Ok(())
    }
}

/// Expand one page, returning its buffered diagnostics.
fn expand_page(
    page_idx: usize,
    page: &mut Page,
    anchors: &AnchorRegistry,
    config: &BuildConfig,
    cx: &StageContext,
) -> Vec<Diagnostic> {
    let mut expansion = PageExpansion {
        page_idx,
        page_path: page.source_path.clone(),
        anchors,
        config,
        cx,
        diagnostics: Vec::new(),
        fragments: Vec::new(),
        page_anchors: Vec::new(),
        context: None,
        seen_code_block: false,
    };

    let blocks = std::mem::take(&mut page.ast);
    let mut out = Vec::with_capacity(blocks.len());
    for block in blocks {
        expansion.expand_block(block, &mut out);
    }

    // Mentions get their request ids in document order, after expansion has
    // spliced in docstring bodies.
    let mut next_id = 0u32;
    let mut requests = Vec::new();
    for block in &mut out {
        assign_xrefs_block(block, &mut next_id, &mut requests);
    }

    page.ast = out;
    page.pending_refs = requests;
    page.fragments = expansion.fragments;
    page.anchors = expansion.page_anchors;
    page.context = expansion.context;
    expansion.diagnostics
}

struct PageExpansion<'a> {
    page_idx: usize,
    page_path: PathBuf,
    anchors: &'a AnchorRegistry,
    config: &'a BuildConfig,
    cx: &'a StageContext,
    diagnostics: Vec<Diagnostic>,
    fragments: Vec<CodeFragment>,
    page_anchors: Vec<String>,
    context: Option<ContextHandle>,
    seen_code_block: bool,
}

impl PageExpansion<'_> {
    fn diag(&mut self, category: Category, message: String) {
        self.diagnostics
            .push(Diagnostic::new(category, self.page_path.clone(), message));
    }

    fn expand_block(&mut self, block: Block, out: &mut Vec<Block>) {
        match block {
            Block::Heading(mut heading) => {
                let slug = slugify(&plain_text(&heading.inlines));
                match self
                    .anchors
                    .register(self.page_idx, AnchorKind::Heading, &slug, heading.line)
                {
                    Ok(id) => {
                        self.page_anchors.push(id.clone());
                        heading.anchor = Some(id);
                    }
                    Err(e) => self.diag(
                        Category::ParseError,
                        format!(
                            "heading '{}' at line {}: {e}",
                            plain_text(&heading.inlines),
                            heading.line
                        ),
                    ),
                }
                out.push(Block::Heading(heading));
            }
            Block::Footnote(mut footnote) => {
                let id = format!("fn-{}", footnote.label);
                match self
                    .anchors
                    .register(self.page_idx, AnchorKind::Footnote, &id, footnote.line)
                {
                    Ok(id) => {
                        self.page_anchors.push(id.clone());
                        footnote.anchor = Some(id);
                    }
                    Err(e) => self.diag(
                        Category::ParseError,
                        format!("footnote '{}' at line {}: {e}", footnote.label, footnote.line),
                    ),
                }
                out.push(Block::Footnote(footnote));
            }
            Block::Directive(directive) => self.expand_directive(directive, out),
            Block::Code(code) => self.expand_code(code, out),
            other => out.push(other),
        }
    }

    fn expand_directive(&mut self, directive: Directive, out: &mut Vec<Block>) {
        match directive {
            Directive::Docs { bindings, line } => {
                for binding in bindings {
                    self.expand_binding(&binding, line, out);
                }
            }
            Directive::AutoDocs {
                module,
                order,
                filter,
                line,
            } => {
                let policy = BindingPolicy { order, filter };
                let bindings = self.cx.collaborators.docs.list_bindings(&module, &policy);
                if bindings.is_empty() {
                    let message = format!(
                        "autodocs block at line {line}: module '{module}' has no matching bindings"
                    );
                    self.diag(Category::AutodocsBlock, message.clone());
                    out.push(failure("autodocs", message));
                    return;
                }
                for binding in bindings {
                    self.expand_binding(&binding, line, out);
                }
            }
            Directive::Example { name, code, line } => {
                let result = self.evaluate(&code);
                if let Some(error) = result.error {
                    let message = format!(
                        "example block{} at line {line} failed: {error}",
                        name_suffix(name.as_deref())
                    );
                    self.diag(Category::ExampleBlock, message.clone());
                    out.push(failure("example", message));
                } else {
                    out.push(Block::Expansion(Expansion::Example(ExampleOutput {
                        code: Some(code),
                        output: result.output,
                        value: result.value,
                    })));
                }
            }
            Directive::Eval { code, line } => {
                let result = self.evaluate(&code);
                if let Some(error) = result.error {
                    let message = format!("eval block at line {line} failed: {error}");
                    self.diag(Category::EvalBlock, message.clone());
                    out.push(failure("eval", message));
                } else {
                    out.push(Block::Expansion(Expansion::Example(ExampleOutput {
                        code: None,
                        output: result.output,
                        value: result.value,
                    })));
                }
            }
            Directive::Setup { name, code, line } => {
                let result = self.evaluate(&code);
                if let Some(error) = result.error {
                    let message = format!(
                        "setup block{} at line {line} failed: {error}",
                        name_suffix(name.as_deref())
                    );
                    self.diag(Category::SetupBlock, message.clone());
                    out.push(failure("setup", message));
                }
                // Successful setup leaves no rendered content.
            }
        }
    }

    /// Expand a single binding into a documentation entry.
    fn expand_binding(&mut self, binding: &str, line: usize, out: &mut Vec<Block>) {
        let entries = self.cx.collaborators.docs.lookup(binding);

        match entries.as_slice() {
            [] => {
                let message = format!("no documentation found for '{binding}'");
                self.diag(Category::DocsBlock, message.clone());
                out.push(failure("docs", message));
            }
            [entry] => {
                let anchor = match self.anchors.register(
                    self.page_idx,
                    AnchorKind::Binding,
                    binding,
                    line,
                ) {
                    Ok(anchor) => anchor,
                    Err(e) => {
                        let message = format!("cannot register anchor for '{binding}': {e}");
                        self.diag(Category::DocsBlock, message.clone());
                        out.push(failure("docs", message));
                        return;
                    }
                };
                self.page_anchors.push(anchor.clone());

                if entry.text.trim().is_empty() {
                    self.diag(
                        Category::MissingDocs,
                        format!("'{binding}' has no documentation text"),
                    );
                }

                let parsed = self.cx.collaborators.parser.parse(&entry.text);
                for issue in parsed.issues {
                    self.diag(
                        Category::ParseError,
                        format!("in documentation for '{binding}': {issue}"),
                    );
                }

                self.collect_docstring_fragments(&parsed.blocks, &entry.location);
                out.push(Block::Expansion(Expansion::Docs(DocsEntry {
                    binding: binding.to_owned(),
                    anchor,
                    location: entry.location.clone(),
                    body: parsed.blocks,
                })));
            }
            multiple => {
                let locations: Vec<&str> =
                    multiple.iter().map(|e| e.location.as_str()).collect();
                let message = format!(
                    "ambiguous binding '{binding}': {} matches ({})",
                    multiple.len(),
                    locations.join(", ")
                );
                self.diag(Category::DocsBlock, message.clone());
                out.push(failure("docs", message));
            }
        }
    }

    fn expand_code(&mut self, mut code: CodeBlock, out: &mut Vec<Block>) {
        if let Some(info) = &code.language
            && let Some(name) = doctest_fence_name(info)
        {
            self.fragments
                .push(doctest::parse_fragment(&code.text, code.line, name));
            self.seen_code_block = true;
            out.push(Block::Code(code));
            return;
        }

        // The leading unlabeled block may get a cosmetic highlight language.
        if code.language.is_none()
            && !self.seen_code_block
            && let Some(language) = &self.config.plain_block_language
        {
            code.language = Some(language.clone());
        }
        self.seen_code_block = true;
        out.push(Block::Code(code));
    }

    /// Doctest fragments inside docstring bodies execute like page
    /// fragments but cannot be rewritten by fix mode.
    fn collect_docstring_fragments(&mut self, body: &[Block], location: &str) {
        for block in body {
            if let Block::Code(code) = block
                && let Some(info) = &code.language
                && let Some(name) = doctest_fence_name(info)
            {
                let mut fragment = doctest::parse_fragment(&code.text, code.line, name);
                fragment.origin = FragmentOrigin::Docstring(location.to_owned());
                self.fragments.push(fragment);
            }
        }
    }

    fn evaluate(&mut self, code: &str) -> EvalOutput {
        let context = self.ensure_context();
        self.cx.collaborators.evaluator.execute(context, code)
    }

    /// Per-page evaluation context, created on first use.
    fn ensure_context(&mut self) -> ContextHandle {
        if let Some(context) = self.context {
            return context;
        }
        let dir = workdir_for(self.config, &self.page_path);
        ensure_workdir(&dir);
        let context = self.cx.collaborators.evaluator.create_context(&dir);
        self.context = Some(context);
        context
    }
}

fn failure(directive: &'static str, message: String) -> Block {
    Block::Expansion(Expansion::Failure(FailureNote { directive, message }))
}

fn name_suffix(name: Option<&str>) -> String {
    name.map(|n| format!(" '{n}'")).unwrap_or_default()
}

/// Assign request ids to unresolved mentions, depth-first.
pub(crate) fn assign_xrefs_block(
    block: &mut Block,
    next: &mut u32,
    requests: &mut Vec<CrossRefRequest>,
) {
    match block {
        Block::Paragraph(inlines) => assign_xrefs_inlines(inlines, next, requests),
        Block::Heading(h) => assign_xrefs_inlines(&mut h.inlines, next, requests),
        Block::Footnote(f) => assign_xrefs_inlines(&mut f.inlines, next, requests),
        Block::List(list) => {
            for item in &mut list.items {
                assign_xrefs_inlines(item, next, requests);
            }
        }
        Block::Expansion(Expansion::Docs(entry)) => {
            for nested in &mut entry.body {
                assign_xrefs_block(nested, next, requests);
            }
        }
        _ => {}
    }
}

fn assign_xrefs_inlines(
    inlines: &mut Vec<Inline>,
    next: &mut u32,
    requests: &mut Vec<CrossRefRequest>,
) {
    for inline in inlines {
        match inline {
            Inline::Xref(mention) if mention.id.is_none() => {
                mention.id = Some(*next);
                requests.push(CrossRefRequest {
                    id: *next,
                    target: TargetSpec::parse(&mention.target),
                    text: mention.text.clone(),
                });
                *next += 1;
            }
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Link { text: inner, .. } => {
                assign_xrefs_inlines(inner, next, requests);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use docloom_markup::{MarkdownParser, MarkupParser};
    use docloom_providers::{MockDocProvider, MockEvaluator};
    use pretty_assertions::assert_eq;

    use crate::pipeline::Collaborators;

    use super::*;

    fn context(docs: MockDocProvider, evaluator: MockEvaluator) -> StageContext {
        StageContext {
            collaborators: Collaborators::new(Arc::new(docs), Arc::new(evaluator)),
        }
    }

    fn page_from(source_path: &str, text: &str) -> Page {
        let outcome = MarkdownParser::new().parse(text);
        Page::new(source_path, text, outcome.blocks)
    }

    fn expand_one(page: &mut Page, cx: &StageContext) -> (AnchorRegistry, Vec<Diagnostic>) {
        let anchors = AnchorRegistry::new();
        let config = BuildConfig::default_with_base(Path::new("/test"));
        let diagnostics = expand_page(0, page, &anchors, &config, cx);
        (anchors, diagnostics)
    }

    #[test]
    fn test_headings_register_anchors_with_suffix() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("guide.md", "# Usage\n\n## Usage\n");

        let (anchors, diagnostics) = expand_one(&mut page, &cx);

        assert!(diagnostics.is_empty());
        assert_eq!(page.anchors, vec!["usage", "usage-1"]);
        assert_eq!(anchors.find("usage").len(), 1);
        assert_eq!(anchors.find("usage-1").len(), 1);

        let Block::Heading(h) = &page.ast[1] else {
            panic!("expected heading");
        };
        assert_eq!(h.anchor.as_deref(), Some("usage-1"));
    }

    #[test]
    fn test_docs_block_expands_to_entry() {
        let docs = MockDocProvider::new().with_doc("pkg.greet", "Says **hello**.", "src/pkg.rs:10");
        let cx = context(docs, MockEvaluator::new());
        let mut page = page_from("api.md", "```docs\npkg.greet\n```\n");

        let (anchors, diagnostics) = expand_one(&mut page, &cx);

        assert!(diagnostics.is_empty());
        assert_eq!(anchors.find("pkg.greet").len(), 1);
        let Block::Expansion(Expansion::Docs(entry)) = &page.ast[0] else {
            panic!("expected docs entry, got {:?}", page.ast[0]);
        };
        assert_eq!(entry.binding, "pkg.greet");
        assert_eq!(entry.location, "src/pkg.rs:10");
        assert!(!entry.body.is_empty());
    }

    #[test]
    fn test_docs_block_missing_binding() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("api.md", "```docs\npkg.ghost\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, Category::DocsBlock);
        assert!(matches!(
            &page.ast[0],
            Block::Expansion(Expansion::Failure(_))
        ));
    }

    #[test]
    fn test_docs_block_ambiguous_binding() {
        let docs = MockDocProvider::new()
            .with_doc("pkg.item", "First.", "a.rs:1")
            .with_doc("pkg.item", "Second.", "b.rs:2");
        let cx = context(docs, MockEvaluator::new());
        let mut page = page_from("api.md", "```docs\npkg.item\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, Category::DocsBlock);
        assert!(diagnostics[0].message.contains("a.rs:1"));
        assert!(diagnostics[0].message.contains("b.rs:2"));
    }

    #[test]
    fn test_empty_docstring_is_coverage_gap() {
        let docs = MockDocProvider::new().with_doc("pkg.bare", "", "src/lib.rs:5");
        let cx = context(docs, MockEvaluator::new());
        let mut page = page_from("api.md", "```docs\npkg.bare\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, Category::MissingDocs);
        // The entry still renders.
        assert!(matches!(&page.ast[0], Block::Expansion(Expansion::Docs(_))));
    }

    #[test]
    fn test_autodocs_expands_every_binding() {
        let docs = MockDocProvider::new()
            .with_doc("pkg.a", "Doc a.", "a.rs:1")
            .with_doc("pkg.b", "Doc b.", "b.rs:1")
            .with_binding("pkg", "pkg.a")
            .with_binding("pkg", "pkg.b");
        let cx = context(docs, MockEvaluator::new());
        let mut page = page_from("api.md", "```autodocs\nmodule = pkg\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert!(diagnostics.is_empty());
        assert_eq!(page.ast.len(), 2);
        assert!(matches!(&page.ast[0], Block::Expansion(Expansion::Docs(e)) if e.binding == "pkg.a"));
        assert!(matches!(&page.ast[1], Block::Expansion(Expansion::Docs(e)) if e.binding == "pkg.b"));
    }

    #[test]
    fn test_autodocs_empty_module() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("api.md", "```autodocs\nmodule = ghost\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, Category::AutodocsBlock);
    }

    #[test]
    fn test_example_block_renders_output() {
        let evaluator = MockEvaluator::new().with_response(
            "plot()\n",
            docloom_providers::EvalOutput::value("drawing\n", "Figure(1)"),
        );
        let cx = context(MockDocProvider::new(), evaluator);
        let mut page = page_from("guide.md", "```example\nplot()\n```\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert!(diagnostics.is_empty());
        let Block::Expansion(Expansion::Example(output)) = &page.ast[0] else {
            panic!("expected example output");
        };
        assert_eq!(output.code.as_deref(), Some("plot()\n"));
        assert_eq!(output.output, "drawing\n");
        assert_eq!(output.value.as_deref(), Some("Figure(1)"));
    }

    #[test]
    fn test_failing_example_keeps_rest_of_page() {
        let evaluator = MockEvaluator::new().with_error("boom()\n", "exploded");
        let cx = context(MockDocProvider::new(), evaluator);
        let mut page = page_from("guide.md", "```example\nboom()\n```\n\n# Usage\n");

        let (anchors, diagnostics) = expand_one(&mut page, &cx);

        // One diagnostic for the block, heading anchor still registered.
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].category, Category::ExampleBlock);
        assert_eq!(anchors.find("usage").len(), 1);
        assert!(matches!(
            &page.ast[0],
            Block::Expansion(Expansion::Failure(note)) if note.directive == "example"
        ));
    }

    #[test]
    fn test_setup_block_disappears_on_success() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("guide.md", "```setup\nx = 1\n```\n\ntext\n");

        let (_, diagnostics) = expand_one(&mut page, &cx);

        assert!(diagnostics.is_empty());
        assert_eq!(page.ast.len(), 1);
        assert!(matches!(&page.ast[0], Block::Paragraph(_)));
    }

    #[test]
    fn test_page_context_is_shared_within_page() {
        let evaluator = Arc::new(MockEvaluator::new());
        let collaborators = Collaborators::new(
            Arc::new(MockDocProvider::new()),
            Arc::clone(&evaluator) as Arc<dyn docloom_providers::CodeEvaluator>,
        );
        let cx = StageContext { collaborators };
        let mut page = page_from(
            "guide.md",
            "```setup\nx = 1\n```\n\n```example\nx + 1\n```\n",
        );

        expand_one(&mut page, &cx);

        // Both blocks ran in the same per-page context, in source order.
        let executions = evaluator.executions();
        assert_eq!(executions.len(), 2);
        assert_eq!(executions[0].0, executions[1].0);
        assert_eq!(executions[0].1, "x = 1\n");
        assert_eq!(executions[1].1, "x + 1\n");
        assert_eq!(page.context, Some(executions[0].0));
    }

    #[test]
    fn test_contexts_not_shared_across_pages() {
        let evaluator = MockEvaluator::new();
        let docs = MockDocProvider::new();
        let collaborators =
            Collaborators::new(Arc::new(docs), Arc::new(evaluator));
        let cx = StageContext {
            collaborators: collaborators.clone(),
        };

        let anchors = AnchorRegistry::new();
        let config = BuildConfig::default_with_base(Path::new("/test"));

        let mut first = page_from("a.md", "```eval\n1\n```\n");
        let mut second = page_from("b.md", "```eval\n2\n```\n");
        expand_page(0, &mut first, &anchors, &config, &cx);
        expand_page(1, &mut second, &anchors, &config, &cx);

        assert_ne!(first.context, second.context);
    }

    #[test]
    fn test_xref_mentions_become_requests() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("guide.md", "see :ref[usage] and :ref[api.md#items]\n");

        expand_one(&mut page, &cx);

        assert_eq!(page.pending_refs.len(), 2);
        assert_eq!(page.pending_refs[0].id, 0);
        assert_eq!(page.pending_refs[0].target.id, "usage");
        assert_eq!(page.pending_refs[1].target.page.as_deref(), Some("api.md"));
    }

    #[test]
    fn test_doctest_blocks_become_fragments() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let mut page = page_from("guide.md", "```doctest\n1 + 1\n# output\n2\n```\n");

        expand_one(&mut page, &cx);

        assert_eq!(page.fragments.len(), 1);
        assert_eq!(page.fragments[0].origin, FragmentOrigin::Page);
        assert!(page.fragments[0].expectation.is_recorded());
        // The block itself stays rendered as code.
        assert!(matches!(&page.ast[0], Block::Code(_)));
    }

    #[test]
    fn test_docstring_doctests_collected() {
        let docs = MockDocProvider::new().with_doc(
            "pkg.f",
            "Adds numbers.\n\n```doctest\n>>> f(1)\n1\n```\n",
            "src/lib.rs:3",
        );
        let cx = context(docs, MockEvaluator::new());
        let mut page = page_from("api.md", "```docs\npkg.f\n```\n");

        expand_one(&mut page, &cx);

        assert_eq!(page.fragments.len(), 1);
        assert_eq!(
            page.fragments[0].origin,
            FragmentOrigin::Docstring("src/lib.rs:3".to_owned())
        );
    }

    #[test]
    fn test_leading_plain_block_gets_language() {
        let cx = context(MockDocProvider::new(), MockEvaluator::new());
        let anchors = AnchorRegistry::new();
        let mut config = BuildConfig::default_with_base(Path::new("/test"));
        config.plain_block_language = Some("text".to_owned());

        let mut page = page_from("guide.md", "```\nraw output\n```\n\n```\nsecond\n```\n");
        expand_page(0, &mut page, &anchors, &config, &cx);

        let Block::Code(first) = &page.ast[0] else {
            panic!("expected code");
        };
        let Block::Code(second) = &page.ast[1] else {
            panic!("expected code");
        };
        assert_eq!(first.language.as_deref(), Some("text"));
        assert_eq!(second.language, None);
    }
}
