//! Doctest engine.
//!
//! Executes code fragments with recorded expectations and compares output
//! after applying the configured filters to both sides. In fix mode a
//! mismatch rewrites the recorded expectation at its source span instead of
//! raising a diagnostic; fragments living inside docstrings cannot be
//! rewritten and keep their diagnostics.
//!
//! Fragment order within a page is source order (state dependency); pages
//! are independent and run in parallel when configured.

use std::collections::HashMap;

use rayon::prelude::*;
use regex::Regex;

use docloom_config::{BuildConfig, DoctestMode, FilterRule};
use docloom_markup::{doctest, doctest_fence_name};
use docloom_model::{
    Block, Category, CodeFragment, ContextHandle, Diagnostic, DoctestSummary, Document,
    Expectation, FragmentOrigin, Page,
};

use crate::error::StageError;
use crate::fixup::{Patch, apply_patches};
use crate::pipeline::{Stage, StageContext};
use crate::workdir::{ensure_workdir, workdir_for};

/// Doctest execution stage.
pub struct DoctestStage;

impl Stage for DoctestStage {
    fn name(&self) -> &'static str {
        "doctest"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["discover"]
    }

    fn doctest_relevant(&self) -> bool {
        true
    }

    fn run(&mut self, doc: &mut Document, cx: &StageContext) -> Result<(), StageError> {
        let mode = doc.config.doctest_mode;
        if mode == DoctestMode::Off {
            tracing::debug!("Doctests disabled");
            return Ok(());
        }

        let filters = compile_filters(&doc.config.doctest_filters)
            .map_err(|e| StageError::recoverable(format!("invalid doctest filter: {e}")))?;

        let config = &doc.config;
        let pages = &doc.pages;

        let outcomes: Vec<PageOutcome> = if config.parallel {
            pages
                .par_iter()
                .map(|page| process_page(page, cx, config, &filters, mode))
                .collect()
        } else {
            pages
                .iter()
                .map(|page| process_page(page, cx, config, &filters, mode))
                .collect()
        };

        let mut summary = DoctestSummary::default();
        let mut patches = Vec::new();
        for outcome in outcomes {
            doc.diagnostics.extend(outcome.diagnostics);
            patches.extend(outcome.patches);
            summary.executed += outcome.executed;
            summary.failed += outcome.failed;
            summary.fixed += outcome.fixed;
        }

        if !patches.is_empty() {
            let applied = apply_patches(&config.source_dir, patches)
                .map_err(|e| StageError::recoverable(format!("failed to rewrite doctests: {e}")))?;
            tracing::info!(applied, "Rewrote doctest expectations");
        }

        doc.doctest_summary = Some(summary);
        Ok(())
    }
}

/// Compiled filter: every match is replaced on both sides before comparing.
struct CompiledFilter {
    pattern: Regex,
    replacement: String,
}

fn compile_filters(rules: &[FilterRule]) -> Result<Vec<CompiledFilter>, regex::Error> {
    rules
        .iter()
        .map(|rule| {
            Ok(CompiledFilter {
                pattern: Regex::new(&rule.pattern)?,
                replacement: rule.replacement.clone(),
            })
        })
        .collect()
}

fn normalize(text: &str, filters: &[CompiledFilter]) -> String {
    let mut normalized = text.to_owned();
    for filter in filters {
        normalized = filter
            .pattern
            .replace_all(&normalized, filter.replacement.as_str())
            .into_owned();
    }
    normalized.trim_end().to_owned()
}

#[derive(Default)]
struct PageOutcome {
    diagnostics: Vec<Diagnostic>,
    patches: Vec<Patch>,
    executed: usize,
    failed: usize,
    fixed: usize,
}

/// Execute every fragment of one page in source order.
fn process_page(
    page: &Page,
    cx: &StageContext,
    config: &BuildConfig,
    filters: &[CompiledFilter],
    mode: DoctestMode,
) -> PageOutcome {
    // Doctest-only builds skip expansion, so fragments come from a raw scan.
    let fragments = if mode == DoctestMode::Only {
        collect_fragments(&page.ast)
    } else {
        page.fragments.clone()
    };

    let mut outcome = PageOutcome::default();
    if fragments.is_empty() {
        return outcome;
    }

    let workdir = workdir_for(config, &page.source_path);
    ensure_workdir(&workdir);

    let evaluator = &cx.collaborators.evaluator;
    // Named fragments share a context per name; unnamed ones run fresh.
    let mut named: HashMap<String, ContextHandle> = HashMap::new();

    for fragment in &fragments {
        let context = match &fragment.name {
            Some(name) => *named
                .entry(name.clone())
                .or_insert_with(|| evaluator.create_context(&workdir)),
            None => evaluator.create_context(&workdir),
        };

        outcome.executed += 1;
        let fixable = mode == DoctestMode::Fix && fragment.origin == FragmentOrigin::Page;

        match &fragment.expectation {
            Expectation::None => {
                let result = evaluator.execute(context, &fragment.code);
                if let Some(error) = result.error {
                    outcome.failed += 1;
                    outcome.diagnostics.push(Diagnostic::new(
                        Category::Doctest,
                        page.source_path.clone(),
                        format!("doctest at line {} crashed: {error}", fragment.line),
                    ));
                }
            }
            Expectation::Exact { text, span } => {
                let result = evaluator.execute(context, &fragment.code);
                let actual = match &result.error {
                    Some(e) => format!("error: {e}"),
                    None => result.combined(),
                };

                let expected = normalize(text, filters);
                let actual_n = normalize(&actual, filters);
                if expected == actual_n {
                    continue;
                }

                if fixable {
                    outcome.patches.push(Patch {
                        path: page.source_path.clone(),
                        span: *span,
                        replacement: actual.trim_end().to_owned(),
                    });
                    outcome.fixed += 1;
                } else {
                    outcome.failed += 1;
                    outcome.diagnostics.push(Diagnostic::new(
                        Category::Doctest,
                        page.source_path.clone(),
                        format!(
                            "doctest at line {} failed: expected={expected}, actual={actual_n}",
                            fragment.line
                        ),
                    ));
                }
            }
            Expectation::Transcript { steps, span } => {
                let mut mismatched = false;
                let mut actual_steps = Vec::with_capacity(steps.len());

                for step in steps {
                    let result = evaluator.execute(context, &step.input);
                    let actual = match &result.error {
                        Some(e) => format!("error: {e}"),
                        None => result.combined(),
                    };

                    let expected = normalize(&step.expected, filters);
                    let actual_n = normalize(&actual, filters);
                    if expected != actual_n {
                        mismatched = true;
                        if !fixable {
                            outcome.diagnostics.push(Diagnostic::new(
                                Category::Doctest,
                                page.source_path.clone(),
                                format!(
                                    "doctest at line {} failed on '{}': expected={expected}, actual={actual_n}",
                                    fragment.line, step.input
                                ),
                            ));
                        }
                    }
                    actual_steps.push((step.input.clone(), actual));
                }

                if mismatched {
                    if fixable {
                        outcome.patches.push(Patch {
                            path: page.source_path.clone(),
                            span: *span,
                            replacement: render_transcript(&actual_steps),
                        });
                        outcome.fixed += 1;
                    } else {
                        outcome.failed += 1;
                    }
                }
            }
        }
    }

    outcome
}

/// Doctest fragments from a raw (unexpanded) AST.
fn collect_fragments(blocks: &[Block]) -> Vec<CodeFragment> {
    let mut fragments = Vec::new();
    for block in blocks {
        if let Block::Code(code) = block
            && let Some(info) = &code.language
            && let Some(name) = doctest_fence_name(info)
        {
            fragments.push(doctest::parse_fragment(&code.text, code.line, name));
        }
    }
    fragments
}

/// Rebuild a transcript body from statements and their actual output.
fn render_transcript(steps: &[(String, String)]) -> String {
    let mut out = String::new();
    for (input, actual) in steps {
        for (i, line) in input.lines().enumerate() {
            out.push_str(if i == 0 { ">>> " } else { "... " });
            out.push_str(line);
            out.push('\n');
        }
        let trimmed = actual.trim_end();
        if !trimmed.is_empty() {
            out.push_str(trimmed);
            out.push('\n');
        }
    }
    out.truncate(out.trim_end().len());
    out
}
