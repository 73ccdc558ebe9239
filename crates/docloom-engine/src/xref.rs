//! Cross-reference resolution.
//!
//! Runs only after every page has expanded, when the anchor registry is
//! complete. Requests resolve in page order, then appearance order, so
//! diagnostic ordering is reproducible. Exactly one match rewrites the
//! mention into a concrete link; zero matches degrade to plain text; more
//! than one match without an explicit `page#id` disambiguator lists every
//! candidate and never guesses.

use std::collections::HashMap;
use std::path::PathBuf;

use docloom_model::{
    Anchor, Block, Category, Diagnostic, Document, Expansion, Inline, ResolvedLink,
};

use crate::error::StageError;
use crate::pipeline::{Stage, StageContext};

/// Cross-reference resolution stage.
pub struct XrefStage;

impl Stage for XrefStage {
    fn name(&self) -> &'static str {
        "xref"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec!["expand"]
    }

    fn run(&mut self, doc: &mut Document, _cx: &StageContext) -> Result<(), StageError> {
        // Candidate lookup needs every page's identity while single pages
        // are rewritten, so snapshot the identities first.
        let identities: Vec<PageIdentity> = doc
            .pages
            .iter()
            .map(|p| PageIdentity {
                source_path: p.source_path.clone(),
                url: p.url_path(),
            })
            .collect();

        let mut resolved_total = 0usize;
        for idx in 0..doc.pages.len() {
            let requests = std::mem::take(&mut doc.pages[idx].pending_refs);
            let mut resolved: HashMap<u32, ResolvedLink> = HashMap::new();

            for request in &requests {
                let mut candidates = doc.anchors.find(&request.target.id);
                if let Some(page_spec) = &request.target.page {
                    candidates.retain(|a| identities[a.page].matches(page_spec));
                }

                match candidates.as_slice() {
                    [anchor] => {
                        resolved.insert(
                            request.id,
                            ResolvedLink {
                                page: identities[anchor.page].url.clone(),
                                anchor: anchor.id.clone(),
                            },
                        );
                        resolved_total += 1;
                    }
                    [] => doc.diagnostics.push(Diagnostic::new(
                        Category::CrossReferences,
                        doc.pages[idx].source_path.clone(),
                        format!("no anchor found for ':ref[{}]'", request.target),
                    )),
                    multiple => {
                        let mut names: Vec<String> = multiple
                            .iter()
                            .map(|a| describe(a, &identities))
                            .collect();
                        names.sort();
                        doc.diagnostics.push(Diagnostic::new(
                            Category::CrossReferences,
                            doc.pages[idx].source_path.clone(),
                            format!(
                                "ambiguous reference '{}': candidates {}",
                                request.target,
                                names.join(", ")
                            ),
                        ));
                    }
                }
            }

            let page = &mut doc.pages[idx];
            for block in &mut page.ast {
                rewrite_block(block, &resolved);
            }
        }

        tracing::debug!(resolved = resolved_total, "Resolved cross-references");
        Ok(())
    }
}

struct PageIdentity {
    source_path: PathBuf,
    url: String,
}

impl PageIdentity {
    /// An explicit disambiguator may name the source path or the URL path.
    fn matches(&self, spec: &str) -> bool {
        self.url == spec || self.source_path.to_string_lossy() == spec
    }
}

fn describe(anchor: &Anchor, identities: &[PageIdentity]) -> String {
    let path = identities
        .get(anchor.page)
        .map_or_else(String::new, |p| p.source_path.to_string_lossy().into_owned());
    format!("{path}#{}", anchor.id)
}

/// Write resolved links back into the AST.
fn rewrite_block(block: &mut Block, resolved: &HashMap<u32, ResolvedLink>) {
    match block {
        Block::Paragraph(inlines) => rewrite_inlines(inlines, resolved),
        Block::Heading(h) => rewrite_inlines(&mut h.inlines, resolved),
        Block::Footnote(f) => rewrite_inlines(&mut f.inlines, resolved),
        Block::List(list) => {
            for item in &mut list.items {
                rewrite_inlines(item, resolved);
            }
        }
        Block::Expansion(Expansion::Docs(entry)) => {
            for nested in &mut entry.body {
                rewrite_block(nested, resolved);
            }
        }
        _ => {}
    }
}

fn rewrite_inlines(inlines: &mut Vec<Inline>, resolved: &HashMap<u32, ResolvedLink>) {
    for inline in inlines {
        match inline {
            Inline::Xref(mention) => {
                if let Some(id) = mention.id
                    && let Some(link) = resolved.get(&id)
                {
                    mention.resolved = Some(link.clone());
                }
            }
            Inline::Emphasis(inner) | Inline::Strong(inner) | Inline::Link { text: inner, .. } => {
                rewrite_inlines(inner, resolved);
            }
            _ => {}
        }
    }
}
