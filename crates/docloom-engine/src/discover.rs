//! Page discovery.
//!
//! Walks the source tree for markup files, parses each into a page and
//! builds the navigation tree. An unreadable source directory is the one
//! discovery failure that aborts the whole build.
//!
//! Page order is source-path order, except pages named in the priority
//! list come first, in the given order. Underscore-prefixed files are
//! partials and are skipped (hidden files are skipped by the walker).

use std::path::{Path, PathBuf};

use docloom_model::{Category, Diagnostic, Document, Navigation, Page};

use crate::error::StageError;
use crate::pipeline::{Stage, StageContext};

/// Source discovery stage.
pub struct DiscoverStage;

impl Stage for DiscoverStage {
    fn name(&self) -> &'static str {
        "discover"
    }

    fn doctest_relevant(&self) -> bool {
        true
    }

    fn run(&mut self, doc: &mut Document, cx: &StageContext) -> Result<(), StageError> {
        let source_dir = doc.config.source_dir.clone();
        if !source_dir.is_dir() {
            return Err(StageError::fatal(format!(
                "source directory {} is not readable",
                source_dir.display()
            )));
        }

        let mut paths = scan_sources(&source_dir)?;
        paths.sort();
        let ordered = apply_priority(paths, &doc.config.page_priority);

        for rel_path in ordered {
            let text = std::fs::read_to_string(source_dir.join(&rel_path)).map_err(|e| {
                StageError::fatal(format!("failed to read {}: {e}", rel_path.display()))
            })?;

            let outcome = cx.collaborators.parser.parse(&text);
            for issue in outcome.issues {
                doc.diagnostics.push(Diagnostic::new(
                    Category::ParseError,
                    rel_path.clone(),
                    issue.to_string(),
                ));
            }

            doc.pages.push(Page::new(rel_path, text, outcome.blocks));
        }

        doc.nav = build_navigation(&doc.pages);
        tracing::debug!(pages = doc.pages.len(), "Discovered pages");
        Ok(())
    }
}

/// Collect relative paths of all markup sources.
fn scan_sources(source_dir: &Path) -> Result<Vec<PathBuf>, StageError> {
    let mut paths = Vec::new();

    for entry in ignore::WalkBuilder::new(source_dir).follow_links(false).build() {
        let entry = entry.map_err(|e| {
            StageError::fatal(format!("failed to scan {}: {e}", source_dir.display()))
        })?;

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('_'))
        {
            continue;
        }

        let rel = path
            .strip_prefix(source_dir)
            .unwrap_or(path)
            .to_path_buf();
        paths.push(rel);
    }

    Ok(paths)
}

/// Move prioritized pages to the front, keeping the configured order.
fn apply_priority(sorted: Vec<PathBuf>, priority: &[PathBuf]) -> Vec<PathBuf> {
    if priority.is_empty() {
        return sorted;
    }

    let mut ordered = Vec::with_capacity(sorted.len());
    for wanted in priority {
        if let Some(pos) = sorted.iter().position(|p| p == wanted)
            && !ordered.contains(&sorted[pos])
        {
            ordered.push(sorted[pos].clone());
        }
    }
    for path in sorted {
        if !ordered.contains(&path) {
            ordered.push(path);
        }
    }
    ordered
}

/// Navigation from page titles and URL paths, parents before children.
fn build_navigation(pages: &[Page]) -> Navigation {
    let mut nav_pages: Vec<(String, String)> = pages
        .iter()
        .map(|p| (p.title.clone(), p.url_path()))
        .collect();
    nav_pages.sort_by(|a, b| a.1.cmp(&b.1));
    Navigation::from_pages(&nav_pages)
}
