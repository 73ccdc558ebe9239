//! Pages.
//!
//! One page per discovered source unit. Pages are created at discovery,
//! mutated by the expansion and doctest stages and frozen before the
//! finished document is handed to a renderer.

use std::path::{Path, PathBuf};

use crate::ast::{Block, plain_text};
use crate::fragment::{CodeFragment, ContextHandle};
use crate::xref::CrossRefRequest;

/// One source unit of the document.
#[derive(Debug)]
pub struct Page {
    /// Source path relative to the discovery root.
    pub source_path: PathBuf,
    /// Page title: first level-1 heading, falling back to the file stem.
    pub title: String,
    /// Raw source text (kept for doctest spans and fix mode).
    pub text: String,
    /// Parsed and progressively rewritten AST.
    pub ast: Vec<Block>,
    /// Identifiers of anchors this page defines (registry back-references).
    pub anchors: Vec<String>,
    /// Cross-reference requests awaiting the resolver.
    pub pending_refs: Vec<CrossRefRequest>,
    /// Code fragments awaiting the doctest engine.
    pub fragments: Vec<CodeFragment>,
    /// Per-page evaluation context, created lazily by expansion.
    pub context: Option<ContextHandle>,
}

impl Page {
    /// Create a page from parsed source.
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>, text: impl Into<String>, ast: Vec<Block>) -> Self {
        let source_path = source_path.into();
        let title = derive_title(&ast, &source_path);
        Self {
            source_path,
            title,
            text: text.into(),
            ast,
            anchors: Vec::new(),
            pending_refs: Vec::new(),
            fragments: Vec::new(),
            context: None,
        }
    }

    /// URL path for navigation and link targets.
    ///
    /// `index.md` maps to its directory, other files drop the extension:
    /// `guide.md` -> `guide`, `domain/index.md` -> `domain`.
    #[must_use]
    pub fn url_path(&self) -> String {
        source_path_to_url(&self.source_path)
    }
}

/// First level-1 heading, or the title-cased file stem.
fn derive_title(ast: &[Block], source_path: &Path) -> String {
    for block in ast {
        if let Block::Heading(h) = block
            && h.level == 1
        {
            return plain_text(&h.inlines);
        }
    }
    title_from_stem(source_path)
}

/// Title-case a file stem: `setup-guide` -> `Setup Guide`.
fn title_from_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a source path to a URL path (no leading slash).
#[must_use]
pub fn source_path_to_url(source_path: &Path) -> String {
    let path_str = source_path.to_string_lossy();
    let without_ext = path_str.strip_suffix(".md").unwrap_or(&path_str);

    if let Some(without_index) = without_ext.strip_suffix("/index") {
        return without_index.to_owned();
    }
    if without_ext == "index" {
        return String::new();
    }
    without_ext.to_owned()
}
