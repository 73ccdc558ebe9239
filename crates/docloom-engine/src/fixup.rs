//! Fix-mode source patching.
//!
//! Patches replace recorded doctest expectations at their source spans.
//! Per file, patches apply bottom-up so earlier spans stay valid.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use docloom_model::LineSpan;

/// One pending source rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Patch {
    /// Page source path, relative to the discovery root.
    pub path: PathBuf,
    /// Lines to replace.
    pub span: LineSpan,
    /// Replacement text (without trailing newline).
    pub replacement: String,
}

/// Apply patches under `root`, returning how many were written.
pub(crate) fn apply_patches(root: &Path, patches: Vec<Patch>) -> io::Result<usize> {
    let mut by_file: HashMap<PathBuf, Vec<Patch>> = HashMap::new();
    for patch in patches {
        by_file.entry(patch.path.clone()).or_default().push(patch);
    }

    let mut applied = 0;
    for (rel_path, mut file_patches) in by_file {
        file_patches.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        let full_path = root.join(&rel_path);
        let text = std::fs::read_to_string(&full_path)?;
        let had_trailing_newline = text.ends_with('\n');
        let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();

        for patch in &file_patches {
            let start = patch.span.start.saturating_sub(1);
            let end = patch.span.end.min(lines.len());
            if start >= lines.len() {
                tracing::warn!(
                    path = %rel_path.display(),
                    line = patch.span.start,
                    "Patch span past end of file, skipping"
                );
                continue;
            }
            lines.splice(start..end, patch.replacement.lines().map(str::to_owned));
            applied += 1;
        }

        let mut updated = lines.join("\n");
        if had_trailing_newline {
            updated.push('\n');
        }
        std::fs::write(&full_path, updated)?;
        tracing::debug!(path = %rel_path.display(), patches = file_patches.len(), "Rewrote expectations");
    }

    Ok(applied)
}
