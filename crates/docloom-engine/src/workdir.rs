//! Evaluation working directories.
//!
//! The per-page policy derives a stable directory name from the page source
//! path, so re-running a build reuses the same location.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use docloom_config::{BuildConfig, WorkdirPolicy};

/// Hex digits of the path digest used in derived directory names.
const DIGEST_LEN: usize = 12;

/// Working directory for a page's evaluation contexts.
pub(crate) fn workdir_for(config: &BuildConfig, page: &Path) -> PathBuf {
    match &config.workdir {
        WorkdirPolicy::Fixed(path) => path.clone(),
        WorkdirPolicy::PerPage => {
            let digest = Sha256::digest(page.to_string_lossy().as_bytes());
            let name = &hex::encode(digest)[..DIGEST_LEN];
            config.source_dir.join(".docloom").join("work").join(name)
        }
    }
}

/// Best-effort creation of a workdir before handing it to the evaluator.
pub(crate) fn ensure_workdir(path: &Path) {
    if let Err(e) = std::fs::create_dir_all(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to create workdir");
    }
}
