//! Document aggregate.
//!
//! One [`Document`] per build, owned by the pipeline orchestrator. Stages
//! receive it mutably one at a time; the anchor registry and diagnostic log
//! use interior locking so a stage may fan its own work out over threads.

use std::path::Path;
use std::sync::Arc;

use docloom_config::BuildConfig;

use crate::anchor::AnchorRegistry;
use crate::diagnostic::DiagnosticLog;
use crate::nav::Navigation;
use crate::page::Page;

/// Doctest stage outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoctestSummary {
    /// Fragments executed.
    pub executed: usize,
    /// Fragments whose output did not match the recorded expectation.
    pub failed: usize,
    /// Expectations rewritten in fix mode.
    pub fixed: usize,
}

/// Root aggregate for one build. Discarded when the build ends.
#[derive(Debug)]
pub struct Document {
    /// Pages in build order (priority pages first, then source-path order).
    pub pages: Vec<Page>,
    /// Navigation tree derived from page paths.
    pub nav: Navigation,
    /// Read-only build configuration.
    pub config: Arc<BuildConfig>,
    /// Anchor registry, populated during expansion.
    pub anchors: AnchorRegistry,
    /// Append-only diagnostic log.
    pub diagnostics: DiagnosticLog,
    /// Filled by the doctest stage when it runs.
    pub doctest_summary: Option<DoctestSummary>,
}

impl Document {
    /// Create an empty document for a build.
    #[must_use]
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self {
            pages: Vec::new(),
            nav: Navigation::default(),
            config,
            anchors: AnchorRegistry::new(),
            diagnostics: DiagnosticLog::new(),
            doctest_summary: None,
        }
    }

    /// Look up a page by its source path.
    #[must_use]
    pub fn page_by_source(&self, source_path: &Path) -> Option<&Page> {
        self.pages.iter().find(|p| p.source_path == source_path)
    }

    /// Index of a page by its source path.
    #[must_use]
    pub fn page_index(&self, source_path: &Path) -> Option<usize> {
        self.pages.iter().position(|p| p.source_path == source_path)
    }
}
