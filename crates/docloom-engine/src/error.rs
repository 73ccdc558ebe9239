//! Build and stage errors.

use std::collections::BTreeSet;

use docloom_model::Category;

/// Error returned by a failing stage.
///
/// Only fatal errors abort the pipeline; everything else is logged and the
/// remaining stages still run.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct StageError {
    /// What went wrong.
    pub message: String,
    /// True if the pipeline must abort.
    pub fatal: bool,
}

impl StageError {
    /// A failure that aborts the whole build.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }

    /// A failure the pipeline survives.
    #[must_use]
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }
}

/// Error returned by a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid build configuration or stage graph.
    #[error("configuration error: {0}")]
    Config(String),
    /// A stage marked fatal failed.
    #[error("stage '{stage}' failed: {message}")]
    Stage {
        /// Name of the failing stage.
        stage: &'static str,
        /// Failure message.
        message: String,
    },
    /// The strict gate converted diagnostics into a failure.
    #[error("strict gate violated for categories: {}", join_categories(.violated))]
    StrictGate {
        /// Every violated category.
        violated: BTreeSet<Category>,
    },
}

fn join_categories(categories: &BTreeSet<Category>) -> String {
    categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
