//! Build engine for docloom.
//!
//! Wires the four subsystems together: the pipeline orchestrator runs the
//! registered stages strictly sequentially over one [`Document`] — discovery,
//! directive expansion, doctest execution and cross-reference resolution —
//! then evaluates the strict gate over the accumulated diagnostics.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use docloom_config::BuildConfig;
//! use docloom_engine::{Collaborators, StageRegistry, build};
//! # use docloom_providers::{MockDocProvider, MockEvaluator};
//!
//! let config = BuildConfig::load(None)?;
//! let collaborators = Collaborators::new(
//!     Arc::new(MockDocProvider::new()),
//!     Arc::new(MockEvaluator::new()),
//! );
//!
//! let doc = build(StageRegistry::builtin(), config, collaborators)?;
//! for diagnostic in doc.diagnostics.entries() {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod discover;
mod doctest;
mod error;
mod expand;
mod fixup;
mod pipeline;
mod workdir;
mod xref;

pub use discover::DiscoverStage;
pub use doctest::DoctestStage;
pub use error::{BuildError, StageError};
pub use expand::ExpandStage;
pub use pipeline::{Collaborators, Orchestrator, Stage, StageContext, StageRegistry};
pub use xref::XrefStage;

use docloom_config::BuildConfig;
use docloom_model::Document;

/// Run one build.
///
/// The registry is consumed: stage registrations never survive across
/// builds, so every invocation constructs its own.
///
/// # Errors
///
/// Returns [`BuildError::Config`] for an invalid configuration or stage
/// graph, [`BuildError::Stage`] when a fatal stage fails, and
/// [`BuildError::StrictGate`] when diagnostics violate the strict policy.
pub fn build(
    registry: StageRegistry,
    config: BuildConfig,
    collaborators: Collaborators,
) -> Result<Document, BuildError> {
    Orchestrator::new(config, collaborators).build(registry)
}
