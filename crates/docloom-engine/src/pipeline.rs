//! Build pipeline orchestration.
//!
//! Stages implement [`Stage`] and are collected in a [`StageRegistry`]
//! constructed fresh for every build; no registration survives across
//! builds. The orchestrator resolves the execution plan (a stable
//! topological order over declared predecessors) inside each `build` call,
//! runs stages strictly sequentially with exclusive access to the
//! [`Document`], and evaluates the strict gate once at the end.

use std::collections::BTreeSet;
use std::sync::Arc;

use docloom_config::{BuildConfig, DoctestMode, StrictPolicy};
use docloom_markup::{MarkdownParser, MarkupParser};
use docloom_model::{Category, Document};
use docloom_providers::{CodeEvaluator, DocProvider};

use crate::discover::DiscoverStage;
use crate::doctest::DoctestStage;
use crate::error::{BuildError, StageError};
use crate::expand::ExpandStage;
use crate::xref::XrefStage;

/// External collaborators consumed by the built-in stages.
#[derive(Clone)]
pub struct Collaborators {
    /// Documentation-source provider.
    pub docs: Arc<dyn DocProvider>,
    /// Code evaluator.
    pub evaluator: Arc<dyn CodeEvaluator>,
    /// Markup parser.
    pub parser: Arc<dyn MarkupParser>,
}

impl Collaborators {
    /// Create collaborators with the built-in markdown parser.
    #[must_use]
    pub fn new(docs: Arc<dyn DocProvider>, evaluator: Arc<dyn CodeEvaluator>) -> Self {
        Self {
            docs,
            evaluator,
            parser: Arc::new(MarkdownParser::new()),
        }
    }

    /// Replace the markup parser.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn MarkupParser>) -> Self {
        self.parser = parser;
        self
    }
}

/// Context handed to every stage run.
pub struct StageContext {
    /// External collaborators.
    pub collaborators: Collaborators,
}

/// One pipeline stage.
///
/// Stages receive the document exclusively and may mutate it and append
/// diagnostics. A returned error aborts the pipeline only when marked
/// fatal.
pub trait Stage: Send {
    /// Unique stage name.
    fn name(&self) -> &'static str;

    /// Names of stages that must run before this one.
    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// True if the stage participates in doctest-only builds.
    fn doctest_relevant(&self) -> bool {
        false
    }

    /// Run the stage.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`]; the build aborts only if it is fatal.
    fn run(&mut self, doc: &mut Document, cx: &StageContext) -> Result<(), StageError>;
}

/// Ordered, open set of stages for one build.
///
/// Consumed by [`Orchestrator::build`], so a registry can never be reused
/// across builds.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Box<dyn Stage>>,
}

impl StageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in pipeline: discover, expand, doctest, xref.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DiscoverStage);
        registry.register(ExpandStage);
        registry.register(DoctestStage);
        registry.register(XrefStage);
        registry
    }

    /// Append a stage. Registration order is the base execution order.
    pub fn register<S: Stage + 'static>(&mut self, stage: S) {
        self.stages.push(Box::new(stage));
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True if no stage is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Execution order resolved from the registered set.
///
/// Rebuilt from scratch inside every build; never cached across builds.
#[derive(Debug)]
struct ExecutionPlan {
    order: Vec<usize>,
}

impl ExecutionPlan {
    /// Stable topological sort over declared predecessors.
    ///
    /// Stages stay in registration order unless a predecessor forces them
    /// later. Unknown predecessors and cycles are configuration errors.
    fn resolve(registry: &StageRegistry) -> Result<Self, BuildError> {
        let names: Vec<&'static str> = registry.stages.iter().map(|s| s.name()).collect();

        for stage in &registry.stages {
            for required in stage.requires() {
                if !names.contains(&required) {
                    return Err(BuildError::Config(format!(
                        "stage '{}' requires unknown stage '{required}'",
                        stage.name()
                    )));
                }
            }
        }

        let mut order = Vec::with_capacity(registry.stages.len());
        let mut done: BTreeSet<&'static str> = BTreeSet::new();

        while order.len() < registry.stages.len() {
            let next = registry.stages.iter().enumerate().position(|(i, stage)| {
                !order.contains(&i) && stage.requires().iter().all(|r| done.contains(r))
            });
            match next {
                Some(i) => {
                    done.insert(registry.stages[i].name());
                    order.push(i);
                }
                None => {
                    return Err(BuildError::Config(
                        "stage dependency cycle detected".to_owned(),
                    ));
                }
            }
        }

        Ok(Self { order })
    }
}

/// Runs the pipeline for one build at a time.
pub struct Orchestrator {
    config: Arc<BuildConfig>,
    collaborators: Collaborators,
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(config: BuildConfig, collaborators: Collaborators) -> Self {
        Self {
            config: Arc::new(config),
            collaborators,
        }
    }

    /// Run all stages and evaluate the strict gate.
    ///
    /// Consumes the registry; build a new one for the next invocation.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Config`] for an invalid strict set or stage
    /// graph, [`BuildError::Stage`] when a fatal stage fails, and
    /// [`BuildError::StrictGate`] when recorded diagnostics violate the
    /// strict policy.
    pub fn build(&self, mut registry: StageRegistry) -> Result<Document, BuildError> {
        let strict = resolve_strict(&self.config.strict)?;
        let plan = ExecutionPlan::resolve(&registry)?;
        let doctest_only = self.config.doctest_mode == DoctestMode::Only;

        let mut doc = Document::new(Arc::clone(&self.config));
        let cx = StageContext {
            collaborators: self.collaborators.clone(),
        };

        for idx in plan.order {
            let stage = &mut registry.stages[idx];
            let name = stage.name();

            if doctest_only && !stage.doctest_relevant() {
                tracing::debug!(stage = name, "Skipping stage in doctest-only mode");
                continue;
            }

            tracing::debug!(stage = name, "Running stage");
            match stage.run(&mut doc, &cx) {
                Ok(()) => {}
                Err(e) if e.fatal => {
                    return Err(BuildError::Stage {
                        stage: name,
                        message: e.message,
                    });
                }
                Err(e) => {
                    tracing::warn!(stage = name, error = %e, "Stage failed (non-fatal)");
                }
            }
        }

        summarize(&doc);

        // Doctest-only builds gate on doctest mismatches regardless of the
        // configured strict policy.
        let gate: BTreeSet<Category> = if doctest_only {
            BTreeSet::from([Category::Doctest])
        } else {
            strict
        };

        let present = doc.diagnostics.categories();
        let violated: BTreeSet<Category> = gate.intersection(&present).copied().collect();
        if violated.is_empty() {
            Ok(doc)
        } else {
            Err(BuildError::StrictGate { violated })
        }
    }
}

/// Map the configured strict policy onto the closed category set.
fn resolve_strict(policy: &StrictPolicy) -> Result<BTreeSet<Category>, BuildError> {
    match policy {
        StrictPolicy::All(true) => Ok(Category::ALL.into_iter().collect()),
        StrictPolicy::All(false) => Ok(BTreeSet::new()),
        StrictPolicy::Categories(names) => names
            .iter()
            .map(|name| {
                Category::from_name(name).ok_or_else(|| {
                    BuildError::Config(format!("unknown strict category '{name}'"))
                })
            })
            .collect(),
    }
}

/// End-of-build diagnostic summary.
fn summarize(doc: &Document) {
    if let Some(summary) = doc.doctest_summary {
        tracing::info!(
            executed = summary.executed,
            failed = summary.failed,
            fixed = summary.fixed,
            "Doctest summary"
        );
    }

    let diagnostics = doc.diagnostics.entries();
    if diagnostics.is_empty() {
        tracing::info!(pages = doc.pages.len(), "Build completed cleanly");
        return;
    }

    for diagnostic in &diagnostics {
        tracing::warn!("{diagnostic}");
    }
    tracing::warn!(
        count = diagnostics.len(),
        pages = doc.pages.len(),
        "Build completed with diagnostics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedStage {
        name: &'static str,
        requires: Vec<&'static str>,
    }

    impl Stage for NamedStage {
        fn name(&self) -> &'static str {
            self.name
        }

        fn requires(&self) -> Vec<&'static str> {
            self.requires.clone()
        }

        fn run(&mut self, _doc: &mut Document, _cx: &StageContext) -> Result<(), StageError> {
            Ok(())
        }
    }

    fn registry_of(stages: Vec<NamedStage>) -> StageRegistry {
        let mut registry = StageRegistry::new();
        for stage in stages {
            registry.register(stage);
        }
        registry
    }

    #[test]
    fn test_plan_keeps_registration_order() {
        let registry = registry_of(vec![
            NamedStage { name: "a", requires: vec![] },
            NamedStage { name: "b", requires: vec![] },
        ]);
        let plan = ExecutionPlan::resolve(&registry).unwrap();
        assert_eq!(plan.order, vec![0, 1]);
    }

    #[test]
    fn test_plan_honors_predecessors() {
        let registry = registry_of(vec![
            NamedStage {
                name: "late",
                requires: vec!["early"],
            },
            NamedStage { name: "early", requires: vec![] },
        ]);
        let plan = ExecutionPlan::resolve(&registry).unwrap();
        assert_eq!(plan.order, vec![1, 0]);
    }

    #[test]
    fn test_plan_rejects_unknown_predecessor() {
        let registry = registry_of(vec![NamedStage {
            name: "a",
            requires: vec!["ghost"],
        }]);
        let err = ExecutionPlan::resolve(&registry).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_plan_rejects_cycle() {
        let registry = registry_of(vec![
            NamedStage {
                name: "a",
                requires: vec!["b"],
            },
            NamedStage {
                name: "b",
                requires: vec!["a"],
            },
        ]);
        let err = ExecutionPlan::resolve(&registry).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_resolve_strict_boolean() {
        assert!(resolve_strict(&StrictPolicy::All(false)).unwrap().is_empty());
        assert_eq!(
            resolve_strict(&StrictPolicy::All(true)).unwrap().len(),
            Category::ALL.len()
        );
    }

    #[test]
    fn test_resolve_strict_names() {
        let set = resolve_strict(&StrictPolicy::Categories(vec![
            "doctest".to_owned(),
            "cross_references".to_owned(),
        ]))
        .unwrap();
        assert!(set.contains(&Category::Doctest));
        assert!(set.contains(&Category::CrossReferences));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resolve_strict_unknown_name() {
        let err = resolve_strict(&StrictPolicy::Categories(vec!["typo".to_owned()])).unwrap_err();
        assert!(err.to_string().contains("typo"));
    }

    #[test]
    fn test_builtin_registry_order() {
        let registry = StageRegistry::builtin();
        assert_eq!(registry.len(), 4);
        let plan = ExecutionPlan::resolve(&registry).unwrap();
        assert_eq!(plan.order, vec![0, 1, 2, 3]);
    }
}
