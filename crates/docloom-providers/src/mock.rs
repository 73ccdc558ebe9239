//! Mock collaborators for testing.
//!
//! In-memory implementations of [`DocProvider`] and [`CodeEvaluator`] with
//! builder-style configuration. Enabled with the `mock` cargo feature.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use docloom_model::{BindingOrder, ContextHandle};

use crate::docsource::{BindingPolicy, DocEntry, DocProvider};
use crate::evaluator::{CodeEvaluator, EvalOutput};

/// Mock documentation source.
///
/// Stores docstrings and module listings in memory. Registering the same
/// qualified name twice makes a lookup ambiguous, mirroring how a real
/// provider reports multiple matching bindings.
///
/// # Example
///
/// ```
/// use docloom_providers::{DocProvider, MockDocProvider};
///
/// let provider = MockDocProvider::new()
///     .with_doc("pkg.greet", "Say hello.", "src/pkg.rs:10")
///     .with_binding("pkg", "pkg.greet");
///
/// assert_eq!(provider.lookup("pkg.greet").len(), 1);
/// assert!(provider.lookup("pkg.missing").is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockDocProvider {
    docs: RwLock<HashMap<String, Vec<DocEntry>>>,
    modules: RwLock<HashMap<String, Vec<String>>>,
}

impl MockDocProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a docstring for a qualified name.
    ///
    /// Registering the same name again adds a second match (ambiguity).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_doc(
        self,
        qualified: impl Into<String>,
        text: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.docs
            .write()
            .unwrap()
            .entry(qualified.into())
            .or_default()
            .push(DocEntry {
                text: text.into(),
                location: location.into(),
            });
        self
    }

    /// Register a binding under a module, in declaration order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_binding(self, module: impl Into<String>, qualified: impl Into<String>) -> Self {
        self.modules
            .write()
            .unwrap()
            .entry(module.into())
            .or_default()
            .push(qualified.into());
        self
    }
}

impl DocProvider for MockDocProvider {
    fn lookup(&self, qualified: &str) -> Vec<DocEntry> {
        self.docs
            .read()
            .unwrap()
            .get(qualified)
            .cloned()
            .unwrap_or_default()
    }

    fn list_bindings(&self, module: &str, policy: &BindingPolicy) -> Vec<String> {
        let mut bindings = self
            .modules
            .read()
            .unwrap()
            .get(module)
            .cloned()
            .unwrap_or_default();

        if let Some(filter) = &policy.filter {
            bindings.retain(|b| b.contains(filter.as_str()));
        }
        if policy.order == BindingOrder::Name {
            bindings.sort();
        }
        bindings
    }
}

/// Mock code evaluator with scripted responses.
///
/// Responses are keyed by exact code text; unknown code executes silently
/// with empty output. Every execution and context creation is recorded for
/// assertions on isolation and ordering.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use docloom_providers::{CodeEvaluator, EvalOutput, MockEvaluator};
///
/// let evaluator = MockEvaluator::new().with_value("1 + 1", "2");
/// let ctx = evaluator.create_context(Path::new("/tmp"));
///
/// let result = evaluator.execute(ctx, "1 + 1");
/// assert_eq!(result.value.as_deref(), Some("2"));
/// ```
#[derive(Debug, Default)]
pub struct MockEvaluator {
    next_id: AtomicU64,
    responses: RwLock<HashMap<String, EvalOutput>>,
    contexts: RwLock<Vec<(ContextHandle, PathBuf)>>,
    executions: RwLock<Vec<(ContextHandle, String)>>,
}

impl MockEvaluator {
    /// Create a mock evaluator with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a full response for a code unit.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_response(self, code: impl Into<String>, output: EvalOutput) -> Self {
        self.responses.write().unwrap().insert(code.into(), output);
        self
    }

    /// Script captured stream output for a code unit.
    #[must_use]
    pub fn with_output(self, code: impl Into<String>, output: impl Into<String>) -> Self {
        self.with_response(code, EvalOutput::ok(output))
    }

    /// Script a final value rendering for a code unit.
    #[must_use]
    pub fn with_value(self, code: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_response(code, EvalOutput::value("", value))
    }

    /// Script an execution failure for a code unit.
    #[must_use]
    pub fn with_error(self, code: impl Into<String>, error: impl Into<String>) -> Self {
        self.with_response(code, EvalOutput::failed(error))
    }

    /// Contexts created so far, with their working directories.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn contexts(&self) -> Vec<(ContextHandle, PathBuf)> {
        self.contexts.read().unwrap().clone()
    }

    /// Every `(context, code)` execution in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn executions(&self) -> Vec<(ContextHandle, String)> {
        self.executions.read().unwrap().clone()
    }
}

impl CodeEvaluator for MockEvaluator {
    fn create_context(&self, workdir: &Path) -> ContextHandle {
        let handle = ContextHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.contexts
            .write()
            .unwrap()
            .push((handle, workdir.to_path_buf()));
        handle
    }

    fn execute(&self, context: ContextHandle, code: &str) -> EvalOutput {
        self.executions
            .write()
            .unwrap()
            .push((context, code.to_owned()));
        self.responses
            .read()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_lookup_registered_doc() {
        let provider = MockDocProvider::new().with_doc("pkg.item", "Docs.", "src/lib.rs:1");
        let entries = provider.lookup("pkg.item");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Docs.");
    }

    #[test]
    fn test_double_registration_is_ambiguous() {
        let provider = MockDocProvider::new()
            .with_doc("pkg.item", "First.", "a.rs:1")
            .with_doc("pkg.item", "Second.", "b.rs:1");
        assert_eq!(provider.lookup("pkg.item").len(), 2);
    }

    #[test]
    fn test_list_bindings_declaration_order() {
        let provider = MockDocProvider::new()
            .with_binding("pkg", "pkg.zeta")
            .with_binding("pkg", "pkg.alpha");
        let bindings = provider.list_bindings("pkg", &BindingPolicy::default());
        assert_eq!(bindings, vec!["pkg.zeta", "pkg.alpha"]);
    }

    #[test]
    fn test_list_bindings_name_order() {
        let provider = MockDocProvider::new()
            .with_binding("pkg", "pkg.zeta")
            .with_binding("pkg", "pkg.alpha");
        let policy = BindingPolicy {
            order: BindingOrder::Name,
            filter: None,
        };
        assert_eq!(provider.list_bindings("pkg", &policy), vec!["pkg.alpha", "pkg.zeta"]);
    }

    #[test]
    fn test_list_bindings_filter() {
        let provider = MockDocProvider::new()
            .with_binding("pkg", "pkg.parse")
            .with_binding("pkg", "pkg.render");
        let policy = BindingPolicy {
            order: BindingOrder::Declaration,
            filter: Some("parse".to_owned()),
        };
        assert_eq!(provider.list_bindings("pkg", &policy), vec!["pkg.parse"]);
    }

    #[test]
    fn test_list_bindings_is_stable() {
        let provider = MockDocProvider::new()
            .with_binding("pkg", "pkg.b")
            .with_binding("pkg", "pkg.a");
        let policy = BindingPolicy::default();
        assert_eq!(
            provider.list_bindings("pkg", &policy),
            provider.list_bindings("pkg", &policy)
        );
    }

    #[test]
    fn test_evaluator_contexts_are_distinct() {
        let evaluator = MockEvaluator::new();
        let a = evaluator.create_context(Path::new("/a"));
        let b = evaluator.create_context(Path::new("/b"));
        assert_ne!(a, b);
        assert_eq!(evaluator.contexts().len(), 2);
    }

    #[test]
    fn test_evaluator_scripted_response() {
        let evaluator = MockEvaluator::new().with_output("print(1)", "1\n");
        let ctx = evaluator.create_context(Path::new("/w"));
        assert_eq!(evaluator.execute(ctx, "print(1)"), EvalOutput::ok("1\n"));
    }

    #[test]
    fn test_evaluator_unknown_code_is_silent() {
        let evaluator = MockEvaluator::new();
        let ctx = evaluator.create_context(Path::new("/w"));
        let result = evaluator.execute(ctx, "whatever");
        assert!(result.is_ok());
        assert!(result.output.is_empty());
    }

    #[test]
    fn test_evaluator_records_execution_order() {
        let evaluator = MockEvaluator::new();
        let ctx = evaluator.create_context(Path::new("/w"));
        evaluator.execute(ctx, "first");
        evaluator.execute(ctx, "second");

        let log = evaluator.executions();
        assert_eq!(log[0].1, "first");
        assert_eq!(log[1].1, "second");
    }
}
