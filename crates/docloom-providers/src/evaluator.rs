//! Code evaluator.
//!
//! Executes code fragments in isolated evaluation contexts. A context is a
//! fresh interpreter/session state; the engine creates one per page for
//! evaluated blocks and fresh or named ones for doctest fragments. Contexts
//! are never shared across pages.

use std::path::Path;

use docloom_model::ContextHandle;

/// Result of executing one unit of code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalOutput {
    /// Captured stream output (stdout and stderr interleaved).
    pub output: String,
    /// Rendering of the final expression's value, if the unit ends in an
    /// expression.
    pub value: Option<String>,
    /// Execution error, if the unit crashed. Partial output may still be
    /// present.
    pub error: Option<String>,
}

impl EvalOutput {
    /// Successful execution with captured output.
    #[must_use]
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            value: None,
            error: None,
        }
    }

    /// Successful execution yielding a final value rendering.
    #[must_use]
    pub fn value(output: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            value: Some(value.into()),
            error: None,
        }
    }

    /// Failed execution.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            value: None,
            error: Some(error.into()),
        }
    }

    /// True if execution completed without error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Output followed by the value rendering, as a doctest compares it.
    #[must_use]
    pub fn combined(&self) -> String {
        match &self.value {
            Some(value) if self.output.is_empty() => value.clone(),
            Some(value) => format!("{}\n{value}", self.output.trim_end_matches('\n')),
            None => self.output.clone(),
        }
    }
}

/// Executes code in owned evaluation contexts.
///
/// # Contract
///
/// * `create_context` returns a handle to a fresh context rooted at
///   `workdir`; state accumulated in one context is invisible to others.
/// * `execute` runs one unit of code in the given context, mutating its
///   state; the engine serializes calls per context.
pub trait CodeEvaluator: Send + Sync {
    /// Create a fresh evaluation context rooted at `workdir`.
    fn create_context(&self, workdir: &Path) -> ContextHandle;

    /// Execute a unit of code in an existing context.
    fn execute(&self, context: ContextHandle, code: &str) -> EvalOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_only() {
        assert_eq!(EvalOutput::ok("hello\n").combined(), "hello\n");
    }

    #[test]
    fn test_combined_value_only() {
        assert_eq!(EvalOutput::value("", "2").combined(), "2");
    }

    #[test]
    fn test_combined_output_and_value() {
        assert_eq!(EvalOutput::value("hello\n", "2").combined(), "hello\n2");
    }

    #[test]
    fn test_failed_is_not_ok() {
        assert!(!EvalOutput::failed("boom").is_ok());
        assert!(EvalOutput::ok("").is_ok());
    }
}
