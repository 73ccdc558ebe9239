//! Documentation-source provider.
//!
//! Supplies raw docstrings and binding listings for the expansion engine.
//! Implementations wrap whatever holds the documented code (a compiler
//! session, an extracted index, a language server); the engine only relies
//! on the contract below.

use docloom_model::BindingOrder;

/// One docstring match for a qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    /// Raw docstring text (markup, parsed by the engine).
    pub text: String,
    /// Source location for attribution, e.g. `src/lib.rs:42`.
    pub location: String,
}

/// Enumeration policy for bulk documentation blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingPolicy {
    /// Result ordering.
    pub order: BindingOrder,
    /// Optional name filter, interpreted by the provider.
    pub filter: Option<String>,
}

/// Source of documentation for qualified bindings.
///
/// # Contract
///
/// * `lookup` returns every match for a fully-qualified name; zero matches
///   and multiple matches are both meaningful to the caller.
/// * `list_bindings` is stable: two calls with the same arguments return the
///   same list in the same order. [`BindingOrder::Declaration`] preserves
///   the provider's declaration order; [`BindingOrder::Name`] sorts
///   lexicographically.
pub trait DocProvider: Send + Sync {
    /// All docstring matches for a fully-qualified binding name.
    fn lookup(&self, qualified: &str) -> Vec<DocEntry>;

    /// Ordered binding names of a module under the given policy.
    fn list_bindings(&self, module: &str, policy: &BindingPolicy) -> Vec<String>;
}
