//! External collaborator traits for docloom.
//!
//! The engine consumes documentation and code execution through the two
//! traits here; concrete backends live outside this workspace. The `mock`
//! feature provides in-memory implementations for tests.

mod docsource;
mod evaluator;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use docsource::{BindingPolicy, DocEntry, DocProvider};
pub use evaluator::{CodeEvaluator, EvalOutput};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockDocProvider, MockEvaluator};
