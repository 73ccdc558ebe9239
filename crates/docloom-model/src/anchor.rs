//! Anchor registry.
//!
//! Anchors are addressable targets keyed by identifier. Identifiers are
//! unique within a page: heading and footnote anchors auto-disambiguate with
//! a deterministic `-1`, `-2`, ... suffix, while canonical binding anchors
//! collide hard. The same identifier may exist on several pages; resolving
//! that ambiguity is the cross-reference resolver's job.
//!
//! # Thread Safety
//!
//! Registration is an atomic check-and-insert behind a single mutex, so
//! parallel page expansion can share one registry without losing the
//! per-page uniqueness invariant.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// What kind of target an anchor marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    /// Section heading.
    Heading,
    /// Footnote definition.
    Footnote,
    /// Documented binding (canonical name).
    Binding,
}

/// An addressable target. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Final identifier, unique within `page`.
    pub id: String,
    /// Index of the owning page in the document's page list.
    pub page: usize,
    /// Anchor kind.
    pub kind: AnchorKind,
    /// 1-based source line of the defining node.
    pub line: usize,
}

/// Error returned when registration cannot produce a unique identifier.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// The identifier was empty after normalization.
    #[error("anchor identifier is empty")]
    Empty,
    /// A canonical identifier is already taken on the same page.
    #[error("anchor '{id}' already registered on this page")]
    Collision {
        /// The colliding identifier.
        id: String,
    },
    /// Suffix disambiguation was exhausted.
    #[error("anchor '{id}' could not be disambiguated")]
    Exhausted {
        /// The base identifier.
        id: String,
    },
}

/// Highest suffix tried before giving up on disambiguation.
const MAX_SUFFIX: usize = 999;

#[derive(Debug, Default)]
struct RegistryInner {
    anchors: Vec<Anchor>,
    by_id: HashMap<String, Vec<usize>>,
    taken: HashSet<(usize, String)>,
}

/// Registry of every anchor in a document.
///
/// Pages hold identifier back-references only; the registry owns the anchors.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    inner: Mutex<RegistryInner>,
}

impl AnchorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an anchor, returning the final (possibly suffixed) identifier.
    ///
    /// Heading and footnote anchors are suffixed `base-1`, `base-2`, ... when
    /// `base` is taken on the same page. Binding anchors keep their canonical
    /// name and fail on collision instead.
    ///
    /// # Errors
    ///
    /// Returns [`AnchorError::Empty`] for an empty identifier,
    /// [`AnchorError::Collision`] for a taken canonical name, and
    /// [`AnchorError::Exhausted`] when suffixing gives up.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn register(
        &self,
        page: usize,
        kind: AnchorKind,
        base: &str,
        line: usize,
    ) -> Result<String, AnchorError> {
        if base.is_empty() {
            return Err(AnchorError::Empty);
        }

        let mut inner = self.inner.lock().unwrap();

        let id = if inner.taken.contains(&(page, base.to_owned())) {
            if kind == AnchorKind::Binding {
                return Err(AnchorError::Collision {
                    id: base.to_owned(),
                });
            }
            Self::disambiguate(&inner, page, base)?
        } else {
            base.to_owned()
        };

        let idx = inner.anchors.len();
        inner.anchors.push(Anchor {
            id: id.clone(),
            page,
            kind,
            line,
        });
        inner.by_id.entry(id.clone()).or_default().push(idx);
        inner.taken.insert((page, id.clone()));
        Ok(id)
    }

    /// Find the next free `base-N` identifier on a page.
    fn disambiguate(inner: &RegistryInner, page: usize, base: &str) -> Result<String, AnchorError> {
        for n in 1..=MAX_SUFFIX {
            let candidate = format!("{base}-{n}");
            if !inner.taken.contains(&(page, candidate.clone())) {
                return Ok(candidate);
            }
        }
        Err(AnchorError::Exhausted {
            id: base.to_owned(),
        })
    }

    /// All anchors registered under `id`, across every page.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn find(&self, id: &str) -> Vec<Anchor> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_id
            .get(id)
            .map(|indices| indices.iter().map(|&i| inner.anchors[i].clone()).collect())
            .unwrap_or_default()
    }

    /// Anchors belonging to one page, in registration order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn for_page(&self, page: usize) -> Vec<Anchor> {
        let inner = self.inner.lock().unwrap();
        inner
            .anchors
            .iter()
            .filter(|a| a.page == page)
            .cloned()
            .collect()
    }

    /// Total number of registered anchors.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().anchors.len()
    }

    /// True if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
