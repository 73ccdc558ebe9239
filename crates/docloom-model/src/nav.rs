//! Navigation tree.
//!
//! Built once at discovery from page URL paths. Parent lookup walks up the
//! path hierarchy to the nearest existing ancestor, so directories without an
//! index page have their children promoted to the parent level.

use std::collections::HashMap;

/// One navigation entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    /// Display title.
    pub title: String,
    /// URL path (no leading slash, empty for the root page).
    pub path: String,
    /// Nested entries.
    pub children: Vec<NavItem>,
}

/// Navigation tree over all pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Top-level entries in build order.
    pub items: Vec<NavItem>,
}

impl Navigation {
    /// Build a tree from `(title, url_path)` pairs.
    ///
    /// Pairs must already be in build order; parents must precede children
    /// for nesting to take effect (discovery guarantees this by sorting).
    #[must_use]
    pub fn from_pages(pages: &[(String, String)]) -> Self {
        let mut nodes: Vec<(NavItem, Option<usize>)> = Vec::with_capacity(pages.len());
        let mut path_to_idx: HashMap<&str, usize> = HashMap::new();

        for (title, path) in pages {
            let parent = find_parent(path, &path_to_idx);
            let idx = nodes.len();
            nodes.push((
                NavItem {
                    title: title.clone(),
                    path: path.clone(),
                    children: Vec::new(),
                },
                parent,
            ));
            path_to_idx.insert(path.as_str(), idx);
        }

        // Assemble children bottom-up so each node is moved exactly once.
        let mut items = Vec::new();
        for idx in (0..nodes.len()).rev() {
            let (item, parent) = {
                let (ref mut item, parent) = nodes[idx];
                (std::mem::replace(item, NavItem::placeholder()), parent)
            };
            match parent {
                Some(p) => nodes[p].0.children.insert(0, item),
                None => items.insert(0, item),
            }
        }

        Self { items }
    }

    /// Total number of entries in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        fn count(items: &[NavItem]) -> usize {
            items.iter().map(|i| 1 + count(&i.children)).sum()
        }
        count(&self.items)
    }

    /// True if the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl NavItem {
    fn placeholder() -> Self {
        Self {
            title: String::new(),
            path: String::new(),
            children: Vec::new(),
        }
    }
}

/// Nearest existing ancestor of a URL path.
///
/// The root page (empty path) is never a parent; top-level pages stay
/// top-level entries next to it.
fn find_parent(path: &str, path_to_idx: &HashMap<&str, usize>) -> Option<usize> {
    let mut current = path;
    loop {
        let parent = current.rsplit_once('/').map_or("", |(p, _)| p);
        if parent.is_empty() {
            return None;
        }
        if let Some(&idx) = path_to_idx.get(parent) {
            return Some(idx);
        }
        current = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(t, p)| ((*t).to_owned(), (*p).to_owned()))
            .collect()
    }

    #[test]
    fn test_flat_pages() {
        let nav = Navigation::from_pages(&pages(&[("Guide", "guide"), ("API", "api")]));
        assert_eq!(nav.items.len(), 2);
        assert_eq!(nav.items[0].title, "Guide");
        assert_eq!(nav.items[1].title, "API");
    }

    #[test]
    fn test_nested_pages() {
        let nav = Navigation::from_pages(&pages(&[
            ("Home", ""),
            ("Domain", "domain"),
            ("Setup", "domain/setup"),
        ]));
        assert_eq!(nav.items.len(), 2);
        assert_eq!(nav.items[1].path, "domain");
        assert_eq!(nav.items[1].children.len(), 1);
        assert_eq!(nav.items[1].children[0].title, "Setup");
    }

    #[test]
    fn test_missing_parent_promotes_child() {
        // "no-index/child" has no "no-index" page; it lands at the top level.
        let nav = Navigation::from_pages(&pages(&[("Child", "no-index/child")]));
        assert_eq!(nav.items.len(), 1);
        assert_eq!(nav.items[0].path, "no-index/child");
    }

    #[test]
    fn test_len_counts_nested() {
        let nav = Navigation::from_pages(&pages(&[
            ("A", "a"),
            ("B", "a/b"),
            ("C", "a/b/c"),
        ]));
        assert_eq!(nav.len(), 3);
        assert_eq!(nav.items.len(), 1);
    }
}
