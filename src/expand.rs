use std::collections::HashSet;

/// Tracks which tag paths are expanded. Kept outside the tree so a full
/// rebuild (zero-crossing churn) does not collapse what the user opened.
/// Collapsing a parent leaves its descendants' entries in place; re-opening
/// the parent restores the nested subtrees exactly as they were.
#[derive(Debug, Default)]
pub struct ExpandedPaths {
    expanded: HashSet<String>,
}

impl ExpandedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_string());
    }

    pub fn collapse(&mut self, path: &str) {
        self.expanded.remove(path);
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Flips the path's state and returns the new one, true for expanded.
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.is_expanded(path) {
            self.collapse(path);
            false
        } else {
            self.expand(path);
            true
        }
    }

    /// Drop entries whose tag no longer exists; called after rebuilds so
    /// the set cannot grow without bound as tags come and go.
    pub fn prune<F: Fn(&str) -> bool>(&mut self, still_exists: F) {
        self.expanded.retain(|p| still_exists(p));
    }
}
