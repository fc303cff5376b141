use indextree::{Arena, NodeId};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::{PanelConfig, SortKey, SortOrder};
use crate::expand::ExpandedPaths;
use crate::index::TagIndex;

/// One segment of the tag hierarchy.
#[derive(Debug, Clone)]
pub struct TagNode {
    pub name: String,
    pub full_path: String,
    /// Occurrences of exactly this path.
    pub own_count: usize,
    /// Own + all descendants, written by `accumulate`.
    pub count: usize,
    pub last_used: i64,
    pub expanded: bool,
}

/// Hierarchical tag tree using an arena allocator. Rebuilt wholesale on any
/// zero-crossing; pure count changes are patched into rows without touching
/// the tree.
pub struct TagTree {
    arena: Arena<TagNode>,
    root: NodeId,
    path_to_node: HashMap<String, NodeId>,
}

impl TagTree {
    pub fn empty() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(TagNode {
            name: String::new(),
            full_path: String::new(),
            own_count: 0,
            count: 0,
            last_used: 0,
            expanded: true,
        });
        Self { arena, root, path_to_node: HashMap::new() }
    }

    /// Builds the tree from the index, splitting tag paths on `/` and
    /// creating intermediate nodes on first encounter. Expansion flags come
    /// from the preserved set; the synthetic root is always expanded and is
    /// never rendered as a row.
    pub fn build(index: &TagIndex, expanded: &ExpandedPaths) -> Self {
        let mut tree = Self::empty();
        // stable insertion order keeps sibling tiebreaks reproducible
        let mut tags: Vec<&String> = index.records().keys().collect();
        tags.sort();
        for tag in tags {
            tree.insert_tag(tag, index.count(tag), index.last_used(tag), expanded);
        }
        tree
    }

    fn insert_tag(&mut self, full: &str, count: usize, last_used: i64, expanded: &ExpandedPaths) {
        let mut cur = self.root;
        let mut prefix = String::new();
        for part in full.split('/').filter(|p| !p.is_empty()) {
            if prefix.is_empty() {
                prefix.push_str(part);
            } else {
                prefix.push('/');
                prefix.push_str(part);
            }
            cur = match self.path_to_node.get(prefix.as_str()) {
                Some(&id) => id,
                None => {
                    let id = self.arena.new_node(TagNode {
                        name: part.to_string(),
                        full_path: prefix.clone(),
                        own_count: 0,
                        count: 0,
                        last_used: 0,
                        expanded: expanded.is_expanded(&prefix),
                    });
                    cur.append(id, &mut self.arena);
                    self.path_to_node.insert(prefix.clone(), id);
                    id
                }
            };
        }
        if cur != self.root {
            if let Some(node) = self.arena.get_mut(cur) {
                let data = node.get_mut();
                data.own_count = count;
                data.last_used = last_used;
            }
        }
    }

    /// Post-order aggregation: every node's `count` becomes own plus the
    /// sum of its children. Must run after `build` and before rendering or
    /// the displayed aggregates go stale.
    pub fn accumulate(&mut self) -> usize {
        self.accumulate_recursive(self.root)
    }

    fn accumulate_recursive(&mut self, node_id: NodeId) -> usize {
        // collect children first to avoid borrow issues
        let children: Vec<NodeId> = node_id.children(&self.arena).collect();
        let mut total = 0usize;
        for child in children {
            total += self.accumulate_recursive(child);
        }
        if let Some(node) = self.arena.get_mut(node_id) {
            let data = node.get_mut();
            data.count = data.own_count + total;
            total = data.count;
        }
        total
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arena<TagNode> {
        &self.arena
    }

    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        self.path_to_node.get(path).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&TagNode> {
        self.arena.get(id).map(|n| n.get())
    }

    pub fn set_expanded(&mut self, path: &str, on: bool) {
        if let Some(&id) = self.path_to_node.get(path) {
            if let Some(node) = self.arena.get_mut(id) {
                node.get_mut().expanded = on;
            }
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.path_to_node.contains_key(path)
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        id.children(&self.arena).next().is_some()
    }

    /// Children ordered by the configured sort key, ties broken by name so
    /// the ordering is fully deterministic.
    pub fn sorted_children(&self, id: NodeId, cfg: &PanelConfig) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = id.children(&self.arena).collect();
        out.sort_by(|a, b| self.compare_siblings(*a, *b, cfg));
        out
    }

    fn compare_siblings(&self, a: NodeId, b: NodeId, cfg: &PanelConfig) -> Ordering {
        let (Some(na), Some(nb)) = (self.node(a), self.node(b)) else {
            return Ordering::Equal;
        };
        let primary = match cfg.sort_by {
            SortKey::Count => na.count.cmp(&nb.count),
            SortKey::Latest => na.last_used.cmp(&nb.last_used),
        };
        let primary = match cfg.sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| na.name.cmp(&nb.name))
    }

    /// Full paths of everything underneath `id`, depth-first, excluding the
    /// node itself. Used to batch bar animations for a subtree.
    pub fn descendant_paths(&self, id: NodeId) -> Vec<String> {
        id.descendants(&self.arena)
            .skip(1)
            .filter_map(|d| self.node(d).map(|n| n.full_path.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_children(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(entries: &[(&str, usize, i64)]) -> TagIndex {
        let mut index = TagIndex::new();
        let mut files = Vec::new();
        for (tag, count, mtime) in entries {
            for i in 0..*count {
                files.push((format!("{tag}-{i}.md"), vec![tag.to_string()], *mtime));
            }
        }
        index.initialize(files);
        index
    }

    #[test]
    fn aggregates_match_worked_example() {
        let index = index_of(&[("proj/x", 3, 10), ("proj/y", 1, 20), ("misc", 1, 5)]);
        let mut tree = TagTree::build(&index, &ExpandedPaths::new());
        tree.accumulate();

        let proj = tree.lookup("proj").expect("intermediate node exists");
        assert_eq!(tree.node(proj).unwrap().count, 4);
        assert_eq!(tree.node(proj).unwrap().own_count, 0);
        let x = tree.lookup("proj/x").unwrap();
        assert_eq!(tree.node(x).unwrap().count, 3);
        let misc = tree.lookup("misc").unwrap();
        assert_eq!(tree.node(misc).unwrap().count, 1);
        assert_eq!(index.recompute_max(), 4);
    }

    #[test]
    fn accumulate_is_idempotent() {
        let index = index_of(&[("a/b", 2, 1), ("a", 1, 1)]);
        let mut tree = TagTree::build(&index, &ExpandedPaths::new());
        let first = tree.accumulate();
        let second = tree.accumulate();
        assert_eq!(first, second);
        let a = tree.lookup("a").unwrap();
        // own count at "a" survives reaggregation
        assert_eq!(tree.node(a).unwrap().count, 3);
    }

    #[test]
    fn new_nodes_start_collapsed_unless_preserved() {
        let index = index_of(&[("p/x", 1, 1), ("q/y", 1, 1)]);
        let mut expanded = ExpandedPaths::new();
        expanded.expand("p");
        let tree = TagTree::build(&index, &expanded);
        assert!(tree.node(tree.lookup("p").unwrap()).unwrap().expanded);
        assert!(!tree.node(tree.lookup("q").unwrap()).unwrap().expanded);
        assert!(tree.node(tree.root()).unwrap().expanded);
    }

    #[test]
    fn sibling_sort_by_count_desc_breaks_ties_by_name() {
        let index = index_of(&[("b", 2, 1), ("c", 1, 1), ("a", 1, 1)]);
        let mut tree = TagTree::build(&index, &ExpandedPaths::new());
        tree.accumulate();
        let cfg = PanelConfig::default();
        let names: Vec<String> = tree
            .sorted_children(tree.root(), &cfg)
            .into_iter()
            .map(|id| tree.node(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn sibling_sort_by_latest_asc() {
        let index = index_of(&[("old", 1, 10), ("new", 1, 99), ("mid", 1, 50)]);
        let mut tree = TagTree::build(&index, &ExpandedPaths::new());
        tree.accumulate();
        let mut cfg = PanelConfig::default();
        cfg.sort_by = SortKey::Latest;
        cfg.sort_order = SortOrder::Asc;
        let names: Vec<String> = tree
            .sorted_children(tree.root(), &cfg)
            .into_iter()
            .map(|id| tree.node(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["old", "mid", "new"]);
    }

    #[test]
    fn descendant_paths_cover_the_subtree() {
        let index = index_of(&[("a/b/c", 1, 1), ("a/d", 1, 1), ("z", 1, 1)]);
        let tree = TagTree::build(&index, &ExpandedPaths::new());
        let a = tree.lookup("a").unwrap();
        let mut paths = tree.descendant_paths(a);
        paths.sort();
        assert_eq!(paths, vec!["a/b", "a/b/c", "a/d"]);
    }

    #[test]
    fn empty_segments_are_skipped() {
        let mut index = TagIndex::new();
        index.apply_file_tags("a.md", vec!["weird//tag".to_string()], 1);
        let tree = TagTree::build(&index, &ExpandedPaths::new());
        assert!(tree.contains("weird/tag"));
        assert!(!tree.contains("weird//tag"));
    }
}
