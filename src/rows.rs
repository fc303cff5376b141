//! Retained row layer. Holds the flat display list of visible tag rows and
//! the subtree height slides that play while a parent expands or collapses.
//!
//! Rows snap to final positions on structural rebuilds; only the bar overlay
//! animates across those. Expand and collapse, by contrast, slide the
//! subtree's height here: rows inside the sliding block keep their final
//! offsets (the block clips them), rows after it shift by the block's
//! current deficit.

use std::time::{Duration, Instant};

use crate::anim::Transition;
use crate::config::PanelConfig;
use crate::layout::RowSlot;
use crate::tree::TagTree;

pub const ROW_HEIGHT: f32 = 24.0;
pub const ROW_GAP: f32 = 6.0;
pub const ROW_PITCH: f32 = ROW_HEIGHT + ROW_GAP;

#[derive(Debug, Clone)]
pub struct Row {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub count: usize,
    pub expanded: bool,
    pub has_children: bool,
}

/// A row plus its current geometry, for the renderer. `clip` is the visible
/// fraction: 1.0 fully shown, 0.0 hidden inside a collapsed block.
#[derive(Debug, Clone)]
pub struct RowView {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub count: usize,
    pub expanded: bool,
    pub has_children: bool,
    pub left: f32,
    pub top: f32,
    pub clip: f32,
}

#[derive(Debug)]
struct Slide {
    parent: String,
    height: Transition,
    collapsing: bool,
}

#[derive(Debug, Default)]
pub struct RowTree {
    rows: Vec<Row>,
    slides: Vec<Slide>,
}

impl RowTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regenerates the display list from the tree, final positions only.
    /// Any in-flight slide is dropped; the bar overlay carries the motion
    /// across rebuilds.
    pub fn rebuild(&mut self, tree: &TagTree, cfg: &PanelConfig) {
        self.rows.clear();
        self.slides.clear();
        Self::flatten(tree, tree.root(), 0, cfg, &mut self.rows);
    }

    fn flatten(tree: &TagTree, id: indextree::NodeId, depth: usize, cfg: &PanelConfig, out: &mut Vec<Row>) {
        for child in tree.sorted_children(id, cfg) {
            let Some(node) = tree.node(child) else { continue };
            let has_children = tree.has_children(child);
            out.push(Row {
                path: node.full_path.clone(),
                name: node.name.clone(),
                depth,
                count: node.count,
                expanded: node.expanded,
                has_children,
            });
            if node.expanded {
                Self::flatten(tree, child, depth + 1, cfg, out);
            }
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.path == path)
    }

    pub fn patch_count(&mut self, path: &str, count: usize) -> bool {
        if let Some(i) = self.index_of(path) {
            self.rows[i].count = count;
            true
        } else {
            false
        }
    }

    /// Paths currently displayed under `parent`, in display order.
    pub fn block_paths(&self, parent: &str) -> Vec<String> {
        let prefix = format!("{parent}/");
        self.rows
            .iter()
            .filter(|r| r.path.starts_with(&prefix))
            .map(|r| r.path.clone())
            .collect()
    }

    /// Inserts the subtree's rows after `parent` and starts its height
    /// slide from zero. If the block is still present from an unfinished
    /// collapse, no rows are inserted and the slide retargets back to full
    /// height. Returns the block's paths, empty when there is nothing to
    /// show.
    pub fn begin_expand(
        &mut self,
        parent: &str,
        tree: &TagTree,
        cfg: &PanelConfig,
        now: Instant,
    ) -> Vec<String> {
        let Some(parent_idx) = self.index_of(parent) else {
            return Vec::new();
        };
        self.rows[parent_idx].expanded = true;

        let existing = self.block_paths(parent);
        if !existing.is_empty() {
            let target = existing.len() as f32 * ROW_PITCH;
            let easing = cfg.easing();
            let dur = Duration::from_millis(cfg.expand_duration);
            if let Some(slide) = self.slides.iter_mut().find(|s| s.parent == parent) {
                slide.collapsing = false;
                slide.height.retarget(target, dur, easing, now);
            } else {
                self.slides.push(Slide {
                    parent: parent.to_string(),
                    height: Transition::animate(0.0, target, dur, easing, now),
                    collapsing: false,
                });
            }
            return existing;
        }

        let Some(node_id) = tree.lookup(parent) else {
            return Vec::new();
        };
        let depth = self.rows[parent_idx].depth;
        let mut block = Vec::new();
        Self::flatten(tree, node_id, depth + 1, cfg, &mut block);
        if block.is_empty() {
            return Vec::new();
        }

        let paths: Vec<String> = block.iter().map(|r| r.path.clone()).collect();
        let target = block.len() as f32 * ROW_PITCH;
        let mut tail = self.rows.split_off(parent_idx + 1);
        self.rows.append(&mut block);
        self.rows.append(&mut tail);

        self.slides.push(Slide {
            parent: parent.to_string(),
            height: Transition::animate(
                0.0,
                target,
                Duration::from_millis(cfg.expand_duration),
                cfg.easing(),
                now,
            ),
            collapsing: false,
        });
        paths
    }

    /// Flips the parent's chevron immediately; the height motion itself is
    /// started later by `begin_collapse`, once the bars have had their
    /// preheat.
    pub fn mark_collapsed(&mut self, parent: &str) {
        if let Some(i) = self.index_of(parent) {
            self.rows[i].expanded = false;
        }
    }

    /// Starts the block's height slide toward zero. Rows stay in the list,
    /// clipped, until `finish_collapse` removes them.
    pub fn begin_collapse(&mut self, parent: &str, cfg: &PanelConfig, now: Instant) -> bool {
        let block_len = self.block_paths(parent).len();
        if block_len == 0 {
            return false;
        }
        let natural = block_len as f32 * ROW_PITCH;
        let easing = cfg.easing();
        let dur = Duration::from_millis(cfg.expand_duration);
        if let Some(slide) = self.slides.iter_mut().find(|s| s.parent == parent) {
            slide.collapsing = true;
            slide.height.retarget(0.0, dur, easing, now);
        } else {
            self.slides.push(Slide {
                parent: parent.to_string(),
                height: Transition::animate(natural, 0.0, dur, easing, now),
                collapsing: true,
            });
        }
        true
    }

    /// Removes the collapsed block and its slide. Safe to call after a
    /// rebuild already removed the rows.
    pub fn finish_collapse(&mut self, parent: &str) {
        let prefix = format!("{parent}/");
        self.rows.retain(|r| !r.path.starts_with(&prefix));
        self.slides
            .retain(|s| s.parent != parent && !s.parent.starts_with(&prefix));
    }

    /// Per-slide block extent and current deficit (natural height minus the
    /// animated height). Finished expand slides report zero and are pruned.
    fn slide_spans(&mut self, now: Instant) -> Vec<(usize, usize, f32, f32)> {
        self.slides.retain(|s| s.collapsing || !s.height.done(now));
        let mut spans = Vec::with_capacity(self.slides.len());
        for slide in &self.slides {
            let prefix = format!("{}/", slide.parent);
            let mut first = None;
            let mut last = 0usize;
            let mut len = 0usize;
            for (i, row) in self.rows.iter().enumerate() {
                if row.path.starts_with(&prefix) {
                    if first.is_none() {
                        first = Some(i);
                    }
                    last = i;
                    len += 1;
                }
            }
            let Some(first) = first else { continue };
            let natural = len as f32 * ROW_PITCH;
            let h = slide.height.sample(now).clamp(0.0, natural);
            spans.push((first, last, natural - h, h));
        }
        spans
    }

    /// Current geometry for the bar layer. Every displayed row gets a slot;
    /// rows inside sliding blocks keep their final offsets, rows after a
    /// block shift up by its deficit.
    pub fn slots(&mut self, cfg: &PanelConfig, now: Instant) -> Vec<RowSlot> {
        let spans = self.slide_spans(now);
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let deficit: f32 =
                    spans.iter().filter(|(_, last, _, _)| *last < i).map(|(_, _, d, _)| d).sum();
                RowSlot {
                    path: row.path.clone(),
                    depth: row.depth,
                    left: cfg.sub_tag_indent * row.depth as f32,
                    top: i as f32 * ROW_PITCH - deficit,
                    height: ROW_HEIGHT,
                    count: row.count,
                }
            })
            .collect()
    }

    /// Rows with geometry and clip for the renderer.
    pub fn views(&mut self, cfg: &PanelConfig, now: Instant) -> Vec<RowView> {
        let spans = self.slide_spans(now);
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut deficit = 0.0;
                let mut clip: f32 = 1.0;
                for &(first, last, d, h) in &spans {
                    if last < i {
                        deficit += d;
                    } else if i >= first && i <= last {
                        let offset = (i - first) as f32 * ROW_PITCH;
                        clip = clip.min(((h - offset) / ROW_HEIGHT).clamp(0.0, 1.0));
                    }
                }
                RowView {
                    path: row.path.clone(),
                    name: row.name.clone(),
                    depth: row.depth,
                    count: row.count,
                    expanded: row.expanded,
                    has_children: row.has_children,
                    // text sits one indent step right of the row's alignment edge
                    left: cfg.sub_tag_indent * (row.depth + 1) as f32,
                    top: i as f32 * ROW_PITCH - deficit,
                    clip,
                }
            })
            .collect()
    }

    /// Total laid-out height, for scroll extents.
    pub fn content_height(&mut self, now: Instant) -> f32 {
        let total_deficit: f32 = self.slide_spans(now).iter().map(|(_, _, d, _)| d).sum();
        self.rows.len() as f32 * ROW_PITCH - total_deficit
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.slides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ExpandedPaths;
    use crate::index::TagIndex;

    fn sample_tree(expanded: &[&str]) -> TagTree {
        let mut index = TagIndex::new();
        index.initialize(vec![
            ("a.md".to_string(), vec!["proj/x".to_string()], 10),
            ("b.md".to_string(), vec!["proj/x".to_string()], 20),
            ("c.md".to_string(), vec!["proj/x".to_string(), "misc".to_string()], 30),
            ("d.md".to_string(), vec!["proj/y".to_string()], 40),
        ]);
        let mut ex = ExpandedPaths::new();
        for p in expanded {
            ex.expand(p);
        }
        let mut tree = TagTree::build(&index, &ex);
        tree.accumulate();
        tree
    }

    fn t0() -> Instant {
        Instant::now()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rebuild_lists_only_expanded_subtrees() {
        let cfg = PanelConfig::default();
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&[]), &cfg);
        let paths: Vec<&str> = rows.rows().iter().map(|r| r.path.as_str()).collect();
        // count desc: proj (4) before misc (1); children hidden
        assert_eq!(paths, vec!["proj", "misc"]);
        assert!(rows.rows()[0].has_children);
        assert!(!rows.rows()[0].expanded);
    }

    #[test]
    fn rebuild_descends_into_expanded_parents() {
        let cfg = PanelConfig::default();
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&["proj"]), &cfg);
        let paths: Vec<&str> = rows.rows().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["proj", "proj/x", "proj/y", "misc"]);
        assert_eq!(rows.rows()[1].depth, 1);
        assert_eq!(rows.rows()[1].count, 3);
    }

    #[test]
    fn expand_inserts_rows_and_slides_followers_down() {
        let cfg = PanelConfig::default();
        let now = t0();
        let tree_open = sample_tree(&["proj"]);
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&[]), &cfg);

        let inserted = rows.begin_expand("proj", &tree_open, &cfg, now);
        assert_eq!(inserted, vec!["proj/x".to_string(), "proj/y".to_string()]);

        // at the first instant the block has zero height: misc sits right
        // below proj
        let slots = rows.slots(&cfg, now);
        let misc = slots.iter().find(|s| s.path == "misc").unwrap();
        assert!((misc.top - ROW_PITCH).abs() < 1e-3);

        // after the slide, misc lands at its natural position
        let end = now + ms(cfg.expand_duration + 10);
        let slots = rows.slots(&cfg, end);
        let misc = slots.iter().find(|s| s.path == "misc").unwrap();
        assert!((misc.top - 3.0 * ROW_PITCH).abs() < 1e-3);
    }

    #[test]
    fn inner_rows_keep_final_offsets_during_expand() {
        let cfg = PanelConfig::default();
        let now = t0();
        let tree_open = sample_tree(&["proj"]);
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&[]), &cfg);
        rows.begin_expand("proj", &tree_open, &cfg, now);

        let mid = now + ms(cfg.expand_duration / 2);
        let slots = rows.slots(&cfg, mid);
        let x = slots.iter().find(|s| s.path == "proj/x").unwrap();
        assert!((x.top - ROW_PITCH).abs() < 1e-3);
    }

    #[test]
    fn expand_clip_reveals_rows_top_down() {
        let cfg = PanelConfig::default();
        let now = t0();
        let tree_open = sample_tree(&["proj"]);
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&[]), &cfg);
        rows.begin_expand("proj", &tree_open, &cfg, now);

        let views = rows.views(&cfg, now);
        let x = views.iter().find(|v| v.path == "proj/x").unwrap();
        assert_eq!(x.clip, 0.0);
        let end = now + ms(cfg.expand_duration + 10);
        let views = rows.views(&cfg, end);
        let x = views.iter().find(|v| v.path == "proj/x").unwrap();
        assert_eq!(x.clip, 1.0);
    }

    #[test]
    fn collapse_keeps_rows_until_finished() {
        let cfg = PanelConfig::default();
        let now = t0();
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&["proj"]), &cfg);
        assert_eq!(rows.len(), 4);

        rows.mark_collapsed("proj");
        assert!(rows.begin_collapse("proj", &cfg, now));
        assert_eq!(rows.len(), 4);

        // followers drift up as the block shrinks
        let end = now + ms(cfg.expand_duration + 10);
        let slots = rows.slots(&cfg, end);
        let misc = slots.iter().find(|s| s.path == "misc").unwrap();
        assert!((misc.top - ROW_PITCH).abs() < 1e-3);

        rows.finish_collapse("proj");
        assert_eq!(rows.len(), 2);
        let paths: Vec<&str> = rows.rows().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["proj", "misc"]);
    }

    #[test]
    fn reexpand_during_collapse_reuses_the_block() {
        let cfg = PanelConfig::default();
        let now = t0();
        let tree_open = sample_tree(&["proj"]);
        let mut rows = RowTree::new();
        rows.rebuild(&tree_open, &cfg);
        rows.mark_collapsed("proj");
        rows.begin_collapse("proj", &cfg, now);

        let mid = now + ms(100);
        let inserted = rows.begin_expand("proj", &tree_open, &cfg, mid);
        assert_eq!(inserted.len(), 2);
        assert_eq!(rows.len(), 4, "no duplicate rows on rapid re-expand");

        let end = mid + ms(cfg.expand_duration + 10);
        let slots = rows.slots(&cfg, end);
        let misc = slots.iter().find(|s| s.path == "misc").unwrap();
        assert!((misc.top - 3.0 * ROW_PITCH).abs() < 1e-3);
    }

    #[test]
    fn patch_count_touches_only_the_row() {
        let cfg = PanelConfig::default();
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&["proj"]), &cfg);
        assert!(rows.patch_count("proj/x", 7));
        assert!(!rows.patch_count("ghost", 1));
        let i = rows.index_of("proj/x").unwrap();
        assert_eq!(rows.rows()[i].count, 7);
    }

    #[test]
    fn content_height_tracks_the_slide() {
        let cfg = PanelConfig::default();
        let now = t0();
        let tree_open = sample_tree(&["proj"]);
        let mut rows = RowTree::new();
        rows.rebuild(&sample_tree(&[]), &cfg);
        assert!((rows.content_height(now) - 2.0 * ROW_PITCH).abs() < 1e-3);
        rows.begin_expand("proj", &tree_open, &cfg, now);
        assert!((rows.content_height(now) - 2.0 * ROW_PITCH).abs() < 1e-3);
        let end = now + ms(cfg.expand_duration + 10);
        assert!((rows.content_height(end) - 4.0 * ROW_PITCH).abs() < 1e-3);
    }
}
