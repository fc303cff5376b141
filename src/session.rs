//! The panel session. Owns the index, the tree, the row layer, the bar
//! overlay and every timer, and advances all of it from a single
//! caller-driven clock: the host calls [`PanelSession::tick`] once per
//! frame and [`PanelSession::frame`] to paint. Everything else (host file
//! events, user input) funnels through explicit methods, so the whole
//! choreography is deterministic and testable with synthetic instants.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::PanelConfig;
use crate::expand::ExpandedPaths;
use crate::idle::IdleTimer;
use crate::index::TagIndex;
use crate::layout;
use crate::overlay::{BarOverlay, BarView};
use crate::reconcile::{self, HostEvent, Reconciler, Refresh};
use crate::rows::{RowTree, RowView};
use crate::schedule::{OpCounter, OpToken, Scheduler, SyncWindow, TimerId};
use crate::store::NoteStore;
use crate::tree::TagTree;

pub const PANEL_VIEW_TYPE: &str = "tag-tree-view";
pub const PANEL_ICON: &str = "list-tree";
pub const PANEL_TITLE: &str = "Tag tree panel";
pub const OPEN_PANEL_COMMAND: &str = "open-tag-tree-view";

/// Two frames of settle time before targeted bar creation retries begin.
const CREATE_BAR_DELAY: Duration = Duration::from_millis(32);
const FRAME: Duration = Duration::from_millis(16);
const CREATE_BAR_ATTEMPTS: u32 = 6;
const DEFER_SHORT: Duration = Duration::from_millis(120);

/// Something the panel wants the host to do in response to user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    OpenSearch { query: String },
}

/// Drag payload for a tag row: plain text for generic drop targets plus
/// the bare tag path for targets that understand tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub text: String,
    pub tag: String,
}

/// Everything the renderer needs for one frame.
#[derive(Debug)]
pub struct PanelFrame {
    pub rows: Vec<RowView>,
    pub bars: Vec<BarView>,
    /// Global bar fill alpha for the current idle state.
    pub bar_alpha: f32,
    pub idle: bool,
    pub content_height: f32,
}

#[derive(Debug, Clone)]
enum Task {
    /// Reveal a freshly expanded subtree's bars partway through the
    /// height slide.
    ExpandPreheat { parent: String, op: OpToken },
    /// After the reveal play finishes: drop top locks and reconverge.
    ExpandSettle { op: OpToken },
    /// The height slide reached its target; keep the overlay glued while
    /// everything comes to rest.
    ExpandHeightEnd { op: OpToken },
    /// Start the row-height collapse once the bars have mostly shrunk.
    CollapseSlide { parent: String, op: OpToken },
    /// The collapse slide finished: remove the block and its bars.
    CollapseFinish { parent: String, op: OpToken },
    DeferredRebuild,
    /// Targeted creation with a bounded retry budget.
    CreateBars { paths: Vec<String>, attempts: u32 },
    /// Reap a bar whose removal animation has run its course.
    RemoveBar { path: String },
}

pub struct PanelSession<S: NoteStore> {
    config: PanelConfig,
    store: S,
    index: TagIndex,
    expanded: ExpandedPaths,
    tree: TagTree,
    rows: RowTree,
    overlay: BarOverlay,
    idle: IdleTimer,
    scheduler: Scheduler<Task>,
    reconciler: Reconciler,
    sync: SyncWindow,
    ops: OpCounter,
    deferred_rebuild: Option<TimerId>,
    max_count: usize,
    container_width: f32,
    disposed: bool,
}

impl<S: NoteStore> PanelSession<S> {
    /// Scans the store, builds the tree and lays everything out. Tags come
    /// from the host cache, falling back to raw content for notes whose
    /// cache has no frontmatter view yet.
    pub fn init(store: S, config: PanelConfig, container_width: f32, now: Instant) -> Self {
        let mut index = TagIndex::new();
        let files: Vec<(String, Vec<String>, i64)> = store
            .list_notes()
            .into_iter()
            .map(|meta| {
                let tags = reconcile::resolve_full(&store, &meta.path);
                (meta.path, tags, meta.mtime)
            })
            .collect();
        let scanned = files.len();
        index.initialize(files);
        info!(files = scanned, tags = index.records().len(), "panel session initialized");

        let idle = IdleTimer::new(&config, now);
        let mut session = Self {
            store,
            index,
            expanded: ExpandedPaths::new(),
            tree: TagTree::empty(),
            rows: RowTree::new(),
            overlay: BarOverlay::new(),
            idle,
            scheduler: Scheduler::new(),
            reconciler: Reconciler::new(),
            sync: SyncWindow::new(),
            ops: OpCounter::new(),
            deferred_rebuild: None,
            max_count: 1,
            container_width,
            disposed: false,
            config,
        };
        session.build_structure();
        session.rebuild_overlay(now);
        session
    }

    /// Forwards a host change notification into the reconciler and applies
    /// whatever it resolves right away.
    pub fn handle_event(&mut self, event: HostEvent, now: Instant) {
        if self.disposed {
            return;
        }
        let refreshes =
            self.reconciler.handle_event(event, &mut self.index, &self.store, &self.config, now);
        for refresh in refreshes {
            self.apply_refresh(refresh, now);
        }
    }

    /// One frame: fire due timers, apply resolved changes, and keep the
    /// overlay glued to the rows while a sync window is open.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.idle.tick(now);
        let refreshes = self.reconciler.tick(&mut self.index, &self.store, &self.config, now);
        for refresh in refreshes {
            self.apply_refresh(refresh, now);
        }
        for task in self.scheduler.poll(now) {
            self.run_task(task, now);
        }
        if self.sync.on_tick(now) {
            self.rebuild_overlay(now);
        }
    }

    /// Expand or collapse a node, with the full staggered choreography.
    pub fn toggle(&mut self, path: &str, now: Instant) {
        if self.disposed {
            return;
        }
        self.idle.note_input(&self.config, now);
        let Some(node_id) = self.tree.lookup(path) else {
            return;
        };
        if !self.tree.has_children(node_id) {
            self.rebuild_overlay(now);
            return;
        }
        let op = self.ops.begin();
        let expanding = self.expanded.toggle(path);
        self.tree.set_expanded(path, expanding);

        if expanding {
            let block = self.rows.begin_expand(path, &self.tree, &self.config, now);
            if block.is_empty() {
                self.rebuild_overlay(now);
                return;
            }
            debug!(%path, rows = block.len(), "expand");
            // park the block's bars at their final rectangles, invisible;
            // the preheat play reveals them
            let slots = self.rows.slots(&self.config, now);
            let targets =
                layout::bar_targets(&slots, self.container_width, self.max_count, &self.config);
            let members: HashSet<&str> = block.iter().map(String::as_str).collect();
            for target in &targets {
                if members.contains(target.path.as_str()) {
                    self.overlay.create_hidden(target, &self.config, now);
                }
            }
            let preheat =
                self.config.expand_duration.saturating_sub(self.config.bar_preheat_expand_ms);
            self.scheduler.schedule(
                Duration::from_millis(preheat),
                Task::ExpandPreheat { parent: path.to_string(), op },
                now,
            );
            self.scheduler.schedule(
                Duration::from_millis(self.config.expand_duration),
                Task::ExpandHeightEnd { op },
                now,
            );
        } else {
            debug!(%path, "collapse");
            let descendants = self.tree.descendant_paths(node_id);
            self.overlay.lock_tops(&descendants, now);
            let play = self.overlay.play_collapse(&descendants, &self.config, now);
            self.sync.extend(play, now);
            self.rows.mark_collapsed(path);
            let slide_delay = self
                .config
                .bar_collapse_duration
                .saturating_sub(self.config.bar_preheat_collapse_ms);
            self.scheduler.schedule(
                Duration::from_millis(slide_delay),
                Task::CollapseSlide { parent: path.to_string(), op },
                now,
            );
            let sync_ms = self.config.bar_collapse_duration.max(self.config.expand_duration) + 160;
            self.sync.extend(Duration::from_millis(sync_ms), now);
        }
    }

    /// A row label was activated; the host should search for the tag.
    pub fn activate(&mut self, path: &str, now: Instant) -> HostRequest {
        self.idle.note_input(&self.config, now);
        HostRequest::OpenSearch { query: format!("tag:#{path}") }
    }

    pub fn drag_payload(&self, path: &str) -> DragPayload {
        DragPayload { text: format!("#{path}"), tag: path.to_string() }
    }

    /// Any qualifying user input; wakes from idle and rearms the timer.
    pub fn note_input(&mut self, now: Instant) {
        self.idle.note_input(&self.config, now);
    }

    /// The panel was resized; re-derive bar geometry against the new width.
    pub fn set_viewport(&mut self, width: f32, now: Instant) {
        if self.disposed || (width - self.container_width).abs() < f32::EPSILON {
            return;
        }
        self.container_width = width;
        self.rebuild_overlay(now);
        self.sync
            .extend(Duration::from_millis(self.config.expand_duration.max(200)), now);
    }

    pub fn frame(&mut self, now: Instant) -> PanelFrame {
        PanelFrame {
            rows: self.rows.views(&self.config, now),
            bars: self.overlay.views(now),
            bar_alpha: self.idle.bar_alpha(&self.config),
            idle: self.idle.is_idle(),
            content_height: self.rows.content_height(now),
        }
    }

    /// Tears down all timers and pending work. The session stays queryable
    /// but inert afterwards.
    pub fn dispose(&mut self) {
        self.scheduler.clear();
        self.reconciler.clear();
        self.sync.clear();
        self.deferred_rebuild = None;
        self.disposed = true;
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Swap in a new configuration and re-render against it.
    pub fn set_config(&mut self, config: PanelConfig, now: Instant) {
        self.config = config;
        self.rebuild_structure(now);
        self.rebuild_overlay(now);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn apply_refresh(&mut self, refresh: Refresh, now: Instant) {
        self.max_count = self.index.recompute_max();
        match refresh {
            Refresh::Update(delta) => {
                if !delta.added.is_empty() {
                    self.structural_add(&delta.added, now);
                }
                if !delta.removed.is_empty() {
                    self.structural_remove(&delta.removed, now);
                }
                if !delta.changed.is_empty() {
                    self.patch_counts(&delta.changed, now);
                }
            }
            Refresh::Created(delta) => {
                if !delta.added.is_empty() {
                    self.structural_add(&delta.added, now);
                } else if !delta.changed.is_empty() {
                    self.patch_counts(&delta.changed, now);
                }
            }
            Refresh::Deleted(delta) => {
                if !delta.removed.is_empty() {
                    self.structural_remove(&delta.removed, now);
                } else {
                    // counts among survivors may have shifted
                    self.defer_rebuild(DEFER_SHORT, now);
                }
            }
        }
    }

    fn run_task(&mut self, task: Task, now: Instant) {
        match task {
            Task::ExpandPreheat { parent, op } => {
                if !self.ops.is_current(op) {
                    return;
                }
                let Some(node_id) = self.tree.lookup(&parent) else {
                    return;
                };
                let descendants = self.tree.descendant_paths(node_id);
                // a row that appeared since the toggle may still lack a
                // bar; park one before the play
                let slots = self.rows.slots(&self.config, now);
                let targets =
                    layout::bar_targets(&slots, self.container_width, self.max_count, &self.config);
                for target in &targets {
                    if descendants.contains(&target.path) && !self.overlay.contains(&target.path) {
                        self.overlay.create_hidden(target, &self.config, now);
                    }
                }
                let total = self.overlay.play_expand(&descendants, &self.config, now);
                self.sync.extend(total, now);
                self.scheduler.schedule(total, Task::ExpandSettle { op }, now);
            }
            Task::ExpandSettle { op } => {
                if !self.ops.is_current(op) {
                    return;
                }
                self.overlay.unlock_all();
                self.rebuild_overlay(now);
            }
            Task::ExpandHeightEnd { op } => {
                if !self.ops.is_current(op) {
                    return;
                }
                self.sync
                    .extend(Duration::from_millis(self.config.expand_duration + 80), now);
            }
            Task::CollapseSlide { parent, op } => {
                if !self.ops.is_current(op) {
                    return;
                }
                if self.rows.begin_collapse(&parent, &self.config, now) {
                    self.scheduler.schedule(
                        Duration::from_millis(self.config.expand_duration),
                        Task::CollapseFinish { parent, op },
                        now,
                    );
                }
            }
            Task::CollapseFinish { parent, op } => {
                if !self.ops.is_current(op) {
                    return;
                }
                let descendants = self
                    .tree
                    .lookup(&parent)
                    .map(|id| self.tree.descendant_paths(id))
                    .unwrap_or_default();
                self.rows.finish_collapse(&parent);
                self.overlay.remove_paths(&descendants);
                self.overlay.unlock_all();
                self.rebuild_overlay(now);
            }
            Task::DeferredRebuild => {
                self.deferred_rebuild = None;
                self.rebuild_overlay(now);
            }
            Task::CreateBars { paths, attempts } => self.create_bars(paths, attempts, now),
            Task::RemoveBar { path } => {
                // a tag that came back mid-animation keeps its bar
                if self.overlay.is_removing(&path) {
                    self.overlay.remove_path(&path);
                }
            }
        }
    }

    /// Tags entered existence: rebuild the structure and grow their bars in.
    fn structural_add(&mut self, tags: &[String], now: Instant) {
        debug!(tags = tags.len(), "tags entered existence");
        self.rebuild_structure(now);
        self.create_bars(tags.to_vec(), CREATE_BAR_ATTEMPTS, now);
        self.sync
            .extend(Duration::from_millis(self.config.expand_duration + 80), now);
    }

    /// Tags left existence: rebuild, play each bar's removal, reap later.
    fn structural_remove(&mut self, tags: &[String], now: Instant) {
        debug!(tags = tags.len(), "tags left existence");
        self.rebuild_structure(now);
        for tag in tags {
            if self.overlay.play_remove(tag, &self.config, now) {
                let ttl = Duration::from_millis(self.config.bar_collapse_duration.max(120));
                self.scheduler.schedule(ttl, Task::RemoveBar { path: tag.clone() }, now);
            }
        }
        self.defer_rebuild(DEFER_SHORT, now);
    }

    /// Pure count movement: patch the visible rows (the changed tags and
    /// every ancestor whose aggregate moved with them) and retarget their
    /// bar widths.
    fn patch_counts(&mut self, tags: &[String], now: Instant) {
        let mut affected: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for tag in tags {
            for (i, _) in tag.match_indices('/') {
                let prefix = &tag[..i];
                if self.rows.index_of(prefix).is_some() && seen.insert(prefix.to_string()) {
                    affected.push(prefix.to_string());
                }
            }
            if self.rows.index_of(tag).is_some() && seen.insert(tag.clone()) {
                affected.push(tag.clone());
            }
        }
        if affected.is_empty() {
            return;
        }
        for path in &affected {
            let aggregate = self.index.aggregate(path);
            self.rows.patch_count(path, aggregate);
        }
        let slots = self.rows.slots(&self.config, now);
        let missing = self.overlay.update_bars(
            &affected,
            &slots,
            self.container_width,
            self.max_count,
            &self.config,
            now,
        );
        if !missing.is_empty() {
            self.scheduler.schedule(
                CREATE_BAR_DELAY,
                Task::CreateBars { paths: missing, attempts: CREATE_BAR_ATTEMPTS },
                now,
            );
        }
        self.sync
            .extend(Duration::from_millis(self.config.bar_animation_duration.max(120)), now);
    }

    /// Tree + rows from the current index, expansion preserved by path.
    fn build_structure(&mut self) {
        let index = &self.index;
        self.expanded.prune(|p| {
            index.records().keys().any(|t| {
                t.as_str() == p
                    || (t.len() > p.len() && t.starts_with(p) && t.as_bytes()[p.len()] == b'/')
            })
        });
        self.tree = TagTree::build(&self.index, &self.expanded);
        self.tree.accumulate();
        self.max_count = self.index.recompute_max();
        self.rows.rebuild(&self.tree, &self.config);
    }

    /// A structural re-render: supersedes in-flight toggles, then revives
    /// any bar left parked invisible by one of them.
    fn rebuild_structure(&mut self, now: Instant) {
        self.ops.begin();
        self.build_structure();
        let stuck: Vec<String> = self
            .overlay
            .hidden_paths()
            .into_iter()
            .filter(|p| self.rows.index_of(p).is_some())
            .collect();
        if !stuck.is_empty() {
            self.overlay.play_expand(&stuck, &self.config, now);
        }
        self.sync
            .extend(Duration::from_millis(self.config.expand_duration + 80), now);
    }

    fn rebuild_overlay(&mut self, now: Instant) {
        let slots = self.rows.slots(&self.config, now);
        let instant = self.sync.instant(now);
        self.overlay.rebuild(
            &slots,
            self.container_width,
            self.max_count,
            &self.config,
            instant,
            now,
        );
    }

    fn create_bars(&mut self, paths: Vec<String>, attempts: u32, now: Instant) {
        let slots = self.rows.slots(&self.config, now);
        let targets =
            layout::bar_targets(&slots, self.container_width, self.max_count, &self.config);
        let mut remaining = Vec::new();
        for path in paths {
            match targets.iter().find(|t| t.path == path) {
                Some(target) => self.overlay.create_bar(target, &self.config, now),
                None => remaining.push(path),
            }
        }
        if remaining.is_empty() {
            return;
        }
        if attempts > 1 {
            self.scheduler.schedule(
                FRAME,
                Task::CreateBars { paths: remaining, attempts: attempts - 1 },
                now,
            );
        } else {
            self.defer_rebuild(DEFER_SHORT, now);
        }
    }

    fn defer_rebuild(&mut self, delay: Duration, now: Instant) {
        if let Some(id) = self.deferred_rebuild.take() {
            self.scheduler.cancel(id);
        }
        self.deferred_rebuild = Some(self.scheduler.schedule(delay, Task::DeferredRebuild, now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const WIDTH: f32 = 400.0;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn session_with(files: &[(&str, &str, i64)]) -> (PanelSession<MemoryStore>, Instant) {
        let mut store = MemoryStore::new();
        for (path, content, mtime) in files {
            store.put(path, content, *mtime);
        }
        let t0 = Instant::now();
        (PanelSession::init(store, PanelConfig::default(), WIDTH, t0), t0)
    }

    fn bar<'a>(frame: &'a PanelFrame, path: &str) -> &'a BarView {
        frame
            .bars
            .iter()
            .find(|b| b.path == path)
            .unwrap_or_else(|| panic!("no bar for {path}"))
    }

    fn row<'a>(frame: &'a PanelFrame, path: &str) -> &'a RowView {
        frame
            .rows
            .iter()
            .find(|r| r.path == path)
            .unwrap_or_else(|| panic!("no row for {path}"))
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.5
    }

    #[test]
    fn init_lays_out_rows_and_settled_bars() {
        let (mut session, t0) = session_with(&[
            ("n1.md", "#proj/x", 100),
            ("n2.md", "#proj/x", 200),
            ("n3.md", "#proj/x #proj/y #misc", 300),
        ]);
        let frame = session.frame(t0);

        // collapsed: only top-level rows, sorted by aggregate count desc
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].path, "proj");
        assert_eq!(frame.rows[0].count, 4, "aggregate of the subtree");
        assert_eq!(frame.rows[1].path, "misc");

        // width = count / max_aggregate * min(maxBarWidth, available)
        assert!(close(bar(&frame, "proj").width, 300.0));
        assert!(close(bar(&frame, "misc").width, 75.0));
        assert!(close(bar(&frame, "misc").top, 30.0));
        assert!(!frame.idle);
        assert!(close(frame.bar_alpha, 0.30));
    }

    #[test]
    fn repeated_slashes_fold_into_one_tag() {
        let (mut session, t0) = session_with(&[
            ("n1.md", "#proj/x", 100),
            ("n2.md", "#proj//x", 200),
        ]);
        let frame = session.frame(t0);

        // `proj//x` normalizes to `proj/x`; the aggregate keeps both counts
        assert_eq!(frame.rows.len(), 1);
        assert_eq!(frame.rows[0].path, "proj");
        assert_eq!(frame.rows[0].count, 2);
        assert_eq!(frame.bars.len(), 1);
    }

    #[test]
    fn expand_reveals_bars_at_preheat_and_reconverges() {
        let (mut session, t0) = session_with(&[
            ("n1.md", "#proj/x", 100),
            ("n2.md", "#proj/x", 200),
            ("n3.md", "#proj/x #proj/y #misc", 300),
        ]);
        session.toggle("proj", t0);

        // block bars exist immediately, parked invisible at final geometry
        session.tick(t0 + ms(16));
        let frame = session.frame(t0 + ms(16));
        assert!(close(bar(&frame, "proj/x").top, 30.0));
        assert!(close(bar(&frame, "proj/x").scale, 0.0));
        assert!(close(bar(&frame, "proj/x").alpha, 0.0));

        // no sync window yet: the follower's bar holds its old position
        // while its row slides down
        session.tick(t0 + ms(100));
        let frame = session.frame(t0 + ms(100));
        assert!(close(bar(&frame, "misc").top, 30.0));
        assert!(row(&frame, "misc").top > 35.0);

        // preheat at expand_duration - preheat = 220: the reveal begins
        // and the sync window starts tracking
        session.tick(t0 + ms(220));
        session.tick(t0 + ms(240));
        let frame = session.frame(t0 + ms(240));
        let x = bar(&frame, "proj/x");
        assert!(x.scale > 0.0 && x.scale < 1.0, "revealing, got {}", x.scale);
        assert!(x.alpha > 0.0);

        for t in [320u64, 520, 620, 736, 900] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(900));
        assert!(close(bar(&frame, "proj/x").scale, 1.0));
        assert!(close(bar(&frame, "proj/x").alpha, 1.0));
        assert!(close(bar(&frame, "proj/y").top, 60.0));
        assert!(close(bar(&frame, "misc").top, 90.0));
        assert!(close(row(&frame, "misc").top, 90.0));
        assert!(close(frame.content_height, 120.0));
    }

    #[test]
    fn collapse_shrinks_bars_then_slides_rows_away() {
        let (mut session, t0) = session_with(&[
            ("n1.md", "#proj/x", 100),
            ("n2.md", "#proj/x", 200),
            ("n3.md", "#proj/x #proj/y #misc", 300),
        ]);
        session.toggle("proj", t0);
        for t in [220u64, 320, 520, 736, 900] {
            session.tick(t0 + ms(t));
        }

        session.toggle("proj", t0 + ms(1000));

        // bars shrink first; rows have not moved yet
        session.tick(t0 + ms(1100));
        let frame = session.frame(t0 + ms(1100));
        assert!(bar(&frame, "proj/x").scale < 1.0);
        assert!(close(row(&frame, "proj/x").clip, 1.0));
        assert!(close(row(&frame, "misc").top, 90.0));

        // slide starts at collapse_duration - preheat = 140 after toggle
        session.tick(t0 + ms(1140));
        session.tick(t0 + ms(1300));
        let frame = session.frame(t0 + ms(1300));
        assert!(row(&frame, "proj/y").clip < 0.01, "deepest row hides first");
        assert!(row(&frame, "proj/x").clip < 1.0);
        assert!(row(&frame, "misc").top < 90.0);
        // the shrinking bar stays pinned where it was locked
        assert!(close(bar(&frame, "proj/x").top, 30.0));

        // slide end at 1140 + expand_duration: block rows and bars go
        for t in [1460u64, 1480, 1650] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(1650));
        assert_eq!(frame.rows.len(), 2);
        assert!(frame.bars.iter().all(|b| b.path != "proj/x" && b.path != "proj/y"));
        assert!(close(bar(&frame, "misc").top, 30.0));
        assert!(close(frame.content_height, 60.0));
    }

    #[test]
    fn retoggle_supersedes_the_pending_expand() {
        let (mut session, t0) = session_with(&[
            ("n1.md", "#proj/x", 100),
            ("n3.md", "#proj/x #proj/y #misc", 300),
        ]);
        session.toggle("proj", t0);
        session.toggle("proj", t0 + ms(50));

        // the stale preheat at 220 and height-end at 320 are no-ops;
        // the collapse choreography runs to completion
        for t in [190u64, 220, 320, 510, 530, 700] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(700));
        assert_eq!(frame.rows.len(), 2);
        assert!(frame.bars.iter().all(|b| b.path != "proj/x"));
        // hidden block bars never got revealed and never leaked
        assert!(frame.bars.iter().all(|b| b.alpha > 0.5));
    }

    #[test]
    fn count_movement_patches_rows_and_eases_widths() {
        let (mut session, t0) = session_with(&[
            ("f1.md", "#a", 100),
            ("f2.md", "#a", 200),
            ("f3.md", "#b", 300),
        ]);
        session.store_mut().update("f3.md", "#a #b", 400);
        session.handle_event(HostEvent::CacheChanged { path: "f3.md".into() }, t0);

        let frame = session.frame(t0);
        assert_eq!(row(&frame, "a").count, 3, "row patched immediately");

        // the unchanged tag's width snaps to the new denominator on the
        // first sync tick; the changed tag's width eases to its target
        session.tick(t0 + ms(16));
        let frame = session.frame(t0 + ms(16));
        assert!(close(bar(&frame, "b").width, 100.0));

        for t in [200u64, 400, 600] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(600));
        assert!(close(bar(&frame, "a").width, 300.0));
    }

    #[test]
    fn zero_crossing_add_grows_a_new_bar() {
        let (mut session, t0) = session_with(&[("f1.md", "#a", 100)]);
        session.store_mut().update("f1.md", "#a #c", 200);
        session.handle_event(HostEvent::CacheChanged { path: "f1.md".into() }, t0);

        let frame = session.frame(t0 + ms(16));
        assert_eq!(frame.rows.len(), 2, "structural rebuild added the row");
        assert!(bar(&frame, "c").width < 300.0, "still growing");

        for t in [16u64, 150, 400] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(400));
        assert!(close(bar(&frame, "c").width, 300.0));
        assert!(close(bar(&frame, "c").scale, 1.0));
    }

    #[test]
    fn zero_crossing_remove_plays_out_before_reaping() {
        let (mut session, t0) = session_with(&[
            ("f1.md", "#solo", 100),
            ("f2.md", "#keep", 200),
            ("f3.md", "#keep", 300),
        ]);
        session.store_mut().remove("f1.md");
        session.handle_event(HostEvent::Deleted { path: "f1.md".into() }, t0);

        let frame = session.frame(t0);
        assert!(frame.rows.iter().all(|r| r.path != "solo"), "row gone at once");
        assert!(frame.bars.iter().any(|b| b.path == "solo"), "bar lingers to animate");

        // the deferred rebuild at 120 must not reap the animating bar
        for t in [16u64, 100, 130] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(130));
        let solo = bar(&frame, "solo");
        assert!(solo.scale < 1.0);

        // reaped after max(120, collapse_duration) = 220
        session.tick(t0 + ms(220));
        let frame = session.frame(t0 + ms(220));
        assert!(frame.bars.iter().all(|b| b.path != "solo"));
    }

    #[test]
    fn tag_set_rotation_matches_the_classification() {
        // {a, b} -> {b, c}: c appears, a disappears, b only moves
        let (mut session, t0) = session_with(&[
            ("f1.md", "#a #b", 100),
            ("f2.md", "#b", 200),
        ]);
        session.store_mut().update("f1.md", "#b #c", 300);
        session.handle_event(HostEvent::CacheChanged { path: "f1.md".into() }, t0);

        let frame = session.frame(t0);
        let paths: Vec<&str> = frame.rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["b", "c"]);
        assert!(frame.bars.iter().any(|b| b.path == "a"), "a animates out");

        for t in [16u64, 100, 230, 400, 600] {
            session.tick(t0 + ms(t));
        }
        let frame = session.frame(t0 + ms(600));
        assert!(frame.bars.iter().all(|b| b.path != "a"));
        assert!(close(bar(&frame, "c").width, 150.0));
        assert!(close(bar(&frame, "b").width, 300.0));
    }

    #[test]
    fn idle_swaps_the_global_bar_alpha() {
        let (mut session, t0) = session_with(&[("f1.md", "#a", 100)]);
        session.tick(t0 + ms(7999));
        assert!(!session.frame(t0 + ms(7999)).idle);

        session.tick(t0 + ms(8000));
        let frame = session.frame(t0 + ms(8000));
        assert!(frame.idle);
        assert!(close(frame.bar_alpha, 0.95));

        session.note_input(t0 + ms(8100));
        let frame = session.frame(t0 + ms(8100));
        assert!(!frame.idle);
        assert!(close(frame.bar_alpha, 0.30));
    }

    #[test]
    fn resize_rederives_widths_against_the_new_container() {
        let (mut session, t0) = session_with(&[("f1.md", "#a", 100)]);
        session.set_viewport(300.0, t0 + ms(100));
        session.tick(t0 + ms(116));
        let frame = session.frame(t0 + ms(116));
        // available = 300 - 12 = 288, capped below maxBarWidth
        assert!(close(bar(&frame, "a").width, 288.0));
    }

    #[test]
    fn activation_and_drag_read_back_the_tag() {
        let (mut session, t0) = session_with(&[("f1.md", "#proj/x", 100)]);
        let request = session.activate("proj/x", t0);
        assert_eq!(request, HostRequest::OpenSearch { query: "tag:#proj/x".into() });

        let payload = session.drag_payload("proj/x");
        assert_eq!(payload.text, "#proj/x");
        assert_eq!(payload.tag, "proj/x");
    }

    #[test]
    fn disposed_session_ignores_everything() {
        let (mut session, t0) = session_with(&[("f1.md", "#a", 100)]);
        session.dispose();
        session.toggle("a", t0 + ms(10));
        session.handle_event(HostEvent::Deleted { path: "f1.md".into() }, t0 + ms(10));
        session.tick(t0 + ms(500));
        let frame = session.frame(t0 + ms(500));
        assert_eq!(frame.rows.len(), 1, "nothing applied after dispose");
    }
}
