//! Change reconciliation. Turns raw host notifications (file created,
//! deleted, renamed, modified, metadata cache changed) into classified tag
//! deltas, through the debounce/batch/recheck pipeline:
//!
//! * per-file modify debounce with a cache-vs-stored short circuit,
//! * immediate handling when the metadata cache itself disagrees,
//! * a batched flush for agreeing cache events, resolved against raw
//!   content after the frontmatter settle delay,
//! * a post-batch recheck that re-enqueues files whose content still
//!   disagrees with the index.
//!
//! Everything is driven by the caller's clock; nothing here spawns timers.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::PanelConfig;
use crate::index::{TagDelta, TagIndex};
use crate::schedule::{Scheduler, TimerId};
use crate::store::NoteStore;
use crate::tags;

/// A change notification from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Created { path: String },
    Deleted { path: String },
    Renamed { path: String, old_path: String },
    Modified { path: String },
    CacheChanged { path: String },
}

/// A reconciled change the panel must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh {
    /// Modify/cache pipeline result: dispatch added, removed and changed
    /// tags as present.
    Update(TagDelta),
    /// A created note: structural add when tags crossed zero, a plain
    /// counts patch otherwise.
    Created(TagDelta),
    /// A deleted note: structural removal when tags crossed zero; the
    /// overlay gets a deferred rebuild either way.
    Deleted(TagDelta),
}

#[derive(Debug, Clone)]
enum ReconcileTask {
    /// Debounced modify check: cache first, content second.
    ModifyCheck { path: String },
    /// Content phase of a modify check, after the frontmatter delay.
    ModifyContent { path: String },
    /// Flush the pending metadata batch.
    MetaFlush,
    /// Resolve and apply a whole batch.
    BatchApply { paths: Vec<String> },
    /// Re-verify a processed batch against raw content.
    Recheck { paths: Vec<String> },
    /// Content phase of a created-note resolution.
    CreateResolve { path: String },
}

#[derive(Debug, Default)]
pub struct Reconciler {
    scheduler: Scheduler<ReconcileTask>,
    modify_timers: HashMap<String, TimerId>,
    pending_meta: HashSet<String>,
    meta_timer: Option<TimerId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event<S: NoteStore>(
        &mut self,
        event: HostEvent,
        index: &mut TagIndex,
        store: &S,
        cfg: &PanelConfig,
        now: Instant,
    ) -> Vec<Refresh> {
        match event {
            HostEvent::Modified { path } => {
                if let Some(id) = self.modify_timers.remove(&path) {
                    self.scheduler.cancel(id);
                }
                let id = self.scheduler.schedule(
                    cfg.modify_debounce(),
                    ReconcileTask::ModifyCheck { path: path.clone() },
                    now,
                );
                self.modify_timers.insert(path, id);
                Vec::new()
            }
            HostEvent::CacheChanged { path } => {
                let cached = merged_cache(store, &path);
                let stored = index.file_tags(&path).unwrap_or_default();
                if !same_tag_set(&cached, stored) {
                    // the cache already disagrees: apply it now, and drop
                    // the path from the pending batch so it is not applied
                    // twice
                    self.pending_meta.remove(&path);
                    let mtime = note_mtime(store, &path);
                    let delta = index.apply_file_tags(&path, cached, mtime);
                    return refreshes(Refresh::Update(delta));
                }
                self.pending_meta.insert(path);
                if let Some(id) = self.meta_timer.take() {
                    self.scheduler.cancel(id);
                }
                self.meta_timer =
                    Some(self.scheduler.schedule(cfg.meta_batch_delay(), ReconcileTask::MetaFlush, now));
                Vec::new()
            }
            HostEvent::Created { path } => self.resolve_created(path, index, store, cfg, now),
            HostEvent::Deleted { path } => {
                let delta = index.remove_file(&path);
                debug!(%path, removed = delta.removed.len(), "note deleted");
                refreshes(Refresh::Deleted(delta))
            }
            HostEvent::Renamed { path, old_path } => {
                if index.rename_file(&old_path, &path) {
                    Vec::new()
                } else {
                    self.resolve_created(path, index, store, cfg, now)
                }
            }
        }
    }

    /// Fires everything due at `now`.
    pub fn tick<S: NoteStore>(
        &mut self,
        index: &mut TagIndex,
        store: &S,
        cfg: &PanelConfig,
        now: Instant,
    ) -> Vec<Refresh> {
        let mut out = Vec::new();
        for task in self.scheduler.poll(now) {
            match task {
                ReconcileTask::ModifyCheck { path } => {
                    self.modify_timers.remove(&path);
                    self.modify_check(&path, index, store, cfg, now, &mut out);
                }
                ReconcileTask::ModifyContent { path } => {
                    let resolved = resolve_content(store, &path);
                    let stored = index.file_tags(&path).unwrap_or_default();
                    if !same_tag_set(&resolved, stored) {
                        let mtime = note_mtime(store, &path);
                        out.push(Refresh::Update(index.apply_file_tags(&path, resolved, mtime)));
                    }
                }
                ReconcileTask::MetaFlush => {
                    self.meta_timer = None;
                    let paths: Vec<String> = self.pending_meta.drain().collect();
                    if paths.is_empty() {
                        continue;
                    }
                    let needs_content = paths.iter().any(|p| {
                        store.exists(p) && !cache_has_frontmatter(store, p)
                    });
                    let delay = if needs_content { cfg.frontmatter_delay() } else { Duration::ZERO };
                    self.scheduler.schedule(delay, ReconcileTask::BatchApply { paths }, now);
                }
                ReconcileTask::BatchApply { paths } => {
                    let mut merged = TagDelta::default();
                    for path in &paths {
                        if !store.exists(path) {
                            merged.merge(index.remove_file(path));
                            continue;
                        }
                        let tags = resolve_full(store, path);
                        let mtime = note_mtime(store, path);
                        merged.merge(index.apply_file_tags(path, tags, mtime));
                    }
                    debug!(
                        files = paths.len(),
                        added = merged.added.len(),
                        removed = merged.removed.len(),
                        "metadata batch applied"
                    );
                    if !merged.is_empty() {
                        out.push(Refresh::Update(merged));
                    }
                    self.scheduler.schedule(cfg.recheck_delay(), ReconcileTask::Recheck { paths }, now);
                }
                ReconcileTask::Recheck { paths } => {
                    let mut requeued = false;
                    for path in paths {
                        if !store.exists(&path) {
                            continue;
                        }
                        let resolved = resolve_full(store, &path);
                        let stored = index.file_tags(&path).unwrap_or_default();
                        if !same_tag_set(&resolved, stored) {
                            self.pending_meta.insert(path);
                            requeued = true;
                        }
                    }
                    if requeued {
                        if let Some(id) = self.meta_timer.take() {
                            self.scheduler.cancel(id);
                        }
                        self.meta_timer = Some(self.scheduler.schedule(
                            cfg.meta_batch_delay(),
                            ReconcileTask::MetaFlush,
                            now,
                        ));
                    }
                }
                ReconcileTask::CreateResolve { path } => {
                    let resolved = resolve_content(store, &path);
                    let mtime = note_mtime(store, &path);
                    let delta = index.apply_file_tags(&path, resolved, mtime);
                    if !delta.is_empty() {
                        out.push(Refresh::Created(delta));
                    }
                }
            }
        }
        out
    }

    fn modify_check<S: NoteStore>(
        &mut self,
        path: &str,
        index: &mut TagIndex,
        store: &S,
        cfg: &PanelConfig,
        now: Instant,
        out: &mut Vec<Refresh>,
    ) {
        let cached = merged_cache(store, path);
        let stored = index.file_tags(path).unwrap_or_default().to_vec();
        if !same_tag_set(&cached, &stored) {
            let mtime = note_mtime(store, path);
            out.push(Refresh::Update(index.apply_file_tags(path, cached, mtime)));
            return;
        }
        // cache agrees; only a raw read can still disagree
        if cache_has_frontmatter(store, path) {
            return;
        }
        self.scheduler.schedule(
            cfg.frontmatter_delay(),
            ReconcileTask::ModifyContent { path: path.to_string() },
            now,
        );
    }

    fn resolve_created<S: NoteStore>(
        &mut self,
        path: String,
        index: &mut TagIndex,
        store: &S,
        cfg: &PanelConfig,
        now: Instant,
    ) -> Vec<Refresh> {
        if cache_has_frontmatter(store, &path) {
            let tags = merged_cache(store, &path);
            let mtime = note_mtime(store, &path);
            let delta = index.apply_file_tags(&path, tags, mtime);
            if delta.is_empty() {
                return Vec::new();
            }
            return refreshes(Refresh::Created(delta));
        }
        self.scheduler.schedule(cfg.frontmatter_delay(), ReconcileTask::CreateResolve { path }, now);
        Vec::new()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn has_pending(&self) -> bool {
        !self.scheduler.is_empty() || !self.pending_meta.is_empty()
    }

    pub fn clear(&mut self) {
        self.scheduler.clear();
        self.modify_timers.clear();
        self.pending_meta.clear();
        self.meta_timer = None;
    }
}

fn refreshes(r: Refresh) -> Vec<Refresh> {
    let quiet = match &r {
        Refresh::Update(d) | Refresh::Created(d) => d.is_empty(),
        // deletions always reach the panel; it defers a rebuild either way
        Refresh::Deleted(_) => false,
    };
    if quiet {
        Vec::new()
    } else {
        vec![r]
    }
}

/// The cache's combined view of a note, empty when the host has none.
fn merged_cache<S: NoteStore>(store: &S, path: &str) -> Vec<String> {
    store.cached_tags(path).map(|c| c.merged()).unwrap_or_default()
}

fn cache_has_frontmatter<S: NoteStore>(store: &S, path: &str) -> bool {
    store
        .cached_tags(path)
        .map(|c| !c.frontmatter_tags().is_empty())
        .unwrap_or(false)
}

/// Raw-content resolution: inline plus frontmatter from the note body. A
/// failed read falls back to whatever the cache still says.
fn resolve_content<S: NoteStore>(store: &S, path: &str) -> Vec<String> {
    match store.read_note(path) {
        Ok(content) => tags::content_tags(&content),
        Err(_) => merged_cache(store, path),
    }
}

/// Cache when its frontmatter is usable, raw content otherwise. The
/// initial scan uses this too, so notes whose cache has not settled yet
/// still come up with their content-derived tags.
pub(crate) fn resolve_full<S: NoteStore>(store: &S, path: &str) -> Vec<String> {
    if cache_has_frontmatter(store, path) {
        merged_cache(store, path)
    } else {
        resolve_content(store, path)
    }
}

fn note_mtime<S: NoteStore>(store: &S, path: &str) -> i64 {
    store.mtime(path).unwrap_or_else(wall_ms)
}

fn wall_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Order-insensitive set equality, duplicates counted.
fn same_tag_set(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut x = a.to_vec();
    let mut y = b.to_vec();
    x.sort_unstable();
    y.sort_unstable();
    x == y
}
