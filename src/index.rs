//! Per-file tag sets and the derived usage counts. Counts never go
//! negative and a record disappears the moment its count reaches zero;
//! zero crossings are what decide between a cheap in-place patch and a
//! structural rebuild upstream.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TagRecord {
    pub count: usize,
    /// Milliseconds; highest mtime of any file carrying the tag.
    pub last_used: i64,
}

/// Outcome of one index mutation. `added` and `removed` carry only tags
/// that crossed zero (became used / became unused); `changed` carries every
/// tag whose count moved, crossing or not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn merge(&mut self, other: TagDelta) {
        for t in other.added {
            if !self.added.contains(&t) {
                self.added.push(t);
            }
        }
        for t in other.removed {
            if !self.removed.contains(&t) {
                self.removed.push(t);
            }
        }
        for t in other.changed {
            if !self.changed.contains(&t) {
                self.changed.push(t);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TagIndex {
    file_tags: HashMap<String, Vec<String>>,
    records: HashMap<String, TagRecord>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk load from the initial scan, replacing any previous state.
    /// Files with empty tag sets are recorded too; they matter for later
    /// diffs.
    pub fn initialize<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = (String, Vec<String>, i64)>,
    {
        self.file_tags.clear();
        self.records.clear();
        for (path, tags, mtime) in files {
            for tag in &tags {
                let rec = self.records.entry(tag.clone()).or_default();
                rec.count += 1;
                rec.last_used = rec.last_used.max(mtime);
            }
            self.file_tags.insert(path, tags);
        }
    }

    /// Replaces one file's tag set, returning the classified delta. A
    /// same-set replacement is a no-op (order differences do not count as
    /// change). `last_used` is raised to `mtime` for every tag present
    /// after the change.
    pub fn apply_file_tags(&mut self, path: &str, new_tags: Vec<String>, mtime: i64) -> TagDelta {
        let old = self.file_tags.get(path).cloned().unwrap_or_default();
        let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();
        let new_set: HashSet<&str> = new_tags.iter().map(String::as_str).collect();

        let mut delta = TagDelta::default();
        let file_added: Vec<&str> =
            new_tags.iter().map(String::as_str).filter(|t| !old_set.contains(*t)).collect();
        let file_removed: Vec<&str> =
            old.iter().map(String::as_str).filter(|t| !new_set.contains(*t)).collect();

        if file_added.is_empty() && file_removed.is_empty() {
            return delta;
        }

        for tag in file_added {
            let rec = self.records.entry(tag.to_string()).or_default();
            rec.count += 1;
            if rec.count == 1 {
                delta.added.push(tag.to_string());
            }
            delta.changed.push(tag.to_string());
        }
        for tag in file_removed {
            if self.decrement(tag) {
                delta.removed.push(tag.to_string());
            }
            delta.changed.push(tag.to_string());
        }
        for tag in &new_tags {
            if let Some(rec) = self.records.get_mut(tag.as_str()) {
                rec.last_used = rec.last_used.max(mtime);
            }
        }

        self.file_tags.insert(path.to_string(), new_tags);
        delta
    }

    /// Drops a file and decrements its tags. Unknown paths yield an empty
    /// delta.
    pub fn remove_file(&mut self, path: &str) -> TagDelta {
        let mut delta = TagDelta::default();
        let Some(old) = self.file_tags.remove(path) else {
            return delta;
        };
        for tag in old {
            if self.decrement(&tag) {
                delta.removed.push(tag.clone());
            }
            delta.changed.push(tag);
        }
        delta
    }

    /// Moves a file's set to a new path with no count movement. Returns
    /// false when the old path is unknown; the caller then treats the event
    /// as a create.
    pub fn rename_file(&mut self, old: &str, new: &str) -> bool {
        match self.file_tags.remove(old) {
            Some(tags) => {
                self.file_tags.insert(new.to_string(), tags);
                true
            }
            None => false,
        }
    }

    // true when the tag just crossed to zero
    fn decrement(&mut self, tag: &str) -> bool {
        if let Some(rec) = self.records.get_mut(tag) {
            rec.count = rec.count.saturating_sub(1);
            if rec.count == 0 {
                self.records.remove(tag);
                return true;
            }
        }
        false
    }

    pub fn file_tags(&self, path: &str) -> Option<&[String]> {
        self.file_tags.get(path).map(Vec::as_slice)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.file_tags.contains_key(path)
    }

    pub fn records(&self) -> &HashMap<String, TagRecord> {
        &self.records
    }

    pub fn count(&self, tag: &str) -> usize {
        self.records.get(tag).map_or(0, |r| r.count)
    }

    pub fn last_used(&self, tag: &str) -> i64 {
        self.records.get(tag).map_or(0, |r| r.last_used)
    }

    /// Highest aggregate count across all tag paths, counting every prefix
    /// of a nested tag (`proj/x` contributes to `proj` too, since that is
    /// what the tree displays). Floored at 1 so width ratios stay defined
    /// on an empty index.
    pub fn recompute_max(&self) -> usize {
        let mut agg: HashMap<&str, usize> = HashMap::new();
        for (tag, rec) in &self.records {
            for (i, _) in tag.match_indices('/') {
                *agg.entry(&tag[..i]).or_default() += rec.count;
            }
            *agg.entry(tag.as_str()).or_default() += rec.count;
        }
        agg.values().max().copied().unwrap_or(0).max(1)
    }

    /// Aggregate count for one path: its own occurrences plus everything
    /// nested beneath it. This is the number a row displays.
    pub fn aggregate(&self, path: &str) -> usize {
        let prefix = format!("{path}/");
        self.records
            .iter()
            .filter(|(tag, _)| tag.as_str() == path || tag.starts_with(&prefix))
            .map(|(_, rec)| rec.count)
            .sum()
    }
}
