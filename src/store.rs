//! Boundary to the hosting application: document enumeration, the metadata
//! cache view, and raw content reads. The engine only ever talks to these
//! traits; the filesystem vault and the in-memory test store both live
//! behind them.

use std::collections::BTreeMap;

use crate::tags;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Frontmatter tags as the host cache presents them: either an already
/// split list or the raw comma-joined scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterTags {
    List(Vec<String>),
    Scalar(String),
}

/// The metadata-cache view of one note. `frontmatter: None` means the cache
/// has not (yet) extracted frontmatter for this note, which is exactly the
/// case that forces a raw-content fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedTags {
    pub inline: Vec<String>,
    pub frontmatter: Option<FrontmatterTags>,
}

impl CachedTags {
    /// Normalized frontmatter tags; empty when the cache carries none.
    pub fn frontmatter_tags(&self) -> Vec<String> {
        match &self.frontmatter {
            None => Vec::new(),
            Some(FrontmatterTags::List(items)) => {
                let mut out = Vec::new();
                for item in items {
                    if let Some(tag) = tags::normalize(item) {
                        if !out.contains(&tag) {
                            out.push(tag);
                        }
                    }
                }
                out
            }
            Some(FrontmatterTags::Scalar(value)) => tags::split_scalar_list(value),
        }
    }

    /// Inline + frontmatter tags merged, normalized, deduplicated.
    pub fn merged(&self) -> Vec<String> {
        let mut out = Vec::new();
        for raw in &self.inline {
            if let Some(tag) = tags::normalize(raw) {
                if !out.contains(&tag) {
                    out.push(tag);
                }
            }
        }
        for tag in self.frontmatter_tags() {
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct NoteMeta {
    pub path: String,
    /// Modification time, milliseconds.
    pub mtime: i64,
}

/// Host document store + metadata cache.
pub trait NoteStore {
    /// Every eligible (markdown) document.
    fn list_notes(&self) -> Vec<NoteMeta>;
    /// The cache view, `None` when the host has no entry for the path.
    fn cached_tags(&self, path: &str) -> Option<CachedTags>;
    /// Raw content read, the fallback when the cache is not enough.
    fn read_note(&self, path: &str) -> Result<String, StoreError>;
    fn mtime(&self, path: &str) -> Option<i64>;
    fn exists(&self, path: &str) -> bool;
}

#[derive(Debug, Clone)]
struct MemoryNote {
    content: String,
    mtime: i64,
    cached: Option<CachedTags>,
}

/// In-memory store with an independently controllable cache, so tests can
/// stage cache-behind-content situations deliberately.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notes: BTreeMap<String, MemoryNote>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a note and derives a settled cache from its content.
    pub fn put(&mut self, path: &str, content: &str, mtime: i64) {
        let cached = Self::cache_from_content(content);
        self.notes.insert(
            path.to_string(),
            MemoryNote { content: content.to_string(), mtime, cached: Some(cached) },
        );
    }

    /// Inserts a note whose cache lags behind (`cached: None` simulates a
    /// host that has not scanned the file yet).
    pub fn put_with_cache(
        &mut self,
        path: &str,
        content: &str,
        mtime: i64,
        cached: Option<CachedTags>,
    ) {
        self.notes.insert(
            path.to_string(),
            MemoryNote { content: content.to_string(), mtime, cached },
        );
    }

    pub fn set_cache(&mut self, path: &str, cached: Option<CachedTags>) {
        if let Some(note) = self.notes.get_mut(path) {
            note.cached = cached;
        }
    }

    /// Rewrites content and cache together, as a settled host would end up.
    pub fn update(&mut self, path: &str, content: &str, mtime: i64) {
        self.put(path, content, mtime);
    }

    pub fn remove(&mut self, path: &str) {
        self.notes.remove(path);
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        if let Some(note) = self.notes.remove(old) {
            self.notes.insert(new.to_string(), note);
        }
    }

    fn cache_from_content(content: &str) -> CachedTags {
        let fm = tags::frontmatter_tags(content);
        CachedTags {
            inline: tags::inline_tags(content),
            frontmatter: if fm.is_empty() { None } else { Some(FrontmatterTags::List(fm)) },
        }
    }
}

impl NoteStore for MemoryStore {
    fn list_notes(&self) -> Vec<NoteMeta> {
        self.notes
            .iter()
            .map(|(path, note)| NoteMeta { path: path.clone(), mtime: note.mtime })
            .collect()
    }

    fn cached_tags(&self, path: &str) -> Option<CachedTags> {
        self.notes.get(path).and_then(|n| n.cached.clone())
    }

    fn read_note(&self, path: &str) -> Result<String, StoreError> {
        self.notes
            .get(path)
            .map(|n| n.content.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn mtime(&self, path: &str) -> Option<i64> {
        self.notes.get(path).map(|n| n.mtime)
    }

    fn exists(&self, path: &str) -> bool {
        self.notes.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_keeps_inline_before_frontmatter() {
        let cached = CachedTags {
            inline: vec!["#b".to_string()],
            frontmatter: Some(FrontmatterTags::List(vec!["a".to_string()])),
        };
        assert_eq!(cached.merged(), vec!["b", "a"]);
    }

    #[test]
    fn merged_dedupes_across_sources() {
        let cached = CachedTags {
            inline: vec!["#a".to_string(), "b".to_string()],
            frontmatter: Some(FrontmatterTags::List(vec!["b".to_string(), "c".to_string()])),
        };
        assert_eq!(cached.merged(), vec!["a", "b", "c"]);
    }

    #[test]
    fn scalar_frontmatter_splits_on_commas() {
        let cached = CachedTags {
            inline: vec![],
            frontmatter: Some(FrontmatterTags::Scalar("x, #y".to_string())),
        };
        assert_eq!(cached.frontmatter_tags(), vec!["x", "y"]);
        // a single bare scalar is one tag through the cache
        let one = CachedTags {
            inline: vec![],
            frontmatter: Some(FrontmatterTags::Scalar("solo".to_string())),
        };
        assert_eq!(one.frontmatter_tags(), vec!["solo"]);
    }

    #[test]
    fn memory_store_rename_moves_note() {
        let mut store = MemoryStore::new();
        store.put("a.md", "#x", 10);
        store.rename("a.md", "b.md");
        assert!(!store.exists("a.md"));
        assert!(store.exists("b.md"));
        assert_eq!(store.mtime("b.md"), Some(10));
    }

    #[test]
    fn missing_read_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.read_note("nope.md"), Err(StoreError::NotFound(_))));
    }
}
