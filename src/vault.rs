//! Filesystem-backed note store. Walks a vault directory for markdown
//! notes and keeps its own metadata cache, the extracted tag view of each
//! note, behind the `NoteStore` boundary. The watcher refreshes single
//! cache entries right before handing the panel its change events, so the
//! cache behaves like a host cache that settles shortly after each write.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use dashmap::DashMap;
use jwalk::WalkDir;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::store::{CachedTags, FrontmatterTags, NoteMeta, NoteStore, StoreError};
use crate::tags;

/// Vault-local config file name.
pub const CONFIG_FILE: &str = ".tagsight.json";

pub struct FsVault {
    root: PathBuf,
    cache: DashMap<String, CachedTags>,
}

impl FsVault {
    /// Opens a vault and primes the tag cache from every markdown note.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let vault = Self { root: root.into(), cache: DashMap::new() };
        vault.prime_cache();
        vault
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Vault-relative path with forward slashes, `None` for paths outside
    /// the vault root.
    pub fn rel_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    pub fn abs_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Re-extracts one note's cache entry after a write; a vanished file
    /// drops the entry instead.
    pub fn refresh_cache(&self, path: &str) {
        match fs::read_to_string(self.abs_path(path)) {
            Ok(content) => {
                self.cache.insert(path.to_string(), cache_from_content(&content));
            }
            Err(_) => {
                self.cache.remove(path);
            }
        }
    }

    pub fn evict(&self, path: &str) {
        self.cache.remove(path);
    }

    /// Moves a cache entry across a rename without re-reading the file.
    pub fn remap(&self, old: &str, new: &str) {
        if let Some((_, entry)) = self.cache.remove(old) {
            self.cache.insert(new.to_string(), entry);
        }
    }

    fn prime_cache(&self) {
        let start = Instant::now();
        let notes = self.walk_notes();
        let total = notes.len();
        let extract = || {
            notes.par_iter().for_each(|(rel, abs)| match fs::read_to_string(abs) {
                Ok(content) => {
                    self.cache.insert(rel.clone(), cache_from_content(&content));
                }
                Err(err) => warn!(path = %rel, %err, "unreadable note skipped"),
            });
        };
        match ThreadPoolBuilder::new().num_threads(scan_parallelism()).build() {
            Ok(pool) => pool.install(extract),
            Err(_) => extract(),
        }
        info!(
            notes = total,
            cached = self.cache.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "vault scan complete"
        );
    }

    fn walk_notes(&self) -> Vec<(String, PathBuf)> {
        let mut out = Vec::new();
        let walker = WalkDir::new(&self.root)
            .skip_hidden(true)
            .parallelism(jwalk::Parallelism::RayonNewPool(scan_parallelism()));
        for entry in walker.into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !is_markdown(&path) {
                continue;
            }
            if let Some(rel) = self.rel_path(&path) {
                out.push((rel, path));
            }
        }
        out
    }
}

impl NoteStore for FsVault {
    fn list_notes(&self) -> Vec<NoteMeta> {
        self.walk_notes()
            .into_iter()
            .map(|(rel, abs)| NoteMeta { path: rel, mtime: file_mtime(&abs) })
            .collect()
    }

    fn cached_tags(&self, path: &str) -> Option<CachedTags> {
        self.cache.get(path).map(|entry| entry.value().clone())
    }

    fn read_note(&self, path: &str) -> Result<String, StoreError> {
        match fs::read_to_string(self.abs_path(path)) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn mtime(&self, path: &str) -> Option<i64> {
        let meta = fs::metadata(self.abs_path(path)).ok()?;
        let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
        Some(modified.as_millis() as i64)
    }

    fn exists(&self, path: &str) -> bool {
        self.abs_path(path).is_file()
    }
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn cache_from_content(content: &str) -> CachedTags {
    let fm = tags::frontmatter_tags(content);
    CachedTags {
        inline: tags::inline_tags(content),
        frontmatter: if fm.is_empty() { None } else { Some(FrontmatterTags::List(fm)) },
    }
}

fn file_mtime(path: &Path) -> i64 {
    fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn scan_parallelism() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    (cores * 2).clamp(4, 64)
}
