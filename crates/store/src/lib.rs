//! A snapshot-isolated, path-keyed file store.
//!
//! [`FileStore`] maintains two views of the same data: a mutable map
//! protected by a reader-writer lock, and an atomically-swapped
//! `Arc` pointer to an immutable clone of that map. Writers update both
//! under the write lock; readers either take the read lock (for
//! [`FileStore::get`]) or follow the atomic pointer with no lock at all
//! (for [`FileStore::snapshot`] / [`FileStore::iter`]).
//!
//! The invariant this buys: the atomic snapshot is never observed to
//! contradict any writer that has already returned, and a snapshot taken
//! at any instant yields a consistent point-in-time view even while
//! concurrent writers keep mutating the store.

mod snapshot;

pub use snapshot::FileSnapshot;

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use spxls_core::{Error, File, Result};

type FileMap = FxHashMap<String, File>;

/// The set of paths touched by a single mutation, for callers that need
/// to propagate cache invalidation (the file store itself knows nothing
/// about caches; see `spxls_analysis::Project` for the glue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// A single path was inserted, overwritten, or removed.
    Path(String),
    /// `old` was removed and `new` now holds its contents.
    Renamed { old: String, new: String },
    /// An arbitrary set of paths was removed or overwritten by a bulk
    /// update; project-level caches must be invalidated wholesale.
    Bulk(Vec<String>),
}

/// A reader-writer-lock-guarded file map with a lock-free atomic
/// snapshot for readers that don't need a consistent multi-path view at
/// a single point in time... and, via [`FileStore::snapshot`], for
/// readers that do.
#[derive(Debug)]
pub struct FileStore {
    inner: RwLock<FileMap>,
    published: ArcSwap<FileMap>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// An empty file store.
    pub fn new() -> Self {
        FileStore {
            inner: RwLock::new(FxHashMap::default()),
            published: ArcSwap::from_pointee(FxHashMap::default()),
        }
    }

    /// Seed a file store from an initial path→file map.
    pub fn from_map(initial: impl IntoIterator<Item = (String, File)>) -> Self {
        let map: FileMap = initial.into_iter().collect();
        FileStore {
            inner: RwLock::new(map.clone()),
            published: ArcSwap::from_pointee(map),
        }
    }

    /// Unconditionally insert or overwrite `path`.
    pub fn put(&self, path: impl Into<String>, file: File) -> Invalidation {
        let path = path.into();
        let mut guard = self.inner.write();
        guard.insert(path.clone(), file);
        self.republish(&guard);
        tracing::debug!(path = %path, "file store: put");
        Invalidation::Path(path)
    }

    /// Remove `path`. Fails with [`Error::NotFound`] if absent.
    pub fn delete(&self, path: &str) -> Result<Invalidation> {
        let mut guard = self.inner.write();
        if guard.remove(path).is_none() {
            return Err(Error::not_found(path));
        }
        self.republish(&guard);
        tracing::debug!(path, "file store: delete");
        Ok(Invalidation::Path(path.to_string()))
    }

    /// Atomically move `old` to `new`. Fails with [`Error::NotFound`] if
    /// `old` is absent, or [`Error::AlreadyExists`] if `new` is present.
    pub fn rename(&self, old: &str, new: &str) -> Result<Invalidation> {
        let mut guard = self.inner.write();
        if !guard.contains_key(old) {
            return Err(Error::not_found(old));
        }
        if guard.contains_key(new) {
            return Err(Error::already_exists(new));
        }
        let file = guard.remove(old).expect("checked above");
        guard.insert(new.to_string(), file);
        self.republish(&guard);
        tracing::debug!(old, new, "file store: rename");
        Ok(Invalidation::Renamed {
            old: old.to_string(),
            new: new.to_string(),
        })
    }

    /// Reconcile the store against `new_map` in one batch:
    ///
    /// 1. Every current path absent from `new_map` is removed.
    /// 2. Every path in `new_map` absent from the store is installed.
    /// 3. Every path present in both is installed iff its legacy
    ///    timestamp differs from the one already stored — this is the
    ///    legacy edit-reconciliation behavior callers that haven't
    ///    migrated to monotonic versions still rely on.
    ///
    /// The atomic snapshot is republished once, after the whole batch.
    pub fn update_bulk(&self, new_map: impl IntoIterator<Item = (String, File)>) -> Invalidation {
        let new_map: FileMap = new_map.into_iter().collect();
        let mut guard = self.inner.write();

        let mut touched = Vec::new();

        let removed: Vec<String> = guard
            .keys()
            .filter(|path| !new_map.contains_key(*path))
            .cloned()
            .collect();
        for path in &removed {
            guard.remove(path);
        }
        touched.extend(removed);

        for (path, file) in new_map {
            let install = match guard.get(&path) {
                None => true,
                Some(existing) => existing.timestamp() != file.timestamp(),
            };
            if install {
                guard.insert(path.clone(), file);
                touched.push(path);
            }
        }

        self.republish(&guard);
        tracing::debug!(touched = touched.len(), "file store: bulk update");
        Invalidation::Bulk(touched)
    }

    /// Lock-free-for-readers lookup. Takes the read lock (cheap,
    /// uncontended with other readers) rather than the atomic pointer,
    /// since a single-path lookup has no need for snapshot consistency
    /// across multiple reads.
    pub fn get(&self, path: &str) -> Option<File> {
        self.inner.read().get(path).cloned()
    }

    /// An immutable, independently-evolving view of the store as of this
    /// call. See [`FileSnapshot`].
    pub fn snapshot(&self) -> FileSnapshot {
        FileSnapshot::new(self.published.load_full())
    }

    /// Shorthand for `self.snapshot().iter()`.
    pub fn iter(&self) -> impl Iterator<Item = (String, File)> {
        self.snapshot().into_iter()
    }

    fn republish(&self, guard: &FileMap) {
        self.published.store(Arc::new(guard.clone()));
    }
}
