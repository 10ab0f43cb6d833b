//! An immutable, independently-evolving view of a [`FileStore`](crate::FileStore).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use spxls_core::File;

/// A point-in-time, immutable view of a file store's contents.
///
/// Cloning a `FileSnapshot` is cheap (an `Arc` clone); the underlying map
/// is never mutated in place — a store mutation publishes a brand new
/// map and swaps the pointer, so any `FileSnapshot` already handed out
/// keeps observing exactly what it saw when it was taken.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    files: Arc<FxHashMap<String, File>>,
}

impl FileSnapshot {
    pub(crate) fn new(files: Arc<FxHashMap<String, File>>) -> Self {
        FileSnapshot { files }
    }

    /// Look up a single path in this snapshot.
    pub fn get(&self, path: &str) -> Option<File> {
        self.files.get(path).cloned()
    }

    /// Whether `path` is present in this snapshot.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files in this snapshot.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether this snapshot has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate `(path, file)` pairs. Order is unspecified. Finite,
    /// restartable, and unaffected by mutations on the store that
    /// produced this snapshot after it was taken.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &File)> {
        self.files.iter().map(|(p, f)| (p.as_str(), f))
    }
}

impl IntoIterator for FileSnapshot {
    type Item = (String, File);
    type IntoIter = std::vec::IntoIter<(String, File)>;

    fn into_iter(self) -> Self::IntoIter {
        self.files
            .iter()
            .map(|(p, f)| (p.clone(), f.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }
}
