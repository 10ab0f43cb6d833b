//! The file store's unit of storage.

use std::sync::Arc;

/// A single file as tracked by a project's file store.
///
/// Only [`File::bytes`] and [`File::version`] are load-bearing for cache
/// invalidation; [`File::timestamp`] is retained solely for the legacy
/// edit-reconciliation behavior of bulk updates (see the file store's
/// `update_bulk` contract), which compares timestamps rather than bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    bytes: Arc<[u8]>,
    timestamp: i64,
    version: u64,
}

impl File {
    /// Construct a file from raw bytes, a legacy timestamp, and a
    /// monotonic version counter.
    pub fn new(bytes: impl Into<Arc<[u8]>>, timestamp: i64, version: u64) -> Self {
        File {
            bytes: bytes.into(),
            timestamp,
            version,
        }
    }

    /// Construct a file from a UTF-8 string, stamped with `timestamp` and
    /// `version`. Convenience for tests and callers building files from
    /// source text.
    pub fn from_text(text: impl Into<String>, timestamp: i64, version: u64) -> Self {
        File::new(text.into().into_bytes(), timestamp, version)
    }

    /// The file's raw contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The file's contents as a shared byte slice, cheaply cloneable.
    pub fn bytes_arc(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// The file's contents interpreted as UTF-8, lossily if necessary.
    /// Parsers that require strict UTF-8 should use [`File::bytes`]
    /// directly and handle decode errors themselves.
    pub fn text_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// The legacy edit-reconciliation timestamp.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The monotonic version counter.
    pub fn version(&self) -> u64 {
        self.version
    }
}
