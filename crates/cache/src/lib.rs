//! The kinded, single-flight cache fabric.
//!
//! `CacheFabric<Ctx>` holds two independent kinded caches — project-scope
//! and file-scope — plus a builder registry and a single-flight
//! coordinator for each scope. `Ctx` is whatever context type a builder
//! needs to do its work (in practice, the embedder's `Project` handle);
//! the fabric itself never constructs or inspects a `Ctx`, it only holds
//! onto builder closures that accept one.
//!
//! Builders register under a [`KindKey`] and return an `Arc<T>` for
//! whatever concrete type `T` that kind represents; the fabric stores
//! the result type-erased (`Arc<dyn Any + Send + Sync>`) and downcasts
//! on read. Concurrent duplicate builds for the same `(scope, key)` are
//! coalesced onto a single in-flight invocation; the result (success or
//! error) is cached with identical lifetime, invalidation applies
//! equally to both.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use spxls_core::{Error, File, KindKey, Result};

type AnyArc = Arc<dyn Any + Send + Sync>;
type Outcome = std::result::Result<AnyArc, Error>;

type ProjectBuilderFn<Ctx> = dyn Fn(&Ctx) -> Result<AnyArc> + Send + Sync;
type FileBuilderFn<Ctx> = dyn Fn(&Ctx, &str, &File) -> Result<AnyArc> + Send + Sync;

/// A kinded, single-flight cache fabric parameterized over the context
/// type its builders receive.
pub struct CacheFabric<Ctx> {
    project_builders: DashMap<KindKey, Arc<ProjectBuilderFn<Ctx>>>,
    file_builders: DashMap<KindKey, Arc<FileBuilderFn<Ctx>>>,
    project_entries: DashMap<KindKey, Outcome>,
    file_entries: DashMap<(KindKey, String), Outcome>,
    flight: DashMap<String, Arc<Mutex<()>>>,
}

impl<Ctx> Default for CacheFabric<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> CacheFabric<Ctx> {
    /// An empty fabric with no registered builders or cached entries.
    pub fn new() -> Self {
        CacheFabric {
            project_builders: DashMap::new(),
            file_builders: DashMap::new(),
            project_entries: DashMap::new(),
            file_entries: DashMap::new(),
            flight: DashMap::new(),
        }
    }

    /// Register (or overwrite) the builder for a project-scope kind.
    /// Registration is idempotent-overwrite: the last registration wins.
    pub fn register_project_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Ctx) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let boxed: Arc<ProjectBuilderFn<Ctx>> =
            Arc::new(move |ctx: &Ctx| builder(ctx).map(|arc| arc as AnyArc));
        self.project_builders.insert(kind, boxed);
    }

    /// Register (or overwrite) the builder for a file-scope kind.
    pub fn register_file_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Ctx, &str, &File) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        let boxed: Arc<FileBuilderFn<Ctx>> =
            Arc::new(move |ctx: &Ctx, path: &str, file: &File| {
                builder(ctx, path, file).map(|arc| arc as AnyArc)
            });
        self.file_builders.insert(kind, boxed);
    }

    /// Fetch (building if necessary) the project-scope cache entry for
    /// `kind`.
    ///
    /// Fast path: an existing entry (success or error) is decoded and
    /// returned under a read-only map access, no single-flight lock
    /// taken. Otherwise this enters the single-flight critical section
    /// keyed on `kind`'s flight key; the first caller to arrive runs the
    /// builder, every other concurrent caller for the same kind blocks
    /// on the same lock and observes the same result.
    pub fn get_project<T: Any + Send + Sync>(&self, kind: &KindKey, ctx: &Ctx) -> Result<Arc<T>> {
        if let Some(entry) = self.project_entries.get(kind) {
            return decode(entry.value().clone());
        }

        let flight_key = kind.flight_key();
        let lock = self.flight_lock(flight_key);
        let _guard = lock.lock();

        if let Some(entry) = self.project_entries.get(kind) {
            return decode(entry.value().clone());
        }

        let Some(builder) = self.project_builders.get(kind).map(|b| Arc::clone(&b)) else {
            return Err(Error::unknown_kind(kind));
        };

        tracing::debug!(kind = kind.type_name(), "cache fabric: building project entry");
        let outcome = builder(ctx);
        self.project_entries
            .insert(kind.clone(), outcome_as_stored(&outcome));
        outcome.and_then(decode_arc)
    }

    /// Fetch (building if necessary) the file-scope cache entry for
    /// `(kind, path)`. `lookup` is used to obtain the current file
    /// contents if a build is required; if it returns `None` this
    /// returns [`Error::NotFound`] without caching anything (a future
    /// call after the file exists will attempt the build again).
    pub fn get_file<T: Any + Send + Sync>(
        &self,
        kind: &KindKey,
        path: &str,
        ctx: &Ctx,
        lookup: impl FnOnce() -> Option<File>,
    ) -> Result<Arc<T>> {
        let entry_key = (kind.clone(), path.to_string());
        if let Some(entry) = self.file_entries.get(&entry_key) {
            return decode(entry.value().clone());
        }

        let flight_key = kind.flight_key_for_path(path);
        let lock = self.flight_lock(flight_key);
        let _guard = lock.lock();

        if let Some(entry) = self.file_entries.get(&entry_key) {
            return decode(entry.value().clone());
        }

        let Some(builder) = self.file_builders.get(kind).map(|b| Arc::clone(&b)) else {
            return Err(Error::unknown_kind(kind));
        };

        let Some(file) = lookup() else {
            return Err(Error::not_found(path));
        };

        tracing::debug!(kind = kind.type_name(), path, "cache fabric: building file entry");
        let outcome = builder(ctx, path, &file);
        self.file_entries
            .insert(entry_key, outcome_as_stored(&outcome));
        outcome.and_then(decode_arc)
    }

    /// Clear every project-scope cache entry. Does not touch
    /// registered builders.
    pub fn invalidate_project(&self) {
        self.project_entries.clear();
    }

    /// Remove the file-scope cache entry for `path` across every
    /// registered file kind, and clear every project-scope entry
    /// (conservative: project-level results can transitively depend on
    /// any file).
    pub fn invalidate_path(&self, path: &str) {
        self.file_entries.retain(|(_, p), _| p != path);
        self.invalidate_project();
    }

    /// Same as [`CacheFabric::invalidate_path`] but for a batch of
    /// paths, used by the file store's bulk-update invalidation.
    pub fn invalidate_paths(&self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        self.file_entries
            .retain(|(_, p), _| !paths.iter().any(|touched| touched == p));
        self.invalidate_project();
    }

    fn flight_lock(&self, key: String) -> Arc<Mutex<()>> {
        Arc::clone(
            self.flight
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}

fn outcome_as_stored(outcome: &Result<AnyArc>) -> Outcome {
    match outcome {
        Ok(value) => Ok(Arc::clone(value)),
        Err(err) => Err(err.clone()),
    }
}

fn decode<T: Any + Send + Sync>(outcome: Outcome) -> Result<Arc<T>> {
    outcome.and_then(decode_arc)
}

fn decode_arc<T: Any + Send + Sync>(value: AnyArc) -> Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| Error::builder("cache entry type mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Barrier;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Kind {
        Counter,
        Text,
    }

    #[test]
    fn unknown_kind_is_reported() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let kind = KindKey::new(Kind::Counter);
        let err = fabric.get_project::<u32>(&kind, &()).unwrap_err();
        assert!(matches!(err, Error::UnknownKind { .. }));
    }

    #[test]
    fn project_builder_runs_once_per_invalidation() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let kind = KindKey::new(Kind::Counter);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        fabric.register_project_builder::<u32, _>(kind.clone(), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(42))
        });

        let a = fabric.get_project::<u32>(&kind, &()).unwrap();
        let b = fabric.get_project::<u32>(&kind, &()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        fabric.invalidate_project();
        let c = fabric.get_project::<u32>(&kind, &()).unwrap();
        assert_eq!(*c, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn single_flight_coalesces_concurrent_builders() {
        let fabric: Arc<CacheFabric<()>> = Arc::new(CacheFabric::new());
        let kind = KindKey::new(Kind::Counter);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);
        fabric.register_project_builder::<u32, _>(kind.clone(), move |_| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            let value = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(value))
        });

        const N: usize = 10;
        let barrier = Arc::new(Barrier::new(N));
        let handles: Vec<_> = (0..N)
            .map(|_| {
                let fabric = Arc::clone(&fabric);
                let kind = kind.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    fabric.get_project::<u32>(&kind, &()).unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        for r in &results {
            assert_eq!(**r, 1);
        }
    }

    #[test]
    fn file_builder_not_found_when_missing() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let kind = KindKey::new(Kind::Text);
        fabric.register_file_builder::<String, _>(kind.clone(), |_, _, file| {
            Ok(Arc::new(file.text_lossy().into_owned()))
        });

        let err = fabric
            .get_file::<String>(&kind, "missing.spx", &(), || None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn file_builder_builds_and_caches() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let kind = KindKey::new(Kind::Text);
        fabric.register_file_builder::<String, _>(kind.clone(), |_, _, file| {
            Ok(Arc::new(file.text_lossy().into_owned()))
        });

        let file = File::from_text("echo 100", 0, 0);
        let a = fabric
            .get_file::<String>(&kind, "main.spx", &(), || Some(file.clone()))
            .unwrap();
        assert_eq!(*a, "echo 100");

        let b = fabric
            .get_file::<String>(&kind, "main.spx", &(), || panic!("should not rebuild"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn invalidate_path_clears_file_and_project_entries() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let file_kind = KindKey::new(Kind::Text);
        let project_kind = KindKey::new(Kind::Counter);
        fabric.register_file_builder::<String, _>(file_kind.clone(), |_, _, file| {
            Ok(Arc::new(file.text_lossy().into_owned()))
        });
        fabric.register_project_builder::<u32, _>(project_kind.clone(), |_| Ok(Arc::new(1)));

        let file = File::from_text("a", 0, 0);
        fabric
            .get_file::<String>(&file_kind, "a.spx", &(), || Some(file.clone()))
            .unwrap();
        fabric.get_project::<u32>(&project_kind, &()).unwrap();

        fabric.invalidate_path("a.spx");

        assert!(fabric.file_entries.is_empty());
        assert!(fabric.project_entries.is_empty());
    }

    #[test]
    fn errors_cache_with_same_lifetime_as_successes() {
        let fabric: CacheFabric<()> = CacheFabric::new();
        let kind = KindKey::new(Kind::Counter);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        fabric.register_project_builder::<u32, _>(kind.clone(), move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Err(Error::builder("boom"))
        });

        let first = fabric.get_project::<u32>(&kind, &()).unwrap_err();
        let second = fabric.get_project::<u32>(&kind, &()).unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
