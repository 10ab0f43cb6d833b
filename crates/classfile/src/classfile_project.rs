//! Per-project provider-snapshot caching: a thin wrapper pairing an
//! [`spxls_analysis::Project`] with its own [`CacheFabric`] keyed by
//! provider id, so building two providers' snapshots never blocks on
//! each other and re-requesting the same provider id is a cache hit.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use spxls_analysis::Project;
use spxls_cache::CacheFabric;
use spxls_core::{Error, KindKey, Result};

use crate::provider::{BuildContext, Provider, ProviderRegistry, Snapshot};

/// Wraps a [`Project`] with a cache fabric over classfile provider
/// snapshots. Snapshot builders are registered lazily, the first time
/// a given provider id is requested, since the set of providers the
/// embedder has registered process-wide is not known up front.
pub struct ClassfileProject {
    project: Project,
    cache: CacheFabric<ClassfileProject>,
    analyzers: Vec<String>,
    registered: RwLock<HashSet<String>>,
}

impl ClassfileProject {
    pub fn new(project: Project, analyzers: impl IntoIterator<Item = String>) -> Self {
        ClassfileProject {
            project,
            cache: CacheFabric::new(),
            analyzers: analyzers.into_iter().collect(),
            registered: RwLock::new(HashSet::new()),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn analyzers(&self) -> &[String] {
        &self.analyzers
    }

    /// This project's snapshot for the provider registered under
    /// `provider_id`. The first call for a given id registers a
    /// project-scope builder that looks the provider up by id and
    /// invokes [`Provider::build`]; later calls for the same id are
    /// served from the fabric, invalidated the same way every other
    /// project-scope cache entry is.
    pub fn snapshot_for(&self, provider_id: &str) -> Result<Arc<Snapshot>> {
        self.ensure_registered(provider_id);
        let key = KindKey::new(ProviderSnapshotKind(provider_id.to_string()));
        self.cache.get_project(&key, self)
    }

    /// This project's snapshot for the first registered provider
    /// (in registration order) that [`Provider::supports`] `path`.
    pub fn snapshot_for_path(&self, path: &str) -> Result<Arc<Snapshot>> {
        let provider = ProviderRegistry::by_path(path)
            .ok_or_else(|| Error::builder(format!("no provider supports path: {path}")))?;
        self.snapshot_for(provider.id())
    }

    fn ensure_registered(&self, provider_id: &str) {
        if self.registered.read().contains(provider_id) {
            return;
        }
        let mut registered = self.registered.write();
        if !registered.insert(provider_id.to_string()) {
            return;
        }
        let id = provider_id.to_string();
        let key = KindKey::new(ProviderSnapshotKind(id.clone()));
        self.cache.register_project_builder(key, move |cp: &ClassfileProject| {
            build_provider_snapshot(cp, &id)
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProviderSnapshotKind(String);

fn build_provider_snapshot(cp: &ClassfileProject, provider_id: &str) -> Result<Arc<Snapshot>> {
    let provider = ProviderRegistry::by_id(provider_id)
        .ok_or_else(|| Error::unknown_kind(provider_id))?;
    let ctx = BuildContext {
        project: &cp.project,
        analyzers: &cp.analyzers,
    };
    tracing::debug!(provider_id, "building classfile provider snapshot");
    let snapshot = provider.build(&ctx)?;
    Ok(Arc::new(snapshot))
}
