//! The public `SpxProject` facade: an [`spxls_analysis::Project`]
//! paired with classfile provider-snapshot caching and the asset
//! resource index, all behind one type.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use spxls_analysis::ports::Ports;
use spxls_analysis::{OpaqueHandle, Project, ProjectOptions};
use spxls_classfile::{
    build_resource_index, walk, ClassfileProject, Provider, ProviderRegistry, ResourceSet,
    Snapshot, WalkResult,
};
use spxls_core::{File, KindKey, Result};

/// An spx project: file store, single-flight analysis cache, classfile
/// provider snapshots, and the asset resource index, wired together.
///
/// `SpxProject` never parses, type-checks, imports, or extracts
/// documentation itself — construction takes the same [`Ports`] the
/// inner [`spxls_analysis::Project`] takes, supplied by the embedder.
pub struct SpxProject {
    classfile: ClassfileProject,
    resource_root: PathBuf,
    resources: RwLock<Option<Arc<ResourceSet>>>,
}

impl SpxProject {
    /// Construct a project with no fileset/module handle and no
    /// registered analyzer descriptors. See [`SpxProject::with_handles`]
    /// for the fully general constructor.
    pub fn new(
        package_path: impl Into<String>,
        ports: Ports,
        options: ProjectOptions,
        initial_files: impl IntoIterator<Item = (String, File)>,
    ) -> Self {
        Self::with_handles(package_path, ports, options, initial_files, None, None, [])
    }

    /// Construct a project, optionally carrying an opaque fileset
    /// and/or module handle shared across every snapshot, plus the
    /// list of analyzer descriptors forwarded verbatim to classfile
    /// providers via [`BuildContext::analyzers`].
    pub fn with_handles(
        package_path: impl Into<String>,
        ports: Ports,
        options: ProjectOptions,
        initial_files: impl IntoIterator<Item = (String, File)>,
        fileset: Option<OpaqueHandle>,
        module: Option<OpaqueHandle>,
        analyzers: impl IntoIterator<Item = String>,
    ) -> Self {
        let resource_root = PathBuf::from(options.resource_root.clone());
        let project =
            Project::with_handles(package_path, ports, options, initial_files, fileset, module);
        SpxProject {
            classfile: ClassfileProject::new(project, analyzers),
            resource_root,
            resources: RwLock::new(None),
        }
    }

    fn from_parts(classfile: ClassfileProject, resource_root: PathBuf) -> Self {
        SpxProject {
            classfile,
            resource_root,
            resources: RwLock::new(None),
        }
    }

    /// The underlying analysis project (AST/type-info/documentation
    /// pipeline, file store, generic cache fabric).
    pub fn inner(&self) -> &Project {
        self.classfile.project()
    }

    /// The analyzer descriptors this project was constructed with.
    pub fn analyzers(&self) -> &[String] {
        self.classfile.analyzers()
    }

    // -- file store passthrough, wired to cache invalidation ---------

    pub fn put(&self, path: impl Into<String>, file: File) {
        self.inner().put(path, file);
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.inner().delete(path)
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.inner().rename(old, new)
    }

    pub fn update_bulk(&self, new_map: impl IntoIterator<Item = (String, File)>) {
        self.inner().update_bulk(new_map);
    }

    pub fn get(&self, path: &str) -> Option<File> {
        self.inner().get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, File)> {
        self.inner().iter()
    }

    // -- generic cache fabric passthrough -----------------------------

    pub fn register_project_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&Project) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.inner().register_project_builder(kind, builder);
    }

    pub fn register_file_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&Project, &str, &File) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.inner().register_file_builder(kind, builder);
    }

    /// This project's cached value for a custom project-scope kind
    /// registered via [`SpxProject::register_project_builder`].
    pub fn get_project_cached<T: std::any::Any + Send + Sync>(
        &self,
        kind: &KindKey,
    ) -> Result<Arc<T>> {
        self.inner().get_project_cached(kind)
    }

    /// This project's cached value for a custom file-scope kind
    /// registered via [`SpxProject::register_file_builder`].
    pub fn get_file_cached<T: std::any::Any + Send + Sync>(
        &self,
        kind: &KindKey,
        path: &str,
    ) -> Result<Arc<T>> {
        self.inner().get_file_cached(kind, path)
    }

    // -- built-in analysis pipeline ------------------------------------

    pub fn get_ast(&self, path: &str) -> Result<Arc<spxls_analysis::FileAstResult>> {
        self.inner().get_ast(path)
    }

    pub fn get_ast_package(&self) -> Result<Arc<spxls_analysis::AstPackageResult>> {
        self.inner().get_ast_package()
    }

    pub fn get_type_info(&self) -> Result<Arc<spxls_analysis::TypeInfoResult>> {
        self.inner().get_type_info()
    }

    pub fn get_package_doc(&self) -> Result<Arc<String>> {
        self.inner().get_package_doc()
    }

    // -- snapshots ------------------------------------------------------

    /// A shallow, independently-evolving clone of this project: a fresh
    /// inner `Project` snapshot wrapped in a fresh
    /// `ClassfileProject`, with resource-index state re-derived lazily
    /// on first use rather than carried over.
    pub fn snapshot(&self) -> SpxProject {
        let inner = self.inner().snapshot();
        let classfile = ClassfileProject::new(inner, self.analyzers().to_vec());
        SpxProject::from_parts(classfile, self.resource_root.clone())
    }

    /// Equivalent to [`SpxProject::snapshot`] followed by a bulk `put`
    /// of `overlay` over the resulting snapshot.
    pub fn overlay_snapshot(&self, overlay: impl IntoIterator<Item = (String, File)>) -> SpxProject {
        let snapshot = self.snapshot();
        for (path, file) in overlay {
            snapshot.put(path, file);
        }
        snapshot
    }

    // -- classfile provider registry passthrough ------------------------

    /// Register `provider` process-wide. See
    /// [`ProviderRegistry::register`].
    pub fn register_provider(provider: Arc<dyn Provider>) {
        ProviderRegistry::register(provider);
    }

    /// Look up a registered provider by its exact id.
    pub fn provider_by_id(id: &str) -> Option<Arc<dyn Provider>> {
        ProviderRegistry::by_id(id)
    }

    /// The first registered provider (in registration order) that
    /// supports `path`.
    pub fn provider_by_path(path: &str) -> Option<Arc<dyn Provider>> {
        ProviderRegistry::by_path(path)
    }

    /// Every registered provider id, in registration order.
    pub fn provider_ids() -> Vec<String> {
        ProviderRegistry::ids()
    }

    // -- per-project provider snapshots ---------------------------------

    /// This project's snapshot for the provider registered under
    /// `provider_id`.
    pub fn snapshot_for(&self, provider_id: &str) -> Result<Arc<Snapshot>> {
        self.classfile.snapshot_for(provider_id)
    }

    /// This project's snapshot for the first registered provider that
    /// supports `path`.
    pub fn snapshot_for_path(&self, path: &str) -> Result<Arc<Snapshot>> {
        self.classfile.snapshot_for_path(path)
    }

    // -- asset resource index --------------------------------------------

    /// This project's parsed asset tree, building and caching it on
    /// first use from `<resource_root>` (relative to `base_dir`).
    /// Subsequent calls return the cached value until
    /// [`SpxProject::refresh_resources`] is called.
    pub fn resources(&self, base_dir: &Path) -> Result<Arc<ResourceSet>> {
        if let Some(set) = self.resources.read().clone() {
            return Ok(set);
        }
        self.refresh_resources(base_dir)
    }

    /// Rebuild the asset resource index from disk, replacing any
    /// previously cached one.
    pub fn refresh_resources(&self, base_dir: &Path) -> Result<Arc<ResourceSet>> {
        let set = Arc::new(build_resource_index(&base_dir.join(&self.resource_root))?);
        *self.resources.write() = Some(Arc::clone(&set));
        Ok(set)
    }

    // -- reference walker ------------------------------------------------

    /// Walk this project's source for resource references, cross
    /// checking them against `resources` (or the most recently built
    /// resource index, if any) and translating diagnostic messages
    /// through `translate`.
    pub fn walk_references(
        &self,
        resources: Option<&ResourceSet>,
        translate: impl Fn(&str) -> String,
    ) -> Result<WalkResult> {
        let cached = self.resources.read().clone();
        let resources = resources.or(cached.as_deref());
        walk(self.inner(), resources, translate)
    }
}
