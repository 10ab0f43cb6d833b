//! The `Project` aggregate: file store + cache fabric + ports, wired
//! together with the four built-in analysis builders.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use spxls_cache::CacheFabric;
use spxls_core::{Error, File, KindKey, Result};
use spxls_store::{FileStore, Invalidation};

use crate::model::{Ast, Diagnostic, Package, PackageScope, TypeInfo};
use crate::ports::{ParseMode, Ports, TypeCheckRequest};

/// Enable the per-file AST builder.
pub const FEATURE_AST: u32 = 1 << 0;
/// Enable the project-scope type-info builder (implies [`FEATURE_AST`]
/// at read time: it builds on the AST-package builder, which itself
/// builds on the AST builder).
pub const FEATURE_TYPE_INFO: u32 = 1 << 1;
/// Enable the project-scope package-documentation builder.
pub const FEATURE_PACKAGE_DOC: u32 = 1 << 2;
/// All recognized feature bits. Unknown bits beyond this mask are
/// ignored by [`Project::new`].
pub const FEATURE_ALL: u32 = FEATURE_AST | FEATURE_TYPE_INFO | FEATURE_PACKAGE_DOC;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BuiltinKind {
    FileAst,
    AstPackage,
    TypeInfo,
    PackageDoc,
}

/// Construction-time options for a [`Project`].
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Feature bitmask; see [`FEATURE_AST`] and friends.
    pub features: u32,
    /// File extensions (including the leading dot) parsed in
    /// [`ParseMode::Standard`].
    pub core_extensions: Vec<String>,
    /// File extensions parsed in [`ParseMode::Classfile`].
    pub classfile_extensions: Vec<String>,
    /// Root directory name the resource index is built from. Not
    /// consulted by this crate directly; threaded through for
    /// `spxls-classfile`.
    pub resource_root: String,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        ProjectOptions {
            features: FEATURE_ALL,
            core_extensions: vec![".xgo".into(), ".gop".into()],
            classfile_extensions: vec![".spx".into(), ".gox".into()],
            resource_root: "assets".into(),
        }
    }
}

impl ProjectOptions {
    fn parse_mode_for(&self, path: &str) -> Option<ParseMode> {
        if self.classfile_extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            Some(ParseMode::Classfile)
        } else if self.core_extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            Some(ParseMode::Standard)
        } else {
            None
        }
    }

    fn is_recognized_source(&self, path: &str) -> bool {
        self.parse_mode_for(path).is_some()
    }
}

/// Output of the per-file AST builder.
#[derive(Debug, Clone)]
pub struct FileAstResult {
    pub tree: Option<Arc<Ast>>,
    pub parse_error: Option<Error>,
}

/// Output of the project-scope AST-package builder.
#[derive(Debug, Clone, Default)]
pub struct AstPackageResult {
    pub package_name: Option<String>,
    pub files: HashMap<String, Arc<Ast>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Output of the project-scope type-info builder.
#[derive(Debug, Clone)]
pub struct TypeInfoResult {
    pub info: Arc<TypeInfo>,
    pub package: Arc<Package>,
    /// Aggregated type-checker error messages (callback-reported plus,
    /// when no callback errors were recorded, the checker's own fatal
    /// error). Non-fatal to this builder: callers that need the
    /// strict "did this fail" signal should use
    /// [`TypeInfoResult::as_error`].
    pub errors: Vec<String>,
}

impl TypeInfoResult {
    /// `Some(Error::TypeCheckError)` when [`TypeInfoResult::errors`] is
    /// non-empty, for callers (notably the classfile provider snapshot
    /// builder) that surface type errors as provider diagnostics.
    pub fn as_error(&self) -> Option<Error> {
        if self.errors.is_empty() {
            None
        } else {
            Some(Error::TypeCheckError {
                messages: self.errors.clone(),
            })
        }
    }
}

/// An opaque, shared, read-only collaborator threaded through a project
/// and every snapshot taken of it (a "shared position/fileset handle"
/// or "module handle"). spxls never interprets its contents, it only
/// holds the `Arc` and hands the same one back to every snapshot,
/// exactly as it does for [`Ports`]'s importer.
pub type OpaqueHandle = Arc<dyn Any + Send + Sync>;

/// The aggregate gluing a project's file store, cache fabric, and
/// external ports together, plus the built-in analysis pipeline
/// registered over them.
pub struct Project {
    package_path: String,
    store: FileStore,
    cache: CacheFabric<Project>,
    ports: Arc<Ports>,
    options: ProjectOptions,
    fileset: Option<OpaqueHandle>,
    module: Option<OpaqueHandle>,
}

impl Project {
    /// Construct a project with no fileset/module handle. `initial_files`
    /// seeds the file store; `options.features` determines which
    /// built-in builders are registered. Use [`Project::with_handles`]
    /// when the embedder has a position/fileset or module handle to
    /// share across snapshots.
    pub fn new(
        package_path: impl Into<String>,
        ports: Ports,
        options: ProjectOptions,
        initial_files: impl IntoIterator<Item = (String, File)>,
    ) -> Self {
        Self::with_handles(package_path, ports, options, initial_files, None, None)
    }

    /// Construct a project, optionally carrying an opaque fileset and/or
    /// module handle that every snapshot of this project will share
    /// (Arc-cloned, never duplicated).
    pub fn with_handles(
        package_path: impl Into<String>,
        ports: Ports,
        options: ProjectOptions,
        initial_files: impl IntoIterator<Item = (String, File)>,
        fileset: Option<OpaqueHandle>,
        module: Option<OpaqueHandle>,
    ) -> Self {
        let project = Project {
            package_path: package_path.into(),
            store: FileStore::from_map(initial_files),
            cache: CacheFabric::new(),
            ports: Arc::new(ports),
            options,
            fileset,
            module,
        };
        project.register_builtins();
        project
    }

    /// The shared, opaque position/fileset handle, if this project was
    /// constructed with one.
    pub fn fileset(&self) -> Option<&OpaqueHandle> {
        self.fileset.as_ref()
    }

    /// The shared, opaque module handle, if this project was
    /// constructed with one.
    pub fn module(&self) -> Option<&OpaqueHandle> {
        self.module.as_ref()
    }

    /// The project's package-path string.
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    /// Construction options this project was built with.
    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    /// The external ports this project was built with.
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    // -- file store passthrough, wired to cache invalidation --------

    pub fn put(&self, path: impl Into<String>, file: File) {
        let invalidation = self.store.put(path, file);
        self.apply_invalidation(invalidation);
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let invalidation = self.store.delete(path)?;
        self.apply_invalidation(invalidation);
        Ok(())
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let invalidation = self.store.rename(old, new)?;
        self.apply_invalidation(invalidation);
        Ok(())
    }

    pub fn update_bulk(&self, new_map: impl IntoIterator<Item = (String, File)>) {
        let invalidation = self.store.update_bulk(new_map);
        self.apply_invalidation(invalidation);
    }

    pub fn get(&self, path: &str) -> Option<File> {
        self.store.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (String, File)> {
        self.store.iter()
    }

    fn apply_invalidation(&self, invalidation: Invalidation) {
        match invalidation {
            Invalidation::Path(path) => self.cache.invalidate_path(&path),
            Invalidation::Renamed { old, .. } => self.cache.invalidate_path(&old),
            Invalidation::Bulk(paths) => self.cache.invalidate_paths(&paths),
        }
    }

    // -- snapshots ----------------------------------------------------

    /// A shallow clone sharing immutable collaborators (ports) but
    /// owning an independent copy of the file map and fresh, empty
    /// cache maps. Taking a snapshot never observes nor causes
    /// in-progress build state in `self`; the snapshot then evolves
    /// completely independently.
    pub fn snapshot(&self) -> Project {
        let snapshot = Project {
            package_path: self.package_path.clone(),
            store: FileStore::from_map(self.store.iter()),
            cache: CacheFabric::new(),
            ports: Arc::clone(&self.ports),
            options: self.options.clone(),
            fileset: self.fileset.clone(),
            module: self.module.clone(),
        };
        snapshot.register_builtins();
        snapshot
    }

    /// Equivalent to [`Project::snapshot`] followed by a bulk `put` of
    /// `overlay` over the resulting snapshot.
    pub fn overlay_snapshot(&self, overlay: impl IntoIterator<Item = (String, File)>) -> Project {
        let snapshot = self.snapshot();
        for (path, file) in overlay {
            snapshot.put(path, file);
        }
        snapshot
    }

    // -- built-in pipeline accessors -----------------------------------

    pub fn get_ast(&self, path: &str) -> Result<Arc<FileAstResult>> {
        self.cache
            .get_file(&kind(BuiltinKind::FileAst), path, self, || self.store.get(path))
    }

    pub fn get_ast_package(&self) -> Result<Arc<AstPackageResult>> {
        self.cache.get_project(&kind(BuiltinKind::AstPackage), self)
    }

    pub fn get_type_info(&self) -> Result<Arc<TypeInfoResult>> {
        self.cache.get_project(&kind(BuiltinKind::TypeInfo), self)
    }

    pub fn get_package_doc(&self) -> Result<Arc<String>> {
        self.cache.get_project(&kind(BuiltinKind::PackageDoc), self)
    }

    // -- generic cache fabric passthrough -------------------------------
    //
    // Beyond the four built-in kinds above, an embedder may register its
    // own project- or file-scope cached computations over this same
    // project (an spx-specific lint pass, say) and get the same
    // single-flight and invalidation guarantees the built-ins get.

    pub fn register_project_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&Project) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.cache.register_project_builder(kind, builder);
    }

    pub fn register_file_builder<T, F>(&self, kind: KindKey, builder: F)
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&Project, &str, &File) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.cache.register_file_builder(kind, builder);
    }

    pub fn get_project_cached<T: std::any::Any + Send + Sync>(
        &self,
        kind: &KindKey,
    ) -> Result<Arc<T>> {
        self.cache.get_project(kind, self)
    }

    pub fn get_file_cached<T: std::any::Any + Send + Sync>(
        &self,
        kind: &KindKey,
        path: &str,
    ) -> Result<Arc<T>> {
        self.cache.get_file(kind, path, self, || self.store.get(path))
    }

    fn register_builtins(&self) {
        if self.options.features & FEATURE_AST != 0 {
            self.cache
                .register_file_builder(kind(BuiltinKind::FileAst), build_file_ast);
        }
        // The AST-package builder is the shared prerequisite for
        // type-info and package-doc; register it whenever any of the
        // three higher-level features is requested.
        if self.options.features & (FEATURE_AST | FEATURE_TYPE_INFO | FEATURE_PACKAGE_DOC) != 0 {
            self.cache
                .register_project_builder(kind(BuiltinKind::AstPackage), build_ast_package);
        }
        if self.options.features & FEATURE_TYPE_INFO != 0 {
            self.cache
                .register_project_builder(kind(BuiltinKind::TypeInfo), build_type_info);
        }
        if self.options.features & FEATURE_PACKAGE_DOC != 0 {
            self.cache
                .register_project_builder(kind(BuiltinKind::PackageDoc), build_package_doc);
        }
    }
}

fn kind(k: BuiltinKind) -> KindKey {
    KindKey::new(k)
}

fn build_file_ast(project: &Project, path: &str, file: &File) -> Result<Arc<FileAstResult>> {
    let Some(mode) = project.options.parse_mode_for(path) else {
        return Ok(Arc::new(FileAstResult {
            tree: None,
            parse_error: None,
        }));
    };

    let parser = &project.ports.parser;
    let bytes = file.bytes();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| parser.parse(path, bytes, mode)));

    let (tree, parse_error) = match outcome {
        Ok((tree, error)) => (tree, error),
        Err(payload) => {
            let message = panic_message(&payload);
            tracing::debug!(path, "per-file AST builder: parser panicked");
            (None, Some(Error::ParseError {
                path: path.to_string(),
                message,
            }))
        }
    };

    Ok(Arc::new(FileAstResult {
        tree: tree.map(Arc::new),
        parse_error,
    }))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "parser panicked".to_string()
    }
}

fn build_ast_package(project: &Project) -> Result<Arc<AstPackageResult>> {
    let mut result = AstPackageResult::default();
    let mut paths: Vec<String> = project
        .store
        .iter()
        .map(|(path, _)| path)
        .filter(|path| project.options.is_recognized_source(path))
        .collect();
    paths.sort();

    for path in paths {
        match project.get_ast(&path) {
            Ok(ast_result) => {
                if let Some(tree) = &ast_result.tree {
                    if result.package_name.is_none() {
                        if let Some(name) = &tree.package_name {
                            if !name.is_empty() {
                                result.package_name = Some(name.clone());
                            }
                        }
                    }
                    result.files.insert(path.clone(), Arc::clone(tree));
                }
                if let Some(err) = &ast_result.parse_error {
                    result
                        .diagnostics
                        .push(Diagnostic::new(err.to_string()).with_path(path.clone()));
                }
            }
            Err(err) => {
                // Open question resolution (see DESIGN.md): a per-file
                // builder error for `path` is never silently dropped —
                // it is always attached as a diagnostic carrying the
                // file's path.
                result
                    .diagnostics
                    .push(Diagnostic::new(err.to_string()).with_path(path));
            }
        }
    }

    Ok(Arc::new(result))
}

fn build_type_info(project: &Project) -> Result<Arc<TypeInfoResult>> {
    let ast_package = project.get_ast_package()?;

    // The type checker reports expression-level facts (`TypeInfo`'s
    // span-keyed maps) but never owns the package's declaration scope —
    // it takes `&Package`, not `&mut Package`. The scope is purely
    // syntactic aggregation, so it is built here from the AST package
    // directly rather than threaded through the checker port. Later
    // files win on name collisions, matching the AST-package builder's
    // own "last recognized file wins" aggregation order.
    let mut scope = PackageScope::default();
    let mut paths: Vec<&String> = ast_package.files.keys().collect();
    paths.sort();
    for path in paths {
        for decl in &ast_package.files[path].decls {
            scope.decls.insert(decl.name().to_string(), decl.clone());
        }
    }

    let package = Package {
        path: project.package_path.clone(),
        name: ast_package.package_name.clone().unwrap_or_default(),
        scope,
    };

    let files: Vec<(String, Ast)> = ast_package
        .files
        .iter()
        .map(|(path, ast)| (path.clone(), (**ast).clone()))
        .collect();

    let mut errors = Vec::new();
    let request = TypeCheckRequest {
        package: &package,
        files: &files,
    };
    let (mut info, fatal) = project.ports.type_checker.check(
        request,
        project.ports.importer.as_ref(),
        &mut |message| errors.push(message),
    );

    if let Some(fatal) = fatal {
        if errors.is_empty() {
            errors.push(fatal.to_string());
        }
    }

    info.build_reverse_index();

    Ok(Arc::new(TypeInfoResult {
        info: Arc::new(info),
        package: Arc::new(package),
        errors,
    }))
}

fn build_package_doc(project: &Project) -> Result<Arc<String>> {
    let ast_package = project.get_ast_package()?;
    let doc = project
        .ports
        .doc_extractor
        .extract(&project.package_path, ast_package.package_name.as_deref());
    Ok(Arc::new(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decl, FuncDecl};
    use crate::ports::{DocumentationExtractor, Importer, Parser, TypeChecker};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoParser;
    impl Parser for EchoParser {
        fn parse(&self, _path: &str, bytes: &[u8], _mode: ParseMode) -> (Option<Ast>, Option<Error>) {
            let text = String::from_utf8_lossy(bytes);
            let body_len = text.split_whitespace().count().min(1);
            let tree = Ast {
                package_name: Some("main".into()),
                decls: (0..body_len)
                    .map(|i| {
                        Decl::Func(FuncDecl {
                            name: format!("stmt{i}"),
                            receiver: None,
                            params: vec![],
                            results: vec![],
                            body: vec![],
                        })
                    })
                    .collect(),
            };
            (Some(tree), None)
        }
    }

    struct NoopTypeChecker;
    impl TypeChecker for NoopTypeChecker {
        fn check(
            &self,
            _request: TypeCheckRequest<'_>,
            _importer: &dyn Importer,
            _on_error: &mut dyn FnMut(String),
        ) -> (TypeInfo, Option<Error>) {
            (TypeInfo::default(), None)
        }
    }

    struct NoopImporter;
    impl Importer for NoopImporter {
        fn import(&self, path: &str) -> Result<Arc<Package>> {
            Err(Error::not_found(path))
        }
    }

    struct CountingDocExtractor(Arc<AtomicUsize>);
    impl DocumentationExtractor for CountingDocExtractor {
        fn extract(&self, package_path: &str, _package_name: Option<&str>) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            format!("docs for {package_path}")
        }
    }

    fn test_ports() -> Ports {
        Ports {
            parser: Box::new(EchoParser),
            type_checker: Box::new(NoopTypeChecker),
            importer: Box::new(NoopImporter),
            doc_extractor: Box::new(CountingDocExtractor(Arc::new(AtomicUsize::new(0)))),
        }
    }

    #[test]
    fn cache_hit_then_miss_after_edit() {
        let project = Project::new(
            "demo",
            test_ports(),
            ProjectOptions::default(),
            [("main.spx".to_string(), File::from_text("echo 100", 0, 0))],
        );

        let a1 = project.get_ast("main.spx").unwrap();
        let tree1 = a1.tree.clone().unwrap();
        assert_eq!(tree1.decls.len(), 1);

        let a2 = project.get_ast("main.spx").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));

        project.put("main.spx", File::from_text("echo 200", 0, 1));
        let a3 = project.get_ast("main.spx").unwrap();
        assert!(!Arc::ptr_eq(&a1, &a3));
        assert_eq!(a3.tree.clone().unwrap().decls.len(), 1);
    }

    #[test]
    fn rename_preserves_content_and_invalidates() {
        let project = Project::new(
            "demo",
            test_ports(),
            ProjectOptions::default(),
            [("main.spx".to_string(), File::from_text("echo 100", 0, 0))],
        );

        let a1 = project.get_ast("main.spx").unwrap();
        project.rename("main.spx", "foo.spx").unwrap();

        let a2 = project.get_ast("foo.spx").unwrap();
        assert!(!Arc::ptr_eq(&a1, &a2));
        assert_eq!(a1.tree.as_ref().unwrap().decls.len(), a2.tree.as_ref().unwrap().decls.len());

        assert!(matches!(project.get_ast("main.spx"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn bulk_update_respects_legacy_timestamp() {
        let project = Project::new(
            "demo",
            test_ports(),
            ProjectOptions::default(),
            [("main.spx".to_string(), File::from_text("echo 200", 100, 0))],
        );

        project.update_bulk([("main.spx".to_string(), File::from_text("echo 999", 100, 0))]);
        assert_eq!(project.get("main.spx").unwrap().text_lossy(), "echo 200");

        project.update_bulk([("main.spx".to_string(), File::from_text("echo 300", 200, 0))]);
        assert_eq!(project.get("main.spx").unwrap().text_lossy(), "echo 300");
    }

    #[test]
    fn ast_package_aggregates_recognized_files_only() {
        let project = Project::new(
            "demo",
            test_ports(),
            ProjectOptions::default(),
            [
                ("main.spx".to_string(), File::from_text("echo 1", 0, 0)),
                ("readme.txt".to_string(), File::from_text("ignored", 0, 0)),
            ],
        );

        let package = project.get_ast_package().unwrap();
        assert_eq!(package.files.len(), 1);
        assert!(package.files.contains_key("main.spx"));
        assert_eq!(package.package_name.as_deref(), Some("main"));
    }

    #[test]
    fn package_doc_runs_builder_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ports = Ports {
            parser: Box::new(EchoParser),
            type_checker: Box::new(NoopTypeChecker),
            importer: Box::new(NoopImporter),
            doc_extractor: Box::new(CountingDocExtractor(Arc::clone(&counter))),
        };
        let project = Project::new(
            "demo",
            ports,
            ProjectOptions::default(),
            [("main.spx".to_string(), File::from_text("echo 1", 0, 0))],
        );

        let doc1 = project.get_package_doc().unwrap();
        let doc2 = project.get_package_doc().unwrap();
        assert!(Arc::ptr_eq(&doc1, &doc2));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(doc1.contains("demo"));
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let project = Project::new(
            "demo",
            test_ports(),
            ProjectOptions::default(),
            [("main.spx".to_string(), File::from_text("echo 1", 0, 0))],
        );

        let snap = project.snapshot();
        project.put("main.spx", File::from_text("echo 2", 0, 1));
        project.delete("main.spx").ok();

        assert_eq!(snap.get("main.spx").unwrap().text_lossy(), "echo 1");
        assert_eq!(project.get("main.spx"), None);
    }
}
