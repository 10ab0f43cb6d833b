//! External ports consumed by the built-in analysis pipeline.
//!
//! These are abstract contracts, not implemented by spxls: the
//! embedder supplies concrete parsing, type-checking, importing and
//! documentation extraction. spxls only orchestrates calls to them and
//! caches the results.

use std::sync::Arc;

use spxls_core::{Error, Result};

use crate::model::{Ast, Package, TypeInfo};

/// Which parse mode a file requires, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Core-language sources (`.xgo`, `.gop`).
    Standard,
    /// Classfile sources (`.spx`, `.gox`): classfile-aware parsing is
    /// additionally enabled.
    Classfile,
}

/// `parse(path, bytes, mode) -> (tree, error)`, tolerant of partial
/// input.
pub trait Parser: Send + Sync {
    fn parse(&self, path: &str, bytes: &[u8], mode: ParseMode) -> (Option<Ast>, Option<Error>);
}

/// The project context passed to [`TypeChecker::check`]: the package
/// being checked and the parsed files that make it up.
pub struct TypeCheckRequest<'a> {
    pub package: &'a Package,
    pub files: &'a [(String, Ast)],
}

/// Accepts a project context and a file list, populates a [`TypeInfo`]
/// record, and returns a fatal error if any. Per-file and aggregate
/// errors encountered while checking are reported through `on_error`
/// rather than by returning early, so the whole file list is still
/// checked.
pub trait TypeChecker: Send + Sync {
    fn check(
        &self,
        request: TypeCheckRequest<'_>,
        importer: &dyn Importer,
        on_error: &mut dyn FnMut(String),
    ) -> (TypeInfo, Option<Error>);
}

/// `import(path) -> (package, error)`.
pub trait Importer: Send + Sync {
    fn import(&self, path: &str) -> Result<Arc<Package>>;
}

/// `extract(package-path, ast-package) -> doc` (total: never fails).
pub trait DocumentationExtractor: Send + Sync {
    fn extract(&self, package_path: &str, package_name: Option<&str>) -> String;
}

/// The four external ports an embedder supplies at project construction.
pub struct Ports {
    pub parser: Box<dyn Parser>,
    pub type_checker: Box<dyn TypeChecker>,
    pub importer: Box<dyn Importer>,
    pub doc_extractor: Box<dyn DocumentationExtractor>,
}
