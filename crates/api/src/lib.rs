//! Public facade for spxls: project construction, file store and
//! cache fabric operations, classfile provider snapshots, and the
//! asset resource index, behind a single [`SpxProject`] type.
//!
//! Everything below is a thin composition of `spxls-analysis` and
//! `spxls-classfile`; this crate adds no analysis of its own.

mod project;

pub use project::SpxProject;

pub use spxls_analysis::model;
pub use spxls_analysis::ports;
pub use spxls_analysis::{
    AstPackageResult, FileAstResult, OpaqueHandle, Project, ProjectOptions, TypeInfoResult,
    FEATURE_ALL, FEATURE_AST, FEATURE_PACKAGE_DOC, FEATURE_TYPE_INFO,
};
pub use spxls_cache::CacheFabric;
pub use spxls_classfile::{
    build_resource_index, walk, Animation, Backdrop, BuildContext, ClassfileProject, Costume,
    Provider, ProviderRegistry, ReferenceKind, ResourceId, ResourceRef, ResourceSet, Snapshot,
    Sound, Sprite, Widget, WalkResult,
};
pub use spxls_core::{Error, File, KindKey, Result};
