//! The `Project` aggregate, external ports, and the built-in per-file
//! AST / AST-package / type-info / package-documentation analysis
//! pipeline.

pub mod model;
pub mod ports;
mod project;

pub use project::{
    AstPackageResult, FileAstResult, OpaqueHandle, Project, ProjectOptions, TypeInfoResult,
    FEATURE_ALL, FEATURE_AST, FEATURE_PACKAGE_DOC, FEATURE_TYPE_INFO,
};
