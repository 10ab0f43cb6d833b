//! Classfile-aware analysis layered over `spxls-analysis`: the asset
//! resource index, the reference walker, and the embedder-supplied
//! [`Provider`] registry and per-project snapshot cache.

mod classfile_project;
pub mod provider;
pub mod resource;
pub mod walker;

pub use classfile_project::ClassfileProject;
pub use provider::{BuildContext, Provider, ProviderRegistry, Snapshot};
pub use resource::{
    build_resource_index, Animation, Backdrop, Costume, ResourceId, ResourceSet, Sound, Sprite,
    Widget,
};
pub use walker::{walk, ReferenceKind, ResourceRef, WalkResult};
