//! # spxls
//!
//! An incremental analysis cache for a Go+/XGo "spx" classfile language
//! server: a per-project file store with snapshot isolation, a type-safe
//! single-flight cache fabric, a built-in AST/type-info/documentation
//! pipeline, a pluggable classfile provider registry, an asset resource
//! index, and a reference walker that cross-references source against
//! that index.
//!
//! spxls does not parse, type-check, import, or extract documentation
//! itself — those are external ports the embedder supplies at project
//! construction (see [`Ports`]).
//!
//! Internal crates (`spxls-core`, `spxls-store`, `spxls-cache`,
//! `spxls-analysis`, `spxls-classfile`) are implementation layers; this
//! crate re-exports the stable public surface from `spxls-api`.

pub use spxls_api::*;
