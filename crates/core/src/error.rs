//! Error types shared by every spxls crate.
//!
//! The cache fabric, file store, analysis pipeline and classfile providers
//! all report failures through this single [`Error`] enum so that callers
//! can match on error kind regardless of which layer produced it.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias used throughout spxls.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for spxls operations.
///
/// See the crate-level error handling design for the policy governing
/// each variant: errors are cached with the same lifetime as successes
/// and invalidated together, with the exception of [`Error::ReferenceDiagnostic`]
/// which is never stored as an error and exists here only so that callers
/// converting provider diagnostics have a single type to reach for.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// A cache `get_*` call named a kind with no registered builder.
    #[error("unknown cache kind: {kind}")]
    UnknownKind {
        /// Debug-formatted kind that had no builder.
        kind: String,
    },

    /// The file store (or file-scoped cache) has no entry for this path.
    #[error("file not found: {path}")]
    NotFound {
        /// The path that was absent.
        path: String,
    },

    /// A rename's destination path already has an entry.
    #[error("file already exists: {path}")]
    AlreadyExists {
        /// The path that already existed.
        path: String,
    },

    /// The parser failed (or panicked) on a file. Cached inside the
    /// per-file AST entry; never prevents downstream builders from
    /// running over the remaining files.
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path of the file that failed to parse.
        path: String,
        /// Parser-reported (or panic-captured) message.
        message: String,
    },

    /// One or more type-checking errors were reported by the type checker
    /// port. Surfaced both from the type-info builder's result and passed
    /// through to provider diagnostics.
    #[error("type check failed with {} error(s): {}", .messages.len(), .messages.join("; "))]
    TypeCheckError {
        /// Individual error messages collected from the type checker.
        messages: Vec<String>,
    },

    /// An asset manifest (`index.json`) was missing or malformed. Always
    /// surfaces as a diagnostic on the provider snapshot; the snapshot is
    /// still constructed.
    #[error("resource index error: {message}")]
    ResourceIndexError {
        /// Description of the manifest problem.
        message: String,
    },

    /// "name cannot be empty" / "resource not found" style findings from
    /// the reference walker. These are always surfaced as diagnostics and
    /// never stored as a cache error; this variant exists so call sites
    /// that thread errors and diagnostics through the same channel have
    /// somewhere to put them.
    #[error("{message}")]
    ReferenceDiagnostic {
        /// Human-readable diagnostic text, already translated.
        message: String,
    },

    /// Propagated verbatim from a registered builder. Cached alongside
    /// successes and returned to every caller of the same (scope, kind[,
    /// path]).
    #[error("builder failed: {message}")]
    BuilderError {
        /// Builder-supplied message.
        message: String,
        /// Optional underlying cause, retained for `source()`.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Build an [`Error::UnknownKind`] from anything `Debug`.
    pub fn unknown_kind(kind: impl fmt::Debug) -> Self {
        Error::UnknownKind {
            kind: format!("{kind:?}"),
        }
    }

    /// Build an [`Error::NotFound`] for `path`.
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Build an [`Error::AlreadyExists`] for `path`.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Error::AlreadyExists { path: path.into() }
    }

    /// Build a [`Error::BuilderError`] with no underlying cause.
    pub fn builder(message: impl Into<String>) -> Self {
        Error::BuilderError {
            message: message.into(),
            source: None,
        }
    }

    /// Build a [`Error::BuilderError`] wrapping `source`.
    pub fn builder_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::BuilderError {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// True for [`Error::NotFound`] and [`Error::AlreadyExists`] — errors
    /// about the shape of the file store rather than a computation.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::AlreadyExists { .. })
    }

    /// True when this error should be attached as a span-carrying
    /// diagnostic rather than surfaced as a hard failure: resource index
    /// and reference-walker findings are recoverable at the call site
    /// that produced them.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Error::ResourceIndexError { .. } | Error::ReferenceDiagnostic { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ResourceIndexError {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::ResourceIndexError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("main.spx");
        assert!(err.to_string().contains("main.spx"));
        assert!(err.is_store_error());
    }

    #[test]
    fn already_exists_display() {
        let err = Error::already_exists("foo.spx");
        assert!(err.to_string().contains("foo.spx"));
        assert!(err.is_store_error());
    }

    #[test]
    fn type_check_error_joins_messages() {
        let err = Error::TypeCheckError {
            messages: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 error"));
        assert!(msg.contains("a; b"));
    }

    #[test]
    fn builder_error_roundtrips_message() {
        let err = Error::builder("boom");
        assert_eq!(err.to_string(), "builder failed: boom");
    }

    #[test]
    fn resource_index_and_reference_diagnostic_are_diagnostics() {
        assert!(Error::ResourceIndexError {
            message: "missing index.json".into()
        }
        .is_diagnostic());
        assert!(Error::ReferenceDiagnostic {
            message: "sprite resource \"Hero\" not found".into()
        }
        .is_diagnostic());
        assert!(!Error::not_found("x").is_diagnostic());
    }

    #[test]
    fn unknown_kind_formats_debug() {
        #[derive(Debug)]
        struct K;
        let err = Error::unknown_kind(K);
        assert_eq!(err.to_string(), "unknown cache kind: K");
    }
}
