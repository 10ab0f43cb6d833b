//! The `Provider` trait and the process-global provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use spxls_analysis::Project;
use spxls_core::Result;

use crate::resource::ResourceSet;
use crate::walker::ResourceRef;
use spxls_analysis::model::Diagnostic;

/// The context a [`Provider`] is built with: the underlying analysis
/// project and the analyzer descriptors its owning [`crate::ClassfileProject`]
/// was constructed with. The analyzer list is opaque to spxls — it is
/// forwarded verbatim from the embedder's configuration to whichever
/// provider cares to interpret it.
pub struct BuildContext<'a> {
    pub project: &'a Project,
    pub analyzers: &'a [String],
}

/// A snapshot a provider builds for one project: the diagnostics it
/// found plus the resource references and asset index it produced
/// along the way. `spxls-classfile` ships no providers of its own —
/// embedders register their own classfile providers (an spx sprite
/// provider, a widget provider, and so on) against this trait.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub provider_id: String,
    pub diagnostics: Vec<Diagnostic>,
    pub references: Vec<ResourceRef>,
    pub resources: Option<Arc<ResourceSet>>,
}

/// A classfile analysis provider. Implementations are supplied by the
/// embedder and registered once, process-wide, via
/// [`ProviderRegistry::register`].
pub trait Provider: Send + Sync {
    /// A unique, non-empty identifier for this provider.
    fn id(&self) -> &str;

    /// Whether this provider handles `path` (used for the first-match
    /// path-based lookup in [`ProviderRegistry::by_path`]).
    fn supports(&self, path: &str) -> bool;

    /// Build this provider's snapshot for the project in `ctx`.
    ///
    /// Unlike an `Option<Snapshot>`-returning design, a provider simply
    /// cannot report "no error, no snapshot" here: the return type is
    /// `Result<Snapshot>`, not `Result<Option<Snapshot>>`, so the
    /// nil-snapshot failure mode some embedder runtimes need to guard
    /// against does not exist as a representable state in this API.
    fn build(&self, ctx: &BuildContext<'_>) -> Result<Snapshot>;
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<String, Arc<dyn Provider>>,
    order: Vec<String>,
}

static REGISTRY: Lazy<RwLock<RegistryInner>> = Lazy::new(|| RwLock::new(RegistryInner::default()));

/// The process-global provider registry. Registration is expected to
/// happen once, at startup, from the embedder's own initialization
/// code; lookups are safe to call concurrently from any number of
/// projects.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Register `provider`. Panics if its `id()` is empty or already
    /// registered — duplicate or nil provider ids are a programming
    /// error in embedder startup code, not a recoverable runtime
    /// condition.
    pub fn register(provider: Arc<dyn Provider>) {
        let id = provider.id().to_string();
        assert!(!id.is_empty(), "provider id must not be empty");
        let mut inner = REGISTRY.write();
        assert!(
            !inner.by_id.contains_key(&id),
            "duplicate provider id: {id}"
        );
        tracing::debug!(provider_id = %id, "classfile provider registered");
        inner.order.push(id.clone());
        inner.by_id.insert(id, provider);
    }

    /// Look up a provider by its exact id.
    pub fn by_id(id: &str) -> Option<Arc<dyn Provider>> {
        REGISTRY.read().by_id.get(id).cloned()
    }

    /// The first registered provider (in registration order) whose
    /// `supports(path)` returns true.
    pub fn by_path(path: &str) -> Option<Arc<dyn Provider>> {
        let inner = REGISTRY.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .find(|p| p.supports(path))
            .cloned()
    }

    /// Every registered provider id, in registration order.
    pub fn ids() -> Vec<String> {
        REGISTRY.read().order.clone()
    }

    #[cfg(test)]
    pub(crate) fn reset_for_test() {
        let mut inner = REGISTRY.write();
        inner.by_id.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Registration is process-global; serialize the tests that touch it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    struct StubProvider {
        id: &'static str,
        ext: &'static str,
    }

    impl Provider for StubProvider {
        fn id(&self) -> &str {
            self.id
        }

        fn supports(&self, path: &str) -> bool {
            path.ends_with(self.ext)
        }

        fn build(&self, _ctx: &BuildContext<'_>) -> Result<Snapshot> {
            Ok(Snapshot {
                provider_id: self.id.to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn registers_and_looks_up_by_id_and_path() {
        let _guard = TEST_LOCK.lock().unwrap();
        ProviderRegistry::reset_for_test();
        ProviderRegistry::register(Arc::new(StubProvider { id: "spx", ext: ".spx" }));
        ProviderRegistry::register(Arc::new(StubProvider { id: "gox", ext: ".gox" }));

        assert!(ProviderRegistry::by_id("spx").is_some());
        assert!(ProviderRegistry::by_id("missing").is_none());
        assert_eq!(ProviderRegistry::by_path("Hero.spx").unwrap().id(), "spx");
        assert_eq!(ProviderRegistry::by_path("Widget.gox").unwrap().id(), "gox");
        assert!(ProviderRegistry::by_path("readme.txt").is_none());
        assert_eq!(ProviderRegistry::ids(), vec!["spx".to_string(), "gox".to_string()]);
    }

    #[test]
    #[should_panic(expected = "duplicate provider id")]
    fn duplicate_registration_panics() {
        let _guard = TEST_LOCK.lock().unwrap();
        ProviderRegistry::reset_for_test();
        ProviderRegistry::register(Arc::new(StubProvider { id: "dup", ext: ".spx" }));
        ProviderRegistry::register(Arc::new(StubProvider { id: "dup", ext: ".gox" }));
    }
}
